//! Associated device table of an access point.
//!
//! Entries of stations that left without ever authorizing stay in the table
//! as inactive "sticky" entries so the failed attempt can be diagnosed. At
//! most `NR_OF_STICKY_UNAUTHORIZED_STATIONS + 1` of them are kept.

use super::AccessPoint;
use crate::context::WldContext;
use crate::error::{check_vendor, WldError, WldResult};
use crate::events::{ApActionEvent, ApActionType, StationChange, StationLifecycleEvent};
use crate::handle::ApId;
use crate::vendor::StationStats;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use wld_types::{ApStatus, MacAddress};

pub const NR_OF_STICKY_UNAUTHORIZED_STATIONS: usize = 1;

/// Reason code 5: AP unable to handle all currently associated stations.
const REASON_AP_BUSY: u16 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Station {
    pub mac: MacAddress,
    /// Currently associated.
    pub active: bool,
    pub authorized: bool,
    pub associated_at_ms: u64,
    pub latest_state_change_ms: u64,
    pub signal_strength: Option<i32>,
}

impl AccessPoint {
    /// Oldest inactive entry by last state change.
    fn oldest_inactive(&self) -> Option<MacAddress> {
        self.stations
            .iter()
            .filter(|s| !s.active)
            .min_by_key(|s| s.latest_state_change_ms)
            .map(|s| s.mac)
    }

    /// Longest-associated active entry.
    fn oldest_active(&self) -> Option<MacAddress> {
        self.stations
            .iter()
            .filter(|s| s.active)
            .min_by_key(|s| s.associated_at_ms)
            .map(|s| s.mac)
    }

    fn inactive_count(&self) -> usize {
        self.stations.iter().filter(|s| !s.active).count()
    }
}

impl WldContext {
    fn now_ms(&self) -> u64 {
        self.now().as_millis() as u64
    }

    fn station_event(&self, ap: ApId, station: MacAddress, change: StationChange) {
        self.bus.station_lifecycle.notify(&StationLifecycleEvent {
            ap,
            station,
            change,
        });
    }

    fn ap_action_event(&self, ap: ApId, action: ApActionType, station: MacAddress) {
        self.bus.ap_action.notify(&ApActionEvent {
            ap,
            action,
            station,
        });
    }

    /// Records a station association reported by the driver.
    #[instrument(skip(self))]
    pub fn station_connect(&mut self, id: ApId, mac: MacAddress) -> WldResult<()> {
        if !mac.is_valid_unicast() {
            return Err(WldError::invalid_param("station", format!("{} is not unicast", mac)));
        }
        let now = self.now_ms();
        let ap = self.ap_mut(id)?;
        if ap.status != ApStatus::Enabled {
            return Err(WldError::invalid_state(format!(
                "access point '{}' is not enabled",
                ap.alias
            )));
        }

        if let Some(sta) = ap.stations.iter_mut().find(|s| s.mac == mac) {
            sta.active = true;
            sta.authorized = false;
            sta.associated_at_ms = now;
            sta.latest_state_change_ms = now;
            debug!(ap = %id, %mac, "station re-associated");
            self.station_event(id, mac, StationChange::Assoc);
            return Ok(());
        }

        let mut evicted = None;
        if ap.stations.len() >= ap.max_stations {
            let Some(victim) = ap.oldest_inactive() else {
                return Err(WldError::not_available(format!(
                    "associated device table of '{}' is full",
                    ap.alias
                )));
            };
            ap.stations.retain(|s| s.mac != victim);
            evicted = Some(victim);
        }
        ap.stations.push(Station {
            mac,
            active: true,
            authorized: false,
            associated_at_ms: now,
            latest_state_change_ms: now,
            signal_strength: None,
        });
        if let Some(victim) = evicted {
            info!(ap = %id, station = %victim, "inactive station evicted for capacity");
            self.station_event(id, victim, StationChange::Destroy);
        }
        info!(ap = %id, station = %mac, "station created");
        self.station_event(id, mac, StationChange::Create);
        self.station_event(id, mac, StationChange::Assoc);
        Ok(())
    }

    /// Marks an associated station as authorized.
    #[instrument(skip(self))]
    pub fn station_authorize(&mut self, id: ApId, mac: MacAddress) -> WldResult<()> {
        let now = self.now_ms();
        let sta = self
            .ap_mut(id)?
            .stations
            .iter_mut()
            .find(|s| s.mac == mac && s.active)
            .ok_or_else(|| WldError::not_found("station", mac))?;
        if sta.authorized {
            return Ok(());
        }
        sta.authorized = true;
        sta.latest_state_change_ms = now;
        self.station_event(id, mac, StationChange::Auth);
        Ok(())
    }

    /// Records a disassociation reported by the driver.
    #[instrument(skip(self))]
    pub fn station_disconnect(&mut self, id: ApId, mac: MacAddress) -> WldResult<()> {
        let now = self.now_ms();
        let ap = self.ap_mut(id)?;
        let sta = ap
            .stations
            .iter_mut()
            .find(|s| s.mac == mac)
            .ok_or_else(|| WldError::not_found("station", mac))?;
        if !sta.active {
            return Ok(());
        }
        let authorized = sta.authorized;
        sta.active = false;
        sta.latest_state_change_ms = now;
        self.station_event(id, mac, StationChange::Disassoc);

        if authorized {
            self.remove_station_entry(id, mac);
        } else {
            self.evict_sticky_stations(id);
        }
        Ok(())
    }

    /// Removes a station entry whatever its state.
    pub(crate) fn drop_station(&mut self, id: ApId, mac: MacAddress) {
        let active = self
            .aps
            .get(&id)
            .and_then(|ap| ap.station(mac))
            .is_some_and(|s| s.active);
        if active {
            self.station_event(id, mac, StationChange::Disassoc);
        }
        self.remove_station_entry(id, mac);
    }

    fn remove_station_entry(&mut self, id: ApId, mac: MacAddress) {
        let Some(ap) = self.aps.get_mut(&id) else {
            return;
        };
        let before = ap.stations.len();
        ap.stations.retain(|s| s.mac != mac);
        if ap.stations.len() != before {
            debug!(ap = %id, station = %mac, "station destroyed");
            self.station_event(id, mac, StationChange::Destroy);
        }
    }

    /// Keeps at most `NR_OF_STICKY_UNAUTHORIZED_STATIONS + 1` inactive entries.
    fn evict_sticky_stations(&mut self, id: ApId) {
        loop {
            let Some(ap) = self.aps.get(&id) else {
                return;
            };
            if ap.inactive_count() <= NR_OF_STICKY_UNAUTHORIZED_STATIONS + 1 {
                return;
            }
            let Some(victim) = ap.oldest_inactive() else {
                return;
            };
            self.remove_station_entry(id, victim);
        }
    }

    /// Shrinks the table to `max_stations`. Inactive entries go first, then
    /// the longest-associated stations are deauthenticated.
    pub(crate) fn enforce_station_cap(&mut self, id: ApId) -> WldResult<()> {
        loop {
            let ap = self.ap_ref(id)?;
            if ap.stations.len() <= ap.max_stations {
                return Ok(());
            }
            if let Some(victim) = ap.oldest_inactive() {
                debug!(ap = %id, station = %victim, "inactive station dropped over capacity");
                self.remove_station_entry(id, victim);
                continue;
            }
            let Some(victim) = ap.oldest_active() else {
                return Ok(());
            };
            let status = self
                .vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
                .ap_kick_station(ap, victim, REASON_AP_BUSY);
            if let Err(e) = check_vendor("ap_kick_station", status) {
                warn!(ap = %id, station = %victim, error = %e, "deauth over capacity failed");
            }
            info!(ap = %id, station = %victim, "station kicked over capacity");
            self.ap_action_event(id, ApActionType::Kick, victim);
            self.drop_station(id, victim);
        }
    }

    /// Disassociates every station, e.g. when the BSS goes down.
    pub(crate) fn flush_stations(&mut self, id: ApId) {
        let stations: Vec<MacAddress> = self
            .aps
            .get(&id)
            .map(|ap| ap.stations.iter().map(|s| s.mac).collect())
            .unwrap_or_default();
        for mac in stations {
            self.drop_station(id, mac);
        }
    }

    /// Deauthenticates a station.
    #[instrument(skip(self))]
    pub fn kick_station(&mut self, id: ApId, mac: MacAddress, reason: u16) -> WldResult<()> {
        let ap = self.ap_ref(id)?;
        if !ap.station(mac).is_some_and(|s| s.active) {
            return Err(WldError::not_found("station", mac));
        }
        let status = self
            .vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
            .ap_kick_station(ap, mac, reason);
        check_vendor("ap_kick_station", status)?;
        info!(ap = %id, station = %mac, reason, "station kicked");
        self.ap_action_event(id, ApActionType::Kick, mac);
        self.station_disconnect(id, mac)
    }

    /// Asks a station to move to another BSS (BSS transition request).
    #[instrument(skip(self))]
    pub fn steer_station(&mut self, id: ApId, mac: MacAddress, target: MacAddress) -> WldResult<()> {
        if !target.is_valid_unicast() {
            return Err(WldError::invalid_param("target", format!("{} is not a BSSID", target)));
        }
        let ap = self.ap_ref(id)?;
        if !ap.station(mac).is_some_and(|s| s.active) {
            return Err(WldError::not_found("station", mac));
        }
        let status = self
            .vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
            .ap_steer_station(ap, mac, target);
        check_vendor("ap_steer_station", status)?;
        info!(ap = %id, station = %mac, %target, "station steered");
        self.ap_action_event(id, ApActionType::Steer, mac);
        Ok(())
    }

    /// Records a signal strength measurement of a known station.
    pub fn station_rssi_sample(&mut self, id: ApId, mac: MacAddress, rssi: i32) -> WldResult<()> {
        let sta = self
            .ap_mut(id)?
            .stations
            .iter_mut()
            .find(|s| s.mac == mac)
            .ok_or_else(|| WldError::not_found("station", mac))?;
        sta.signal_strength = Some(rssi);
        self.ap_action_event(id, ApActionType::RssiSample, mac);
        Ok(())
    }

    pub fn station_stats(&self, id: ApId, mac: MacAddress) -> WldResult<StationStats> {
        let ap = self.ap_ref(id)?;
        if ap.station(mac).is_none() {
            return Err(WldError::not_found("station", mac));
        }
        self.vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
            .ap_station_stats(ap, mac)
            .map_err(|status| WldError::vendor("ap_station_stats", status))
    }
}
