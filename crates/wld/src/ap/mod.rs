//! Access points (VAPs).
//!
//! An access point is bound 1:1 to an SSID and many-to-one to a radio. Both
//! links are handles set at creation and cleared only by deletion.

mod exec;
mod station;
mod wps;

pub use station::{Station, NR_OF_STICKY_UNAUTHORIZED_STATIONS};
pub use wps::{WpsMethod, WpsSession, WpsStatus};

use crate::context::WldContext;
use crate::error::{check_vendor, WldError, WldResult};
use crate::events::{ApChange, ApLifecycleEvent, ApStatusChange};
use crate::fsm::{Fsm, FsmAction};
use crate::handle::{ApId, RadioId, SsidId};
use crate::security::SecurityConfig;
use crate::ssid::{validate_ssid_name, Ssid, SsidOwner};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use wld_types::ApStatus;

/// Multi-AP role of a BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MultiApType {
    #[default]
    None,
    FronthaulBss,
    BackhaulBss,
    FronthaulBackhaulBss,
}

/// Vendor-specific information element added to beacons and other management frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VendorIe {
    pub oui: [u8; 3],
    pub data: Vec<u8>,
}

impl VendorIe {
    /// Largest payload that fits one element next to the OUI.
    pub const MAX_DATA_LEN: usize = 252;
}

#[derive(Debug, Serialize)]
pub struct AccessPoint {
    pub id: ApId,
    pub alias: String,
    pub radio: RadioId,
    pub ssid: SsidId,
    pub enable: bool,
    pub status: ApStatus,
    pub security: SecurityConfig,
    pub multi_ap: MultiApType,
    pub max_stations: usize,
    pub stations: Vec<Station>,
    pub wps: WpsSession,
    pub vendor_ies: Vec<VendorIe>,
    pub vap_created: bool,
    pub fsm: Fsm,
}

impl AccessPoint {
    fn new(id: ApId, alias: &str, radio: RadioId, ssid: SsidId, max_stations: usize) -> Self {
        Self {
            id,
            alias: alias.to_string(),
            radio,
            ssid,
            enable: false,
            status: ApStatus::Disabled,
            security: SecurityConfig::open(),
            multi_ap: MultiApType::None,
            max_stations,
            stations: Vec::new(),
            wps: WpsSession::default(),
            vendor_ies: Vec::new(),
            vap_created: false,
            fsm: Fsm::new(),
        }
    }

    pub fn station(&self, mac: wld_types::MacAddress) -> Option<&Station> {
        self.stations.iter().find(|s| s.mac == mac)
    }

    /// Number of currently associated stations.
    pub fn associated_count(&self) -> usize {
        self.stations.iter().filter(|s| s.active).count()
    }
}

impl WldContext {
    /// Creates an access point and its SSID on a radio.
    #[instrument(skip(self))]
    pub fn add_ap(&mut self, radio: RadioId, alias: &str, ssid_name: &str) -> WldResult<ApId> {
        if alias.is_empty() {
            return Err(WldError::invalid_param("alias", "must not be empty"));
        }
        validate_ssid_name(ssid_name)?;
        if self.find_access_point(alias).is_some() {
            return Err(WldError::invalid_state(format!(
                "access point '{}' already exists",
                alias
            )));
        }
        let id = ApId(self.alloc.next());
        let ssid_id = SsidId(self.alloc.next());

        let r = self.radio_mut(radio)?;
        let bssid = r.mac.with_offset(r.next_intf_slot);
        r.next_intf_slot += 1;
        r.aps.push(id);
        let max_stations = r.max_stations;

        let mut ssid = Ssid::new(ssid_id, alias, ssid_name, radio, bssid);
        ssid.owner = SsidOwner::AccessPoint(id);
        self.ssids.insert(ssid_id, ssid);

        let mut ap = AccessPoint::new(id, alias, radio, ssid_id, max_stations);
        ap.fsm.set_sync_all();
        self.aps.insert(id, ap);
        self.recompute_ssid_status(ssid_id);

        info!(ap = %alias, %id, %radio, %bssid, "access point created");
        self.bus.ap_lifecycle.notify(&ApLifecycleEvent {
            ap: id,
            change: ApChange::Create,
        });
        self.schedule_autocommit();
        Ok(id)
    }

    /// Deauthenticates every station, then destroys the access point.
    #[instrument(skip(self))]
    pub fn delete_ap(&mut self, id: ApId) -> WldResult<()> {
        let ap = self.ap_ref(id)?;
        let stations: Vec<_> = ap.stations.iter().map(|s| s.mac).collect();
        let (radio, ssid) = (ap.radio, ap.ssid);

        let ops = self.vendor_ops(&self.radio_ref(radio)?.vendor)?;
        for mac in stations {
            let status = ops.ap_disassoc_station(self.ap_ref(id)?, mac);
            if let Err(e) = check_vendor("ap_disassoc_station", status) {
                warn!(%mac, error = %e, "deauth on delete failed");
            }
            self.drop_station(id, mac);
        }
        self.bus.ap_lifecycle.notify(&ApLifecycleEvent {
            ap: id,
            change: ApChange::Deinit,
        });
        self.unregister_ssid_link(ssid);

        let ap = self.ap_mut(id)?;
        let timers = [ap.fsm.timer.take(), ap.wps.timer.take()];
        let vap_created = ap.vap_created;
        for timer in timers {
            self.cancel(timer);
        }
        if vap_created {
            let status = ops.ap_destroy_vap(self.radio_ref(radio)?, self.ap_ref(id)?);
            if let Err(e) = check_vendor("ap_destroy_vap", status) {
                warn!(%id, error = %e, "vap destroy failed");
            }
        }

        self.ssids.remove(&ssid);
        let alias = self.aps.remove(&id).map(|ap| ap.alias).unwrap_or_default();
        if let Some(r) = self.radios.get_mut(&radio) {
            r.aps.retain(|a| *a != id);
            r.fsm.mark_dirty(FsmAction::RadioSecDmn);
            self.schedule_autocommit();
        }
        info!(ap = %alias, %id, "access point deleted");
        self.bus.ap_lifecycle.notify(&ApLifecycleEvent {
            ap: id,
            change: ApChange::Destroy,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_ap_enable(&mut self, id: ApId, enable: bool) -> WldResult<()> {
        let ap = self.ap_mut(id)?;
        if ap.enable == enable {
            return Ok(());
        }
        ap.enable = enable;
        self.touch(id.into(), FsmAction::ApEnable | FsmAction::ApSecDmn)
    }

    #[instrument(skip(self, security), fields(mode = %security.mode))]
    pub fn set_ap_security(&mut self, id: ApId, security: SecurityConfig) -> WldResult<()> {
        security.validate()?;
        let ap = self.ap_mut(id)?;
        if ap.security == security {
            return Ok(());
        }
        ap.security = security;
        let ssid = ap.ssid;
        self.touch(id.into(), FsmAction::ApSecurity | FsmAction::ApSecDmn)?;
        self.notify_link_changed(ssid);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_ap_multi_ap(&mut self, id: ApId, multi_ap: MultiApType) -> WldResult<()> {
        let ap = self.ap_mut(id)?;
        if ap.multi_ap == multi_ap {
            return Ok(());
        }
        ap.multi_ap = multi_ap;
        self.touch(id.into(), FsmAction::ApMultiAp.into())
    }

    /// Caps the associated device table; bounded by the radio capability.
    #[instrument(skip(self))]
    pub fn set_ap_max_stations(&mut self, id: ApId, max: usize) -> WldResult<()> {
        let radio = self.ap_ref(id)?.radio;
        let limit = self.radio_ref(radio)?.max_stations;
        if max == 0 || max > limit {
            return Err(WldError::invalid_param(
                "max_stations",
                format!("must be within 1..={}", limit),
            ));
        }
        let ap = self.ap_mut(id)?;
        if ap.max_stations == max {
            return Ok(());
        }
        ap.max_stations = max;
        self.enforce_station_cap(id)?;
        self.touch(id.into(), FsmAction::ApMaxStations.into())
    }

    /// Forces a full resynchronization of the access point.
    pub fn request_ap_sync(&mut self, id: ApId) -> WldResult<()> {
        self.request_sync(id.into())
    }

    #[instrument(skip(self, data))]
    pub fn add_vendor_ie(&mut self, id: ApId, oui: [u8; 3], data: Vec<u8>) -> WldResult<()> {
        if data.len() > VendorIe::MAX_DATA_LEN {
            return Err(WldError::invalid_param(
                "data",
                format!("at most {} octets", VendorIe::MAX_DATA_LEN),
            ));
        }
        let ie = VendorIe { oui, data };
        let ap = self.ap_ref(id)?;
        if ap.vendor_ies.contains(&ie) {
            return Ok(());
        }
        let status = self
            .vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
            .ap_add_vendor_ie(ap, &ie);
        check_vendor("ap_add_vendor_ie", status)?;
        self.ap_mut(id)?.vendor_ies.push(ie);
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub fn del_vendor_ie(&mut self, id: ApId, oui: [u8; 3], data: &[u8]) -> WldResult<()> {
        let ap = self.ap_ref(id)?;
        let Some(ie) = ap
            .vendor_ies
            .iter()
            .find(|ie| ie.oui == oui && ie.data == data)
            .cloned()
        else {
            return Err(WldError::not_found("vendor ie", format!("{:02x?}", oui)));
        };
        let status = self
            .vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
            .ap_del_vendor_ie(ap, &ie);
        check_vendor("ap_del_vendor_ie", status)?;
        self.ap_mut(id)?.vendor_ies.retain(|other| *other != ie);
        Ok(())
    }

    /// Sets the AP status when given, recomputes its SSID status and
    /// publishes the transition if either changed.
    pub(crate) fn update_ap_status(&mut self, id: ApId, status: Option<ApStatus>) {
        let Some(ap) = self.aps.get_mut(&id) else {
            return;
        };
        let old_ap_status = ap.status;
        if let Some(status) = status {
            ap.status = status;
        }
        let (ap_status, ssid) = (ap.status, ap.ssid);
        let Some(old_ssid_status) = self.recompute_ssid_status(ssid) else {
            return;
        };
        let ssid_status = self.ssids.get(&ssid).map_or(old_ssid_status, |s| s.status);
        if old_ap_status == ap_status && old_ssid_status == ssid_status {
            return;
        }
        info!(
            ap = %id,
            %old_ap_status,
            %ap_status,
            %old_ssid_status,
            %ssid_status,
            "access point status changed"
        );
        self.bus.ap_status.notify(&ApStatusChange {
            ap: id,
            old_ap_status,
            old_ssid_status,
            ap_status,
            ssid_status,
        });
        self.notify_link_changed(ssid);
    }
}
