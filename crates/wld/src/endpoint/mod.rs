//! Endpoints (STA-mode interfaces).
//!
//! An endpoint connects with one of its profiles. Selection and the
//! resulting FSM work happen in [`WldContext::reconfigure_endpoint`], which
//! is re-entrant: every edit affecting the connection goes through it.

mod exec;
mod profile;
mod reconnect;
mod wps;

pub use profile::{validate_profile, EndPointProfile};
pub use reconnect::ReconnectState;
pub use wps::EpWpsSession;

use crate::context::{WldContext, WPA_SUPPLICANT};
use crate::error::{check_vendor, WldError, WldResult};
use crate::events::{EpChange, EpLifecycleEvent, EpStatusChange};
use crate::fsm::{Fsm, FsmAction};
use crate::handle::{DmnId, EpId, RadioId, SsidId};
use crate::ssid::{Ssid, SsidOwner};
use crate::tinyroam::{RoamResult, TinyRoam};
use crate::vendor::StationStats;
use profile::select_profile;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, instrument, warn};
use wld_types::{ConnectionStatus, EndpointError, EndpointStatus, MacAddress};

#[derive(Debug, Serialize)]
pub struct Endpoint {
    pub id: EpId,
    pub alias: String,
    pub radio: RadioId,
    pub ssid: SsidId,
    pub enable: bool,
    pub status: EndpointStatus,
    pub connection_status: ConnectionStatus,
    pub error: EndpointError,
    pub profiles: Vec<EndPointProfile>,
    /// Alias of the profile pinned by the operator.
    pub profile_ref: Option<String>,
    /// Alias of the profile in use; always one of `profiles`.
    pub current_profile: Option<String>,
    /// BSSID of the AP currently connected to (null when not connected).
    pub current_bssid: MacAddress,
    /// Own interface address.
    pub mac: MacAddress,
    pub reconnect: ReconnectState,
    pub wps: EpWpsSession,
    pub roam: TinyRoam,
    pub intf_created: bool,
    pub(crate) wpa_supplicant: Option<DmnId>,
    /// Set by an explicit disconnect; cleared by the next reconfiguration.
    pub hold_disconnected: bool,
    /// BSSID the next connect is pinned to.
    pub(crate) connect_bssid: Option<MacAddress>,
    pub fsm: Fsm,
}

impl Endpoint {
    fn new(id: EpId, alias: &str, radio: RadioId, ssid: SsidId, mac: MacAddress) -> Self {
        Self {
            id,
            alias: alias.to_string(),
            radio,
            ssid,
            enable: false,
            status: EndpointStatus::Disabled,
            connection_status: ConnectionStatus::Disabled,
            error: EndpointError::None,
            profiles: Vec::new(),
            profile_ref: None,
            current_profile: None,
            current_bssid: MacAddress::NULL,
            mac,
            reconnect: ReconnectState::default(),
            wps: EpWpsSession::default(),
            roam: TinyRoam::default(),
            intf_created: false,
            wpa_supplicant: None,
            hold_disconnected: false,
            connect_bssid: None,
            fsm: Fsm::new(),
        }
    }

    pub fn current_profile(&self) -> Option<&EndPointProfile> {
        let alias = self.current_profile.as_deref()?;
        self.profiles.iter().find(|p| p.alias == alias)
    }

    pub fn wpa_supplicant(&self) -> Option<DmnId> {
        self.wpa_supplicant
    }

    /// Able to connect: enabled and holding a valid profile.
    pub fn is_ready(&self) -> bool {
        self.enable && self.status == EndpointStatus::Enabled && self.current_profile().is_some()
    }

    /// A connect, WPS pairing or roam is under way.
    pub fn is_busy(&self) -> bool {
        self.roam.is_active()
            || matches!(
                self.connection_status,
                ConnectionStatus::WpsPairing | ConnectionStatus::Connecting
            )
    }
}

impl WldContext {
    /// Creates an endpoint and its SSID on a radio.
    #[instrument(skip(self))]
    pub fn add_endpoint(&mut self, radio: RadioId, alias: &str) -> WldResult<EpId> {
        if alias.is_empty() {
            return Err(WldError::invalid_param("alias", "must not be empty"));
        }
        if self.find_endpoint(alias).is_some() {
            return Err(WldError::invalid_state(format!(
                "endpoint '{}' already exists",
                alias
            )));
        }
        let id = EpId(self.alloc.next());
        let ssid_id = SsidId(self.alloc.next());

        let r = self.radio_mut(radio)?;
        let mac = r.mac.with_offset(r.next_intf_slot);
        r.next_intf_slot += 1;
        r.endpoints.push(id);

        let mut ssid = Ssid::new(ssid_id, alias, "", radio, mac);
        ssid.owner = SsidOwner::Endpoint(id);
        self.ssids.insert(ssid_id, ssid);

        let conf = self.wpa_supplicant_conf_path(alias);
        let dmn = self.dmns.dmn_create(
            &format!("{}-{}", WPA_SUPPLICANT, alias),
            &self.config.secdmn.wpa_supplicant_cmd,
            &format!("-i{} -c{}", alias, conf.display()),
            self.config.secdmn.ctrl_iface_dir.join(WPA_SUPPLICANT),
        );

        let mut ep = Endpoint::new(id, alias, radio, ssid_id, mac);
        ep.wpa_supplicant = Some(dmn);
        ep.fsm.set_sync_all();
        self.endpoints.insert(id, ep);
        self.recompute_ssid_status(ssid_id);

        info!(ep = %alias, %id, %radio, %mac, "endpoint created");
        self.bus.ep_lifecycle.notify(&EpLifecycleEvent {
            ep: id,
            change: EpChange::Create,
        });
        self.schedule_autocommit();
        Ok(id)
    }

    #[instrument(skip(self))]
    pub fn delete_endpoint(&mut self, id: EpId) -> WldResult<()> {
        if self.ep_ref(id)?.roam.is_active() {
            self.finish_roam(id, RoamResult::AllAttemptsFailed);
        }
        let ep = self.ep_ref(id)?;
        let (radio, ssid) = (ep.radio, ep.ssid);
        let ops = self.vendor_ops(&self.radio_ref(radio)?.vendor)?;
        if !ep.current_bssid.is_null() || ep.connection_status.is_in_progress() {
            if let Err(e) = check_vendor("ep_disconnect", ops.ep_disconnect(ep)) {
                warn!(%id, error = %e, "disconnect on delete failed");
            }
        }
        if ep.intf_created {
            let status = ops.ep_destroy_intf(self.radio_ref(radio)?, ep);
            if let Err(e) = check_vendor("ep_destroy_intf", status) {
                warn!(%id, error = %e, "interface destroy failed");
            }
        }
        self.unregister_ssid_link(ssid);

        let ep = self.ep_mut(id)?;
        let timers = [
            ep.fsm.timer.take(),
            ep.reconnect.timer.take(),
            ep.wps.timer.take(),
        ];
        let dmn = ep.wpa_supplicant.take();
        for timer in timers {
            self.cancel(timer);
        }
        if let Some(dmn) = dmn {
            self.dmns.dmn_destroy(dmn)?;
        }

        self.ssids.remove(&ssid);
        let alias = self
            .endpoints
            .remove(&id)
            .map(|ep| ep.alias)
            .unwrap_or_default();
        if let Some(r) = self.radios.get_mut(&radio) {
            r.endpoints.retain(|e| *e != id);
        }
        info!(ep = %alias, %id, "endpoint deleted");
        self.bus.ep_lifecycle.notify(&EpLifecycleEvent {
            ep: id,
            change: EpChange::Destroy,
        });
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn set_endpoint_enable(&mut self, id: EpId, enable: bool) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        if ep.enable == enable {
            return Ok(());
        }
        ep.enable = enable;
        self.reconfigure_endpoint(id)
    }

    /// Re-evaluates profile selection and queues the resulting FSM work.
    ///
    /// Without a usable profile the endpoint is parked as misconfigured and
    /// no reconnect is scheduled: the condition is not transient.
    #[instrument(skip(self))]
    pub fn reconfigure_endpoint(&mut self, id: EpId) -> WldResult<()> {
        let ssid_enable = {
            let ep = self.ep_ref(id)?;
            self.ssids.get(&ep.ssid).is_some_and(|s| s.enable)
        };
        let ep = self.ep_mut(id)?;
        ep.hold_disconnected = false;

        if !ep.enable || !ssid_enable {
            ep.current_profile = None;
            ep.error = EndpointError::None;
            let timer = ep.reconnect.clear();
            self.cancel(timer);
            self.update_ep_status(
                id,
                Some(EndpointStatus::Disabled),
                Some(ConnectionStatus::Disabled),
            );
            self.refresh_ep_secdmn(id, false)?;
            return self.touch(id.into(), FsmAction::EpEnable | FsmAction::EpDisconnect);
        }

        let selected = select_profile(&ep.profiles, ep.profile_ref.as_deref())
            .filter(|p| validate_profile(p).is_ok())
            .map(|p| (p.alias.clone(), p.ssid.clone()));
        let Some((alias, ssid_name)) = selected else {
            warn!(ep = %ep.alias, "no valid profile, endpoint misconfigured");
            ep.current_profile = None;
            ep.error = EndpointError::Misconfigured;
            let timer = ep.reconnect.clear();
            self.cancel(timer);
            self.update_ep_status(
                id,
                Some(EndpointStatus::Error),
                Some(ConnectionStatus::Idle),
            );
            return Ok(());
        };

        let changed = ep.current_profile.as_deref() != Some(alias.as_str());
        ep.current_profile = Some(alias.clone());
        ep.error = EndpointError::None;
        let ssid = ep.ssid;
        if changed {
            info!(ep = %ep.alias, profile = %alias, "profile selected");
        }
        if let Some(s) = self.ssids.get_mut(&ssid) {
            s.name = ssid_name;
        }
        let connection = match self.ep_ref(id)?.connection_status {
            ConnectionStatus::Disabled | ConnectionStatus::ErrorMisconfigured => {
                Some(ConnectionStatus::Idle)
            }
            _ => None,
        };
        self.update_ep_status(id, Some(EndpointStatus::Enabled), connection);

        let mut actions = FsmAction::EpProfile | FsmAction::EpEnable;
        if changed {
            actions |= FsmAction::EpDisconnect;
        }
        if changed || self.ep_ref(id)?.connection_status != ConnectionStatus::Connected {
            actions |= FsmAction::EpConnect;
        }
        self.touch(id.into(), actions)
    }

    /// Drops the connection and keeps the endpoint disconnected until it is
    /// reconfigured.
    #[instrument(skip(self))]
    pub fn endpoint_disconnect(&mut self, id: EpId) -> WldResult<()> {
        if self.ep_ref(id)?.roam.is_active() {
            self.finish_roam(id, RoamResult::Replaced);
        }
        let ep = self.ep_mut(id)?;
        ep.hold_disconnected = true;
        let timer = ep.reconnect.clear();
        self.cancel(timer);
        self.touch(id.into(), FsmAction::EpDisconnect.into())
    }

    pub fn endpoint_stats(&self, id: EpId) -> WldResult<StationStats> {
        let ep = self.ep_ref(id)?;
        self.vendor_ops(&self.radio_ref(ep.radio)?.vendor)?
            .ep_stats(ep)
            .map_err(|status| WldError::vendor("ep_stats", status))
    }

    pub(crate) fn wpa_supplicant_conf_path(&self, ep_alias: &str) -> PathBuf {
        self.config
            .secdmn
            .conf_dir
            .join(format!("{}-{}.conf", ep_alias, WPA_SUPPLICANT))
    }

    /// Applies status changes, recomputes the SSID status and publishes the
    /// transition when anything changed, including the connected BSSID.
    pub(crate) fn update_ep_status(
        &mut self,
        id: EpId,
        status: Option<EndpointStatus>,
        connection_status: Option<ConnectionStatus>,
    ) {
        self.publish_ep_status(id, status, connection_status, false);
    }

    pub(crate) fn publish_ep_status(
        &mut self,
        id: EpId,
        status: Option<EndpointStatus>,
        connection_status: Option<ConnectionStatus>,
        bssid_changed: bool,
    ) {
        let Some(ep) = self.endpoints.get_mut(&id) else {
            return;
        };
        let (old_status, old_connection_status) = (ep.status, ep.connection_status);
        if let Some(status) = status {
            ep.status = status;
        }
        if let Some(connection_status) = connection_status {
            ep.connection_status = connection_status;
        }
        let (status, connection_status, bssid, ssid) =
            (ep.status, ep.connection_status, ep.current_bssid, ep.ssid);
        let old_ssid_status = self.recompute_ssid_status(ssid);
        let ssid_changed = old_ssid_status
            .zip(self.ssids.get(&ssid).map(|s| s.status))
            .is_some_and(|(old, new)| old != new);

        if old_status == status && old_connection_status == connection_status && !bssid_changed {
            if ssid_changed {
                self.notify_link_changed(ssid);
            }
            return;
        }
        info!(
            ep = %id,
            %old_status,
            %status,
            %old_connection_status,
            %connection_status,
            %bssid,
            "endpoint status changed"
        );
        self.bus.ep_status.notify(&EpStatusChange {
            ep: id,
            old_status,
            old_connection_status,
            status,
            connection_status,
            bssid,
        });
        if ssid_changed {
            self.notify_link_changed(ssid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::SecurityConfig;

    #[test]
    fn test_ready_requires_valid_current_profile() {
        let mut ep = Endpoint::new(EpId(4), "sta0", RadioId(1), SsidId(5), MacAddress::NULL);
        assert!(!ep.is_ready());
        ep.enable = true;
        ep.status = EndpointStatus::Enabled;
        ep.profiles.push(EndPointProfile::new(
            "home",
            "home",
            SecurityConfig::wpa2_personal("password123"),
        ));
        assert!(!ep.is_ready());
        ep.current_profile = Some("home".to_string());
        assert!(ep.is_ready());
        // a dangling alias never resolves
        ep.current_profile = Some("gone".to_string());
        assert!(ep.current_profile().is_none());
    }
}
