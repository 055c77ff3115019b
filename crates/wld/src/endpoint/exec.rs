//! Endpoint FSM executor and post-commit effects.

use super::{EndPointProfile, Endpoint};
use crate::context::WldContext;
use crate::error::WldResult;
use crate::events::{EpChange, EpLifecycleEvent};
use crate::fsm::{ActionSet, FsmAction, FsmExecutor, FsmKind, FsmState, FsmStep, StepMode};
use crate::handle::EpId;
use crate::radio::Radio;
use crate::vendor::VendorOps;
use std::path::Path;
use tracing::{debug, info};
use wld_common::SwlStatus;
use wld_types::{ConnectionStatus, EndpointStatus, MacAddress};

struct EpExecutor<'a> {
    ops: &'a dyn VendorOps,
    radio: &'a Radio,
    ep: &'a Endpoint,
    profile: Option<&'a EndPointProfile>,
    ssid_enable: bool,
    conf_path: &'a Path,
    connect_issued: bool,
    disconnect_issued: bool,
}

impl FsmExecutor for EpExecutor<'_> {
    fn kind(&self) -> FsmKind {
        FsmKind::Endpoint
    }

    fn dependencies_ready(&self) -> bool {
        self.radio.is_ready
            && self.radio.fsm.state() != FsmState::Error
            && !self.radio.fsm.is_commit_pending()
    }

    fn execute(&mut self, action: FsmAction) -> SwlStatus {
        let (ops, ep) = (self.ops, self.ep);
        debug!(ep = %ep.alias, %action, "endpoint action");
        match action {
            FsmAction::EpCreateIntf if ep.intf_created => SwlStatus::Ok,
            FsmAction::EpCreateIntf => ops.ep_create_intf(self.radio, ep),
            FsmAction::EpProfile => match self.profile {
                Some(profile) => ops.ep_sync_secdmn(ep, profile, self.conf_path),
                None => SwlStatus::Ok,
            },
            FsmAction::EpEnable => {
                ops.ep_enable(ep, ep.enable && self.ssid_enable && self.profile.is_some())
            }
            FsmAction::EpDisconnect => {
                if ep.current_bssid.is_null() && !ep.connection_status.is_in_progress() {
                    return SwlStatus::Ok;
                }
                self.disconnect_issued = true;
                ops.ep_disconnect(ep)
            }
            FsmAction::EpConnect => match self.profile {
                Some(profile) if ep.enable && self.ssid_enable && !ep.hold_disconnected => {
                    self.connect_issued = true;
                    ops.ep_connect(ep, profile, ep.connect_bssid.or(profile.forced_bssid))
                }
                _ => SwlStatus::Ok,
            },
            _ => SwlStatus::NotImplemented,
        }
    }
}

impl WldContext {
    pub(crate) fn step_endpoint(&mut self, id: EpId, mode: StepMode) -> WldResult<FsmStep> {
        let ep = self.ep_ref(id)?;
        let ops = self.vendor_ops(&self.radio_ref(ep.radio)?.vendor)?;
        let conf_path = self.wpa_supplicant_conf_path(&ep.alias);
        let (radio_id, ssid_id) = (ep.radio, ep.ssid);
        let now = self.now();

        let mut fsm = std::mem::take(&mut self.ep_mut(id)?.fsm);
        let (step, connect_issued, disconnect_issued) =
            match (self.endpoints.get(&id), self.radios.get(&radio_id)) {
                (Some(ep), Some(radio)) => {
                    let mut exec = EpExecutor {
                        ops: ops.as_ref(),
                        radio,
                        ep,
                        profile: ep.current_profile(),
                        ssid_enable: self.ssids.get(&ssid_id).is_some_and(|s| s.enable),
                        conf_path: &conf_path,
                        connect_issued: false,
                        disconnect_issued: false,
                    };
                    let step = fsm.step(mode, now, &self.fsm_cfg, &mut exec);
                    (step, exec.connect_issued, exec.disconnect_issued)
                }
                _ => (FsmStep::Idle, false, false),
            };
        let done = fsm.take_done();
        self.ep_mut(id)?.fsm = fsm;
        self.after_ep_step(id, step, done, connect_issued, disconnect_issued)?;
        Ok(step)
    }

    fn after_ep_step(
        &mut self,
        id: EpId,
        step: FsmStep,
        done: ActionSet,
        connect_issued: bool,
        disconnect_issued: bool,
    ) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        let created = done.contains(FsmAction::EpCreateIntf) && !ep.intf_created;
        if created {
            ep.intf_created = true;
            info!(ep = %id, "interface created");
            self.bus.ep_lifecycle.notify(&EpLifecycleEvent {
                ep: id,
                change: EpChange::CreateFinal,
            });
        }

        if done.contains(FsmAction::EpProfile) || done.contains(FsmAction::EpEnable) {
            self.refresh_ep_secdmn(id, done.contains(FsmAction::EpProfile))?;
        }

        if disconnect_issued && done.contains(FsmAction::EpDisconnect) {
            let ep = self.ep_mut(id)?;
            let bssid_changed = !ep.current_bssid.is_null();
            ep.current_bssid = MacAddress::NULL;
            let connection = if ep.status == EndpointStatus::Enabled {
                ConnectionStatus::Disconnected
            } else {
                ConnectionStatus::Disabled
            };
            self.publish_ep_status(id, None, Some(connection), bssid_changed);
        }

        if connect_issued && done.contains(FsmAction::EpConnect) {
            let ep = self.ep_ref(id)?;
            let roaming = ep.roam.is_active();
            if ep.connection_status != ConnectionStatus::Connected || roaming {
                self.update_ep_status(id, None, Some(ConnectionStatus::Connecting));
            }
            if !roaming {
                // watchdog until the driver reports the connection
                self.schedule_ep_reconnect(id)?;
            }
        }

        match step {
            FsmStep::Failed => {
                self.update_ep_status(
                    id,
                    Some(EndpointStatus::Error),
                    Some(ConnectionStatus::Error),
                );
            }
            FsmStep::Finished
            | FsmStep::Idle
            | FsmStep::Busy
            | FsmStep::Halted
            | FsmStep::Dependency
            | FsmStep::Wait
            | FsmStep::Retry => {}
        }
        Ok(())
    }

    /// Aligns the endpoint's wpa_supplicant with its configuration.
    pub(crate) fn refresh_ep_secdmn(&mut self, id: EpId, config_written: bool) -> WldResult<()> {
        let ep = self.ep_ref(id)?;
        let Some(dmn) = ep.wpa_supplicant else {
            return Ok(());
        };
        let wanted = ep.enable
            && ep.intf_created
            && ep.current_profile().is_some()
            && self.ssids.get(&ep.ssid).is_some_and(|s| s.enable);
        let was = self.dmns.dmn(dmn).is_some_and(|d| d.enabled);

        if config_written {
            self.dmns.dmn_set_has_config(dmn, true)?;
        }
        self.dmns.dmn_set_enabled(dmn, wanted)?;
        if wanted != was || (wanted && config_written) {
            debug!(%dmn, wanted, config_written, "wpa_supplicant restart scheduled");
            self.schedule_dmn_restart(dmn);
        }
        Ok(())
    }
}
