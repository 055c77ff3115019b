//! Access point FSM executor and post-commit effects.

use super::AccessPoint;
use crate::context::{TimerAction, WldContext};
use crate::error::WldResult;
use crate::events::{ApChange, ApLifecycleEvent};
use crate::fsm::{ActionSet, FsmAction, FsmEntity, FsmExecutor, FsmKind, FsmState, FsmStep, StepMode};
use crate::handle::ApId;
use crate::radio::Radio;
use crate::ssid::Ssid;
use crate::vendor::VendorOps;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use wld_common::SwlStatus;
use wld_types::ApStatus;

struct ApExecutor<'a> {
    ops: &'a dyn VendorOps,
    radio: &'a Radio,
    ap: &'a AccessPoint,
    ssid: &'a Ssid,
    conf_path: &'a Path,
}

impl FsmExecutor for ApExecutor<'_> {
    fn kind(&self) -> FsmKind {
        FsmKind::AccessPoint
    }

    /// The radio must be ready and not in the middle of its own commit.
    fn dependencies_ready(&self) -> bool {
        self.radio.is_ready
            && self.radio.fsm.state() != FsmState::Error
            && !self.radio.fsm.is_commit_pending()
    }

    fn execute(&mut self, action: FsmAction) -> SwlStatus {
        let (ops, radio, ap, ssid) = (self.ops, self.radio, self.ap, self.ssid);
        debug!(ap = %ap.alias, %action, "access point action");
        match action {
            FsmAction::ApCreateVap if ap.vap_created => SwlStatus::Ok,
            FsmAction::ApCreateVap => ops.ap_create_vap(radio, ap, ssid),
            FsmAction::ApSsid => ops.ap_sync_ssid(ap, ssid),
            FsmAction::ApSecurity => ops.ap_sync_security(ap),
            FsmAction::ApMultiAp => ops.ap_sync_multi_ap(ap),
            FsmAction::ApMaxStations => ops.ap_set_max_stations(ap, ap.max_stations),
            FsmAction::ApSecDmn => ops.ap_sync_secdmn(radio, ap, self.conf_path),
            FsmAction::ApEnable => ops.ap_enable(ap, ap.enable && ssid.enable),
            _ => SwlStatus::NotImplemented,
        }
    }
}

impl WldContext {
    pub(crate) fn step_ap(&mut self, id: ApId, mode: StepMode) -> WldResult<FsmStep> {
        let ap = self.ap_ref(id)?;
        let radio = self.radio_ref(ap.radio)?;
        let ops = self.vendor_ops(&radio.vendor)?;
        let conf_path = self.hostapd_conf_path(&radio.name);
        let (radio_id, ssid_id) = (ap.radio, ap.ssid);
        let now = self.now();

        let mut fsm = std::mem::take(&mut self.ap_mut(id)?.fsm);
        let step = match (
            self.aps.get(&id),
            self.radios.get(&radio_id),
            self.ssids.get(&ssid_id),
        ) {
            (Some(ap), Some(radio), Some(ssid)) => {
                let mut exec = ApExecutor {
                    ops: ops.as_ref(),
                    radio,
                    ap,
                    ssid,
                    conf_path: &conf_path,
                };
                fsm.step(mode, now, &self.fsm_cfg, &mut exec)
            }
            _ => FsmStep::Idle,
        };
        let done = fsm.take_done();
        self.ap_mut(id)?.fsm = fsm;
        self.after_ap_step(id, step, done)?;
        Ok(step)
    }

    fn after_ap_step(&mut self, id: ApId, step: FsmStep, done: ActionSet) -> WldResult<()> {
        let ap = self.ap_mut(id)?;
        let (radio, ssid, ap_enable) = (ap.radio, ap.ssid, ap.enable);
        let created = done.contains(FsmAction::ApCreateVap) && !ap.vap_created;
        if created {
            ap.vap_created = true;
        }
        let enabled = ap_enable && self.ssids.get(&ssid).is_some_and(|s| s.enable);
        if created {
            info!(ap = %id, "vap created");
            self.bus.ap_lifecycle.notify(&ApLifecycleEvent {
                ap: id,
                change: ApChange::CreateFinal,
            });
        }

        // hostapd serves every BSS of the radio
        if done.contains(FsmAction::ApSecDmn) || done.contains(FsmAction::ApEnable) {
            let entity = FsmEntity::Radio(radio);
            if let Some(fsm) = self.fsm_mut(entity) {
                fsm.mark_dirty(FsmAction::RadioSecDmn);
                self.schedule_fsm(entity, Duration::ZERO, TimerAction::FsmRun(entity));
            }
        }

        match step {
            FsmStep::Finished => {
                let status = if enabled {
                    ApStatus::Enabled
                } else {
                    ApStatus::Disabled
                };
                if status == ApStatus::Disabled {
                    self.flush_stations(id);
                }
                self.update_ap_status(id, Some(status));
            }
            FsmStep::Failed => {
                self.flush_stations(id);
                self.update_ap_status(id, Some(ApStatus::Error));
            }
            FsmStep::Idle
            | FsmStep::Busy
            | FsmStep::Halted
            | FsmStep::Dependency
            | FsmStep::Wait
            | FsmStep::Retry => {}
        }
        Ok(())
    }
}
