//! Radio FSM executor and post-commit effects.

use super::{ChannelChange, Radio};
use crate::context::{TimerAction, WldContext};
use crate::error::WldResult;
use crate::fsm::{ActionSet, FsmAction, FsmEntity, FsmExecutor, FsmKind, FsmStep, StepMode};
use crate::handle::RadioId;
use crate::vendor::VendorOps;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use wld_common::SwlStatus;
use wld_types::{RadioDetailedState, RadioStatus};

struct RadioExecutor<'a> {
    ops: &'a dyn VendorOps,
    radio: &'a Radio,
    conf_path: &'a Path,
}

impl FsmExecutor for RadioExecutor<'_> {
    fn kind(&self) -> FsmKind {
        FsmKind::Radio
    }

    fn execute(&mut self, action: FsmAction) -> SwlStatus {
        let radio = self.radio;
        debug!(radio = %radio.name, %action, "radio action");
        match action {
            FsmAction::RadioStandards => self
                .ops
                .radio_set_standards(radio, radio.effective_standards()),
            FsmAction::RadioChannel => {
                self.ops
                    .radio_set_channel(radio, radio.target_channel, radio.target_bandwidth)
            }
            FsmAction::RadioTxPower => self.ops.radio_set_tx_power(radio, radio.tx_power),
            FsmAction::RadioSecDmn => self.ops.radio_sync_secdmn(radio, self.conf_path),
            FsmAction::RadioEnable => self.ops.radio_enable(radio, radio.enable),
            _ => SwlStatus::NotImplemented,
        }
    }
}

impl WldContext {
    pub(crate) fn step_radio(&mut self, id: RadioId, mode: StepMode) -> WldResult<FsmStep> {
        let radio = self.radio_ref(id)?;
        let ops = self.vendor_ops(&radio.vendor)?;
        let conf_path = self.hostapd_conf_path(&radio.name);
        let now = self.now();

        let mut fsm = std::mem::take(&mut self.radio_mut(id)?.fsm);
        let step = match self.radios.get(&id) {
            Some(radio) => {
                let mut exec = RadioExecutor {
                    ops: ops.as_ref(),
                    radio,
                    conf_path: &conf_path,
                };
                fsm.step(mode, now, &self.fsm_cfg, &mut exec)
            }
            None => FsmStep::Idle,
        };
        let done = fsm.take_done();
        self.radio_mut(id)?.fsm = fsm;
        self.after_radio_step(id, step, done)?;
        Ok(step)
    }

    fn after_radio_step(&mut self, id: RadioId, step: FsmStep, done: ActionSet) -> WldResult<()> {
        let now_ms = self.now().as_millis() as u64;
        let history_max = self.config.radio.channel_history_max;
        let radio = self.radio_mut(id)?;

        if done.contains(FsmAction::RadioChannel) && radio.has_pending_channel() {
            let change = ChannelChange {
                channel: radio.target_channel,
                bandwidth: radio.target_bandwidth,
                reason: radio.target_reason,
                at_ms: now_ms,
            };
            info!(
                radio = %radio.name,
                from = radio.channel,
                to = change.channel,
                bandwidth = %change.bandwidth,
                reason = ?change.reason,
                "channel changed"
            );
            radio.channel = change.channel;
            radio.bandwidth = change.bandwidth;
            radio.push_channel_change(change, history_max);
        }
        let status = radio.status;
        let enable = radio.enable;

        match step {
            FsmStep::Finished => {
                let (status, detailed) = if enable {
                    (RadioStatus::Up, RadioDetailedState::Up)
                } else {
                    (RadioStatus::Down, RadioDetailedState::Down)
                };
                self.set_radio_status(id, status, detailed)?;
                if done.contains(FsmAction::RadioSecDmn) || done.contains(FsmAction::RadioEnable) {
                    self.refresh_radio_secdmn(id, done.contains(FsmAction::RadioSecDmn))?;
                }
                self.kick_radio_dependants(id)?;
            }
            FsmStep::Wait => {
                self.set_radio_status(id, status, RadioDetailedState::Configuring)?;
            }
            FsmStep::Retry => {
                self.set_radio_status(id, status, RadioDetailedState::Configuring)?;
                self.resync_radio_dependants(id)?;
            }
            FsmStep::Failed => {
                self.set_radio_status(id, RadioStatus::Error, RadioDetailedState::Error)?;
                self.resync_radio_dependants(id)?;
            }
            FsmStep::Idle
            | FsmStep::Busy
            | FsmStep::Halted
            | FsmStep::Dependency => {}
        }
        Ok(())
    }

    fn radio_dependants(&self, id: RadioId) -> WldResult<Vec<FsmEntity>> {
        let radio = self.radio_ref(id)?;
        Ok(radio
            .aps
            .iter()
            .map(|ap| FsmEntity::AccessPoint(*ap))
            .chain(radio.endpoints.iter().map(|ep| FsmEntity::Endpoint(*ep)))
            .collect())
    }

    /// Re-runs dependants that have work once the radio has settled.
    fn kick_radio_dependants(&mut self, id: RadioId) -> WldResult<()> {
        for entity in self.radio_dependants(id)? {
            if self.fsm(entity).is_some_and(|f| f.is_dirty()) {
                self.schedule_fsm(entity, Duration::ZERO, TimerAction::FsmRun(entity));
            }
        }
        Ok(())
    }

    /// Radio errors invalidate whatever dependants pushed to the driver.
    fn resync_radio_dependants(&mut self, id: RadioId) -> WldResult<()> {
        for entity in self.radio_dependants(id)? {
            if let Some(fsm) = self.fsm_mut(entity) {
                fsm.set_sync_all();
            }
        }
        Ok(())
    }

    /// Aligns the radio's hostapd with its enabled access points.
    pub(crate) fn refresh_radio_secdmn(&mut self, id: RadioId, config_written: bool) -> WldResult<()> {
        let radio = self.radio_ref(id)?;
        let Some(dmn) = radio.hostapd else {
            return Ok(());
        };
        let wanted = radio.enable
            && radio
                .aps
                .iter()
                .filter_map(|ap| self.aps.get(ap))
                .any(|ap| ap.enable && ap.vap_created);
        let was = self.dmns.dmn(dmn).is_some_and(|d| d.enabled);

        if config_written {
            self.dmns.dmn_set_has_config(dmn, true)?;
        }
        self.dmns.dmn_set_enabled(dmn, wanted)?;
        if wanted != was || (wanted && config_written) {
            debug!(%dmn, wanted, config_written, "hostapd restart scheduled");
            self.schedule_dmn_restart(dmn);
        }
        Ok(())
    }
}
