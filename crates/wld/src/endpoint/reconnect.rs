//! Connection reports from the driver and automatic reconnection.

use crate::context::{TimerAction, WldContext};
use crate::error::{WldError, WldResult};
use crate::fsm::{FsmAction, StepMode};
use crate::handle::EpId;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use wld_common::TimerId;
use wld_types::{ConnectionStatus, EndpointError, MacAddress};

#[derive(Debug, Default, Serialize)]
pub struct ReconnectState {
    /// Attempts since the last successful connection.
    pub nr_attempts: u32,
    pub nr_reconnects: u64,
    #[serde(skip)]
    pub(crate) timer: Option<TimerId>,
}

impl ReconnectState {
    /// Resets the attempt counter and hands back the armed timer, if any.
    pub(crate) fn clear(&mut self) -> Option<TimerId> {
        self.nr_attempts = 0;
        self.timer.take()
    }
}

impl WldContext {
    /// Connection state reported by the driver.
    ///
    /// `bssid` is only meaningful with `Connected`; every other state clears
    /// the connected BSSID.
    #[instrument(skip(self))]
    pub fn endpoint_connection_update(
        &mut self,
        id: EpId,
        connection_status: ConnectionStatus,
        bssid: MacAddress,
    ) -> WldResult<()> {
        if connection_status == ConnectionStatus::Connected && !bssid.is_valid_unicast() {
            return Err(WldError::invalid_param(
                "bssid",
                format!("{} is not a BSSID", bssid),
            ));
        }
        let ep = self.ep_mut(id)?;
        let was_connected = ep.connection_status == ConnectionStatus::Connected;
        let new_bssid = if connection_status == ConnectionStatus::Connected {
            bssid
        } else {
            MacAddress::NULL
        };
        let bssid_changed = ep.current_bssid != new_bssid;
        ep.current_bssid = new_bssid;

        if connection_status == ConnectionStatus::Connected {
            ep.error = EndpointError::None;
            if was_connected && bssid_changed {
                info!(ep = %ep.alias, %bssid, "endpoint roamed");
            }
            let timer = ep.reconnect.clear();
            self.cancel(timer);
            self.publish_ep_status(id, None, Some(connection_status), bssid_changed);
            return Ok(());
        }

        self.publish_ep_status(id, None, Some(connection_status), bssid_changed);
        let ep = self.ep_ref(id)?;
        let lost = was_connected || connection_status == ConnectionStatus::Error;
        if lost && ep.is_ready() && !ep.roam.is_active() && !ep.hold_disconnected {
            debug!(ep = %ep.alias, "connection lost, reconnect scheduled");
            self.schedule_ep_reconnect(id)?;
        }
        Ok(())
    }

    /// Records a connection failure reported by the driver.
    #[instrument(skip(self))]
    pub fn endpoint_report_error(&mut self, id: EpId, error: EndpointError) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        ep.error = error;
        warn!(ep = %ep.alias, %error, "endpoint connection error");
        let connection = if error == EndpointError::Misconfigured {
            ConnectionStatus::ErrorMisconfigured
        } else {
            ConnectionStatus::Error
        };
        self.endpoint_connection_update(id, connection, MacAddress::NULL)
    }

    /// Arms the reconnect timer: the short delay for the first attempt, the
    /// interval for later ones. Coalesces with an armed timer.
    pub(crate) fn schedule_ep_reconnect(&mut self, id: EpId) -> WldResult<()> {
        let max = self.config.endpoint.max_reconnect_attempts;
        let ep = self.ep_ref(id)?;
        if ep.reconnect.timer.is_some() {
            return Ok(());
        }
        if max > 0 && ep.reconnect.nr_attempts >= max {
            warn!(ep = %ep.alias, attempts = ep.reconnect.nr_attempts, "reconnect attempts exhausted");
            return Ok(());
        }
        let delay = if ep.reconnect.nr_attempts == 0 {
            self.config.endpoint.reconnect_delay()
        } else {
            self.config.endpoint.reconnect_interval()
        };
        let timer = self.arm(delay, TimerAction::EpReconnect(id));
        self.ep_mut(id)?.reconnect.timer = Some(timer);
        Ok(())
    }

    /// Re-arms the reconnect timer of an enabled endpoint left without a
    /// connection, e.g. after a roam that did not get anywhere.
    pub(crate) fn resume_ep_reconnect(&mut self, id: EpId) {
        let Some(ep) = self.endpoints.get(&id) else {
            return;
        };
        if ep.connection_status == ConnectionStatus::Connected
            || !ep.is_ready()
            || ep.roam.is_active()
            || ep.hold_disconnected
        {
            return;
        }
        if let Err(e) = self.schedule_ep_reconnect(id) {
            warn!(ep = %id, error = %e, "reconnect could not be scheduled");
        }
    }

    pub(crate) fn handle_ep_reconnect(&mut self, id: EpId) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        ep.reconnect.timer = None;
        if ep.connection_status == ConnectionStatus::Connected
            || !ep.is_ready()
            || ep.roam.is_active()
            || ep.hold_disconnected
        {
            return Ok(());
        }
        ep.reconnect.nr_attempts += 1;
        ep.reconnect.nr_reconnects += 1;
        info!(ep = %ep.alias, attempt = ep.reconnect.nr_attempts, "reconnecting");
        ep.fsm.mark_dirty(FsmAction::EpConnect);
        self.step_fsm(id.into(), StepMode::Run)?;
        // the watchdog re-arms until the driver reports the connection
        self.schedule_ep_reconnect(id)
    }
}
