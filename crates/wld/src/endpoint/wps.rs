//! WPS enrollee sessions of an endpoint.

use super::EndPointProfile;
use crate::ap::WpsStatus;
use crate::context::{TimerAction, WldContext};
use crate::error::{check_vendor, WldError, WldResult};
use crate::handle::EpId;
use serde::Serialize;
use tracing::{info, instrument, warn};
use wld_common::TimerId;
use wld_types::{ConnectionStatus, EndpointError, EndpointStatus};

#[derive(Debug, Default, Serialize)]
pub struct EpWpsSession {
    pub status: WpsStatus,
    pub nr_sessions: u32,
    #[serde(skip)]
    pub(crate) timer: Option<TimerId>,
}

impl WldContext {
    /// Starts push-button pairing; the walk-time timer bounds the session.
    #[instrument(skip(self))]
    pub fn ep_wps_start(&mut self, id: EpId) -> WldResult<()> {
        let ep = self.ep_ref(id)?;
        if !ep.enable || ep.status == EndpointStatus::Disabled {
            return Err(WldError::invalid_state(format!(
                "endpoint '{}' is disabled",
                ep.alias
            )));
        }
        if ep.wps.status == WpsStatus::InProgress {
            return Err(WldError::invalid_state("wps session already in progress"));
        }
        if ep.roam.is_active() {
            return Err(WldError::invalid_state("roam in progress"));
        }
        let status = self
            .vendor_ops(&self.radio_ref(ep.radio)?.vendor)?
            .ep_wps_start(ep);
        check_vendor("ep_wps_start", status)?;

        let walk_time = self.config.endpoint.wps_walk_time();
        let ep = self.ep_mut(id)?;
        let old = [ep.wps.timer.take(), ep.reconnect.clear()];
        for timer in old {
            self.cancel(timer);
        }
        let timer = self.arm(walk_time, TimerAction::EpWpsTimeout(id));
        let ep = self.ep_mut(id)?;
        ep.wps.status = WpsStatus::InProgress;
        ep.wps.nr_sessions += 1;
        ep.wps.timer = Some(timer);
        info!(ep = %ep.alias, "wps pairing started");
        self.update_ep_status(id, None, Some(ConnectionStatus::WpsPairing));
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn ep_wps_cancel(&mut self, id: EpId) -> WldResult<()> {
        let ep = self.ep_ref(id)?;
        if ep.wps.status != WpsStatus::InProgress {
            return Ok(());
        }
        let status = self
            .vendor_ops(&self.radio_ref(ep.radio)?.vendor)?
            .ep_wps_cancel(ep);
        check_vendor("ep_wps_cancel", status)?;
        self.finish_ep_wps(id, WpsStatus::Canceled, EndpointError::WpsCanceled)?;
        self.update_ep_status(id, None, Some(ConnectionStatus::Idle));
        self.resume_ep_reconnect(id);
        Ok(())
    }

    /// Pairing outcome. On success the credentials learned by the driver
    /// become a profile and the endpoint reconnects with it.
    #[instrument(skip(self, credentials))]
    pub fn ep_wps_done(&mut self, id: EpId, credentials: Option<EndPointProfile>) -> WldResult<()> {
        if self.ep_ref(id)?.wps.status != WpsStatus::InProgress {
            return Err(WldError::invalid_state("no wps session in progress"));
        }
        let Some(profile) = credentials else {
            self.finish_ep_wps(id, WpsStatus::Error, EndpointError::None)?;
            self.update_ep_status(id, None, Some(ConnectionStatus::Error));
            self.resume_ep_reconnect(id);
            return Ok(());
        };
        super::validate_profile(&profile)?;

        self.finish_ep_wps(id, WpsStatus::Success, EndpointError::None)?;
        self.update_ep_status(id, None, Some(ConnectionStatus::WpsPairingDone));
        let alias = profile.alias.clone();
        let ep = self.ep_mut(id)?;
        match ep.profiles.iter_mut().find(|p| p.alias == alias) {
            Some(slot) => *slot = profile,
            None => ep.profiles.push(profile),
        }
        ep.profile_ref = Some(alias);
        ep.current_profile = None;
        self.reconfigure_endpoint(id)
    }

    pub(crate) fn handle_ep_wps_timeout(&mut self, id: EpId) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        ep.wps.timer = None;
        if ep.wps.status != WpsStatus::InProgress {
            return Ok(());
        }
        let ep = self.ep_ref(id)?;
        let status = self
            .vendor_ops(&self.radio_ref(ep.radio)?.vendor)?
            .ep_wps_cancel(ep);
        if let Err(e) = check_vendor("ep_wps_cancel", status) {
            warn!(%id, error = %e, "wps cancel on walk-time expiry failed");
        }
        self.finish_ep_wps(id, WpsStatus::Timeout, EndpointError::WpsTimeout)?;
        self.update_ep_status(id, None, Some(ConnectionStatus::WpsTimeout));
        self.resume_ep_reconnect(id);
        Ok(())
    }

    fn finish_ep_wps(&mut self, id: EpId, status: WpsStatus, error: EndpointError) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        let timer = ep.wps.timer.take();
        ep.wps.status = status;
        if error != EndpointError::None {
            ep.error = error;
        }
        info!(ep = %ep.alias, ?status, "wps pairing ended");
        self.cancel(timer);
        Ok(())
    }
}
