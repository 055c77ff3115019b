//! WPS pairing sessions of an access point.

use crate::context::{TimerAction, WldContext};
use crate::error::{check_vendor, WldError, WldResult};
use crate::handle::ApId;
use serde::Serialize;
use tracing::{info, instrument, warn};
use wld_common::TimerId;
use wld_types::ApStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WpsMethod {
    PushButton,
    Pin(String),
}

impl WpsMethod {
    /// PINs are 4 or 8 digits.
    pub fn validate(&self) -> WldResult<()> {
        match self {
            WpsMethod::PushButton => Ok(()),
            WpsMethod::Pin(pin) => {
                if matches!(pin.len(), 4 | 8) && pin.chars().all(|c| c.is_ascii_digit()) {
                    Ok(())
                } else {
                    Err(WldError::invalid_param("pin", "must be 4 or 8 digits"))
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum WpsStatus {
    #[default]
    Idle,
    InProgress,
    Success,
    Timeout,
    Canceled,
    Error,
}

#[derive(Debug, Default, Serialize)]
pub struct WpsSession {
    pub status: WpsStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<WpsMethod>,
    pub nr_sessions: u32,
    #[serde(skip)]
    pub(crate) timer: Option<TimerId>,
}

impl WldContext {
    /// Opens a WPS walk-time window on an enabled access point.
    #[instrument(skip(self))]
    pub fn ap_wps_start(&mut self, id: ApId, method: WpsMethod) -> WldResult<()> {
        method.validate()?;
        let ap = self.ap_ref(id)?;
        if ap.status != ApStatus::Enabled {
            return Err(WldError::invalid_state(format!(
                "access point '{}' is not enabled",
                ap.alias
            )));
        }
        let status = self
            .vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
            .ap_wps_start(ap, &method);
        check_vendor("ap_wps_start", status)?;

        let walk_time = self.config.endpoint.wps_walk_time();
        let old = self.ap_mut(id)?.wps.timer.take();
        self.cancel(old);
        let timer = self.arm(walk_time, TimerAction::ApWpsTimeout(id));
        let ap = self.ap_mut(id)?;
        ap.wps.status = WpsStatus::InProgress;
        ap.wps.method = Some(method);
        ap.wps.nr_sessions += 1;
        ap.wps.timer = Some(timer);
        info!(ap = %ap.alias, "wps session started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn ap_wps_cancel(&mut self, id: ApId) -> WldResult<()> {
        let ap = self.ap_ref(id)?;
        if ap.wps.status != WpsStatus::InProgress {
            return Ok(());
        }
        let status = self
            .vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
            .ap_wps_cancel(ap);
        check_vendor("ap_wps_cancel", status)?;
        self.finish_ap_wps(id, WpsStatus::Canceled)
    }

    /// Pairing outcome reported by the vendor.
    #[instrument(skip(self))]
    pub fn ap_wps_done(&mut self, id: ApId, success: bool) -> WldResult<()> {
        if self.ap_ref(id)?.wps.status != WpsStatus::InProgress {
            return Err(WldError::invalid_state("no wps session in progress"));
        }
        let status = if success {
            WpsStatus::Success
        } else {
            WpsStatus::Error
        };
        self.finish_ap_wps(id, status)
    }

    pub(crate) fn handle_ap_wps_timeout(&mut self, id: ApId) -> WldResult<()> {
        let ap = self.ap_mut(id)?;
        ap.wps.timer = None;
        if ap.wps.status != WpsStatus::InProgress {
            return Ok(());
        }
        let ap = self.ap_ref(id)?;
        let status = self
            .vendor_ops(&self.radio_ref(ap.radio)?.vendor)?
            .ap_wps_cancel(ap);
        if let Err(e) = check_vendor("ap_wps_cancel", status) {
            warn!(%id, error = %e, "wps cancel on walk-time expiry failed");
        }
        self.finish_ap_wps(id, WpsStatus::Timeout)
    }

    fn finish_ap_wps(&mut self, id: ApId, status: WpsStatus) -> WldResult<()> {
        let ap = self.ap_mut(id)?;
        let timer = ap.wps.timer.take();
        ap.wps.status = status;
        ap.wps.method = None;
        info!(ap = %ap.alias, ?status, "wps session ended");
        self.cancel(timer);
        Ok(())
    }
}
