//! SSID data holder.
//!
//! An SSID carries the name/BSSID state shared by its single AP or endpoint.
//! The AP or endpoint refers to it by handle; the SSID refers back to its
//! owner the same way.

use crate::context::WldContext;
use crate::error::{WldError, WldResult};
use crate::fsm::FsmAction;
use crate::handle::{ApId, EpId, RadioId, SsidId};
use serde::Serialize;
use tracing::instrument;
use wld_types::{ApStatus, ConnectionStatus, EndpointStatus, MacAddress, RadioStatus, SsidStatus};

/// Maximum SSID length in octets.
pub const SSID_MAX_LEN: usize = 32;

/// Entity the SSID is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SsidOwner {
    Untyped,
    AccessPoint(ApId),
    Endpoint(EpId),
}

#[derive(Debug, Serialize)]
pub struct Ssid {
    pub id: SsidId,
    pub alias: String,
    pub name: String,
    pub radio: RadioId,
    pub owner: SsidOwner,
    pub enable: bool,
    pub bssid: MacAddress,
    pub status: SsidStatus,
    pub mld_unit: Option<u32>,
}

impl Ssid {
    pub(crate) fn new(id: SsidId, alias: &str, name: &str, radio: RadioId, bssid: MacAddress) -> Self {
        Self {
            id,
            alias: alias.to_string(),
            name: name.to_string(),
            radio,
            owner: SsidOwner::Untyped,
            enable: true,
            bssid,
            status: SsidStatus::Down,
            mld_unit: None,
        }
    }
}

/// Validates an SSID name.
pub fn validate_ssid_name(name: &str) -> WldResult<()> {
    if name.is_empty() || name.len() > SSID_MAX_LEN {
        return Err(WldError::invalid_param(
            "ssid",
            format!("length must be 1..={} octets", SSID_MAX_LEN),
        ));
    }
    Ok(())
}

/// Abstract SSID status for an AP-bound SSID.
pub(crate) fn ap_ssid_status(ssid_enable: bool, radio: RadioStatus, ap: ApStatus) -> SsidStatus {
    if !ssid_enable || ap == ApStatus::Disabled {
        SsidStatus::Down
    } else if radio != RadioStatus::Up {
        SsidStatus::LowerLayerDown
    } else if matches!(ap, ApStatus::Error | ApStatus::ErrorMisconfigured) {
        SsidStatus::Error
    } else {
        SsidStatus::Up
    }
}

/// Abstract SSID status for an endpoint-bound SSID.
pub(crate) fn ep_ssid_status(
    ssid_enable: bool,
    radio: RadioStatus,
    status: EndpointStatus,
    connection: ConnectionStatus,
) -> SsidStatus {
    if !ssid_enable || status == EndpointStatus::Disabled {
        SsidStatus::Down
    } else if radio != RadioStatus::Up {
        SsidStatus::LowerLayerDown
    } else if status == EndpointStatus::Error {
        SsidStatus::Error
    } else if connection == ConnectionStatus::Connected {
        SsidStatus::Up
    } else {
        SsidStatus::Dormant
    }
}

impl WldContext {
    /// Recomputes the abstract status of an SSID from its owner and radio.
    ///
    /// Returns the previous status.
    pub(crate) fn recompute_ssid_status(&mut self, id: SsidId) -> Option<SsidStatus> {
        let ssid = self.ssids.get(&id)?;
        let radio_status = self
            .radios
            .get(&ssid.radio)
            .map(|r| r.status)
            .unwrap_or(RadioStatus::NotPresent);
        let status = match ssid.owner {
            SsidOwner::Untyped => SsidStatus::Down,
            SsidOwner::AccessPoint(ap) => match self.aps.get(&ap) {
                Some(ap) => ap_ssid_status(ssid.enable, radio_status, ap.status),
                None => SsidStatus::Down,
            },
            SsidOwner::Endpoint(ep) => match self.endpoints.get(&ep) {
                Some(ep) => {
                    ep_ssid_status(ssid.enable, radio_status, ep.status, ep.connection_status)
                }
                None => SsidStatus::Down,
            },
        };
        let ssid = self.ssids.get_mut(&id)?;
        let old = ssid.status;
        ssid.status = status;
        Some(old)
    }

    /// Administratively enables or disables an SSID.
    #[instrument(skip(self))]
    pub fn set_ssid_enable(&mut self, id: SsidId, enable: bool) -> WldResult<()> {
        let ssid = self
            .ssids
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("ssid", id))?;
        if ssid.enable == enable {
            return Ok(());
        }
        ssid.enable = enable;
        match ssid.owner {
            SsidOwner::AccessPoint(ap) => self.touch(ap.into(), FsmAction::ApEnable.into()),
            SsidOwner::Endpoint(ep) => self.reconfigure_endpoint(ep),
            SsidOwner::Untyped => Ok(()),
        }
    }

    /// Renames an SSID.
    #[instrument(skip(self))]
    pub fn set_ssid_name(&mut self, id: SsidId, name: &str) -> WldResult<()> {
        validate_ssid_name(name)?;
        let ssid = self
            .ssids
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("ssid", id))?;
        if ssid.name == name {
            return Ok(());
        }
        ssid.name = name.to_string();
        match ssid.owner {
            SsidOwner::AccessPoint(ap) => self.touch(ap.into(), FsmAction::ApSsid.into()),
            _ => Ok(()),
        }
    }
}
