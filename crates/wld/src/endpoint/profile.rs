//! Endpoint credential profiles.

use crate::context::WldContext;
use crate::error::{WldError, WldResult};
use crate::handle::EpId;
use crate::security::SecurityConfig;
use crate::ssid::validate_ssid_name;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use wld_types::MacAddress;

fn default_enable() -> bool {
    true
}

/// One named credential set an endpoint can connect with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndPointProfile {
    pub alias: String,
    pub ssid: String,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Restricts connections to this BSSID.
    #[serde(default)]
    pub forced_bssid: Option<MacAddress>,
    /// Higher wins when no profile is referenced explicitly.
    #[serde(default)]
    pub priority: u8,
    #[serde(default = "default_enable")]
    pub enable: bool,
}

impl EndPointProfile {
    pub fn new(alias: &str, ssid: &str, security: SecurityConfig) -> Self {
        Self {
            alias: alias.to_string(),
            ssid: ssid.to_string(),
            security,
            forced_bssid: None,
            priority: 0,
            enable: true,
        }
    }
}

/// A profile is usable when its SSID is set and its keys match its mode.
pub fn validate_profile(profile: &EndPointProfile) -> WldResult<()> {
    if profile.alias.is_empty() {
        return Err(WldError::invalid_param("alias", "must not be empty"));
    }
    validate_ssid_name(&profile.ssid)?;
    profile.security.validate()?;
    if let Some(bssid) = profile.forced_bssid {
        if !bssid.is_valid_unicast() {
            return Err(WldError::invalid_param(
                "forced_bssid",
                format!("{} is not a BSSID", bssid),
            ));
        }
    }
    Ok(())
}

/// Picks the profile to connect with: the referenced one if any, else the
/// enabled profile with the highest priority (first added on ties).
pub(crate) fn select_profile<'a>(
    profiles: &'a [EndPointProfile],
    profile_ref: Option<&str>,
) -> Option<&'a EndPointProfile> {
    match profile_ref {
        Some(alias) => profiles.iter().find(|p| p.alias == alias && p.enable),
        None => profiles
            .iter()
            .filter(|p| p.enable)
            .fold(None, |best: Option<&EndPointProfile>, p| match best {
                Some(b) if b.priority >= p.priority => Some(b),
                _ => Some(p),
            }),
    }
}

impl WldContext {
    /// Adds a profile. Profiles are stored even when invalid; validity is
    /// checked when the endpoint selects one.
    #[instrument(skip(self, profile), fields(profile = %profile.alias))]
    pub fn add_endpoint_profile(&mut self, id: EpId, profile: EndPointProfile) -> WldResult<()> {
        if profile.alias.is_empty() {
            return Err(WldError::invalid_param("alias", "must not be empty"));
        }
        let ep = self.ep_mut(id)?;
        if ep.profiles.iter().any(|p| p.alias == profile.alias) {
            return Err(WldError::invalid_state(format!(
                "profile '{}' already exists",
                profile.alias
            )));
        }
        info!(ep = %ep.alias, profile = %profile.alias, "profile added");
        ep.profiles.push(profile);
        self.reconfigure_endpoint(id)
    }

    /// Replaces the profile with the same alias.
    #[instrument(skip(self, profile), fields(profile = %profile.alias))]
    pub fn update_endpoint_profile(&mut self, id: EpId, profile: EndPointProfile) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        let slot = ep
            .profiles
            .iter_mut()
            .find(|p| p.alias == profile.alias)
            .ok_or_else(|| WldError::not_found("profile", &profile.alias))?;
        if *slot == profile {
            return Ok(());
        }
        *slot = profile;
        if ep.current_profile.as_deref() == Some(slot.alias.as_str()) {
            // same alias, new credentials
            ep.current_profile = None;
        }
        self.reconfigure_endpoint(id)
    }

    /// Deletes a profile; deleting the active one forces reconfiguration.
    #[instrument(skip(self))]
    pub fn delete_endpoint_profile(&mut self, id: EpId, alias: &str) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        let before = ep.profiles.len();
        ep.profiles.retain(|p| p.alias != alias);
        if ep.profiles.len() == before {
            return Err(WldError::not_found("profile", alias));
        }
        info!(ep = %ep.alias, profile = alias, "profile deleted");
        if ep.current_profile.as_deref() == Some(alias) || ep.profile_ref.as_deref() == Some(alias) {
            return self.reconfigure_endpoint(id);
        }
        Ok(())
    }

    /// Pins the endpoint to a profile, or returns to priority selection.
    #[instrument(skip(self))]
    pub fn set_endpoint_profile_ref(&mut self, id: EpId, alias: Option<&str>) -> WldResult<()> {
        let ep = self.ep_mut(id)?;
        if ep.profile_ref.as_deref() == alias {
            return Ok(());
        }
        ep.profile_ref = alias.map(str::to_string);
        self.reconfigure_endpoint(id)
    }
}
