//! Bootstrap topology from the configuration file.
//!
//! ```toml
//! [[radios]]
//! name = "wifi0"
//! band = "5GHz"
//! channel = 36
//!
//! [[access_points]]
//! alias = "vap5g0"
//! radio = "wifi0"
//! ssid = "home"
//! security = { mode = "WPA2-Personal", key_passphrase = "password123" }
//!
//! [[endpoints]]
//! alias = "sta0"
//! radio = "wifi0"
//!
//! [[endpoints.profiles]]
//! alias = "uplink"
//! ssid = "upstream"
//! ```

use crate::ap::MultiApType;
use crate::context::WldContext;
use crate::endpoint::EndPointProfile;
use crate::error::{WldError, WldResult};
use crate::radio::ChannelChangeReason;
use crate::security::SecurityConfig;
use crate::vendor::{NoopVendor, GENERIC_VENDOR};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{info, warn};
use wld_types::{ChannelBandwidth, FreqBand, OperatingStandards};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioEntry {
    pub name: String,
    /// Vendor backend; the generic one when absent.
    #[serde(default)]
    pub vendor: Option<String>,
    pub band: FreqBand,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub channel: Option<u8>,
    #[serde(default)]
    pub bandwidth: Option<ChannelBandwidth>,
    #[serde(default)]
    pub tx_power: Option<u8>,
    #[serde(default)]
    pub standards: Option<OperatingStandards>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPointEntry {
    pub alias: String,
    pub radio: String,
    pub ssid: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub max_stations: Option<usize>,
    #[serde(default)]
    pub multi_ap: MultiApType,
    #[serde(default)]
    pub mld_unit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub alias: String,
    pub radio: String,
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default)]
    pub profiles: Vec<EndPointProfile>,
    #[serde(default)]
    pub profile_ref: Option<String>,
    #[serde(default)]
    pub mld_unit: Option<u32>,
}

/// Creates the configured entities. Radios naming an unregistered vendor
/// fall back to the generic backend.
pub struct Topology;

impl Topology {
    pub fn apply(ctx: &mut WldContext) -> WldResult<()> {
        let config = ctx.config().clone();

        for entry in &config.radios {
            let vendor = entry
                .vendor
                .clone()
                .unwrap_or_else(|| GENERIC_VENDOR.to_string());
            if ctx.vendor_exec_info(&vendor).is_none() {
                warn!(radio = %entry.name, %vendor, "vendor not registered, using generic backend");
                ctx.register_vendor(Rc::new(NoopVendor::new(vendor.clone())))?;
            }
            let id = ctx.add_radio(&entry.name, &vendor, entry.band)?;
            if let Some(channel) = entry.channel {
                let bandwidth = entry
                    .bandwidth
                    .or_else(|| ctx.radio(id).map(|r| r.bandwidth))
                    .unwrap_or_else(|| entry.band.default_bandwidth());
                ctx.set_radio_channel(id, channel, bandwidth, ChannelChangeReason::Initial)?;
            }
            if let Some(tx_power) = entry.tx_power {
                ctx.set_radio_tx_power(id, tx_power)?;
            }
            if let Some(standards) = entry.standards {
                ctx.set_radio_operating_standards(id, standards)?;
            }
            ctx.set_radio_enable(id, entry.enable)?;
        }

        for entry in &config.access_points {
            let radio = find_radio(ctx, &entry.radio)?;
            let id = ctx.add_ap(radio, &entry.alias, &entry.ssid)?;
            ctx.set_ap_security(id, entry.security.clone())?;
            ctx.set_ap_multi_ap(id, entry.multi_ap)?;
            if let Some(max) = entry.max_stations {
                ctx.set_ap_max_stations(id, max)?;
            }
            ctx.set_ap_enable(id, entry.enable)?;
            if let Some(unit) = entry.mld_unit {
                let ssid = ctx.access_point(id).map(|ap| ap.ssid);
                if let Some(ssid) = ssid {
                    ctx.set_ssid_mld_unit(ssid, Some(unit))?;
                }
            }
        }

        for entry in &config.endpoints {
            let radio = find_radio(ctx, &entry.radio)?;
            let id = ctx.add_endpoint(radio, &entry.alias)?;
            for profile in &entry.profiles {
                ctx.add_endpoint_profile(id, profile.clone())?;
            }
            if entry.profile_ref.is_some() {
                ctx.set_endpoint_profile_ref(id, entry.profile_ref.as_deref())?;
            }
            ctx.set_endpoint_enable(id, entry.enable)?;
            if let Some(unit) = entry.mld_unit {
                let ssid = ctx.endpoint(id).map(|ep| ep.ssid);
                if let Some(ssid) = ssid {
                    ctx.set_ssid_mld_unit(ssid, Some(unit))?;
                }
            }
        }

        info!(
            radios = config.radios.len(),
            access_points = config.access_points.len(),
            endpoints = config.endpoints.len(),
            "topology applied"
        );
        ctx.datamodel_loaded();
        Ok(())
    }
}

fn find_radio(ctx: &WldContext, name: &str) -> WldResult<crate::handle::RadioId> {
    ctx.find_radio(name)
        .ok_or_else(|| WldError::not_found("radio", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WldConfig;
    use crate::secdmn::ProcessSpawner;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    struct NoSpawn;

    impl ProcessSpawner for NoSpawn {
        fn start(&self, _cmd: &str, _args: &[String]) -> WldResult<u32> {
            Ok(1)
        }

        fn stop(&self, _pid: u32) -> WldResult<()> {
            Ok(())
        }

        fn reload(&self, _pid: u32) -> WldResult<()> {
            Ok(())
        }

        fn is_running(&self, _pid: u32) -> bool {
            false
        }

        fn prepare_ctrl_dir(&self, _dir: &Path) -> WldResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_apply_topology() {
        let config = WldConfig::from_toml(
            r#"
[[radios]]
name = "wifi0"
band = "5GHz"
channel = 44

[[access_points]]
alias = "vap5g0"
radio = "wifi0"
ssid = "home"

[[endpoints]]
alias = "sta0"
radio = "wifi0"

[[endpoints.profiles]]
alias = "uplink"
ssid = "upstream"
"#,
        )
        .unwrap();
        let mut ctx = WldContext::new(config, Rc::new(NoSpawn));
        ctx.init();
        Topology::apply(&mut ctx).unwrap();

        let radio = ctx.find_radio("wifi0").unwrap();
        assert_eq!(ctx.radio(radio).unwrap().target_channel, 44);
        let ap = ctx.find_access_point("vap5g0").unwrap();
        assert!(ctx.access_point(ap).unwrap().enable);
        let ep = ctx.find_endpoint("sta0").unwrap();
        assert_eq!(
            ctx.endpoint(ep).unwrap().current_profile.as_deref(),
            Some("uplink")
        );
        assert_eq!(ctx.vendor_names().collect::<Vec<_>>(), vec![GENERIC_VENDOR]);
    }
}
