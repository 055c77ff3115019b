//! Vendor capability interface.
//!
//! One method per driver capability. Every method has a default returning
//! `NotImplemented`, so a backend only overrides what its driver supports and
//! absent features are skipped by the commit engine instead of failing.

use crate::ap::{AccessPoint, VendorIe, WpsMethod};
use crate::endpoint::{EndPointProfile, Endpoint};
use crate::radio::Radio;
use crate::secdmn::GlobalDmnSupport;
use crate::ssid::Ssid;
use serde::Serialize;
use std::path::Path;
use wld_common::SwlStatus;
use wld_types::{ChannelBandwidth, FreqBand, MacAddress, StandardSet};

/// Capabilities reported by the driver for one radio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RadioCaps {
    pub supported_bands: Vec<FreqBand>,
    pub supported_standards: StandardSet,
    pub possible_channels: Vec<u8>,
    pub max_bandwidth: ChannelBandwidth,
    pub max_stations: usize,
    pub mlo_capable: bool,
    /// Factory base MAC; null when the driver has none.
    pub base_mac: MacAddress,
}

impl RadioCaps {
    /// Capabilities assumed for a band when the driver cannot report them.
    pub fn band_defaults(band: FreqBand) -> Self {
        Self {
            supported_bands: vec![band],
            supported_standards: band.default_standards(),
            possible_channels: band.default_channels(),
            max_bandwidth: band.default_bandwidth(),
            max_stations: 32,
            mlo_capable: false,
            base_mac: MacAddress::NULL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RadioStats {
    pub noise: i32,
    pub channel_load: u8,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StationStats {
    pub signal_strength: i32,
    pub tx_rate_kbps: u32,
    pub rx_rate_kbps: u32,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
}

/// Driver capability table.
#[allow(unused_variables)]
pub trait VendorOps {
    fn name(&self) -> &str;

    /// Whether the vendor can drive several radios from one daemon instance.
    fn global_dmn_support(&self, dmn: &str) -> GlobalDmnSupport {
        GlobalDmnSupport::Unsupported
    }

    /// Notification that the global-instance decision for `dmn` changed.
    fn on_global_dmn_changed(&self, dmn: &str, uses_global: bool) {}

    // Radio

    fn radio_discover_caps(&self, radio: &Radio) -> Result<RadioCaps, SwlStatus> {
        Err(SwlStatus::NotImplemented)
    }

    fn radio_enable(&self, radio: &Radio, enable: bool) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn radio_set_channel(
        &self,
        radio: &Radio,
        channel: u8,
        bandwidth: ChannelBandwidth,
    ) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn radio_set_tx_power(&self, radio: &Radio, percent: u8) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn radio_set_standards(&self, radio: &Radio, standards: StandardSet) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    /// Writes the AP-side security daemon configuration of the radio.
    fn radio_sync_secdmn(&self, radio: &Radio, conf_path: &Path) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn radio_stats(&self, radio: &Radio) -> Result<RadioStats, SwlStatus> {
        Err(SwlStatus::NotImplemented)
    }

    fn radio_add_csi_client(&self, radio: &Radio, client: MacAddress, interval_ms: u32) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn radio_del_csi_client(&self, radio: &Radio, client: MacAddress) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    // Access point

    fn ap_create_vap(&self, radio: &Radio, ap: &AccessPoint, ssid: &Ssid) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_destroy_vap(&self, radio: &Radio, ap: &AccessPoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_enable(&self, ap: &AccessPoint, enable: bool) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_sync_ssid(&self, ap: &AccessPoint, ssid: &Ssid) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_sync_security(&self, ap: &AccessPoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_sync_multi_ap(&self, ap: &AccessPoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_set_max_stations(&self, ap: &AccessPoint, max: usize) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    /// Adds the AP's section to the radio's security daemon configuration.
    fn ap_sync_secdmn(&self, radio: &Radio, ap: &AccessPoint, conf_path: &Path) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_wps_start(&self, ap: &AccessPoint, method: &WpsMethod) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_wps_cancel(&self, ap: &AccessPoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_kick_station(&self, ap: &AccessPoint, station: MacAddress, reason: u16) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_disassoc_station(&self, ap: &AccessPoint, station: MacAddress) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_steer_station(
        &self,
        ap: &AccessPoint,
        station: MacAddress,
        target_bssid: MacAddress,
    ) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_station_stats(
        &self,
        ap: &AccessPoint,
        station: MacAddress,
    ) -> Result<StationStats, SwlStatus> {
        Err(SwlStatus::NotImplemented)
    }

    fn ap_add_vendor_ie(&self, ap: &AccessPoint, ie: &VendorIe) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ap_del_vendor_ie(&self, ap: &AccessPoint, ie: &VendorIe) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    // Endpoint

    fn ep_create_intf(&self, radio: &Radio, ep: &Endpoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ep_destroy_intf(&self, radio: &Radio, ep: &Endpoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ep_enable(&self, ep: &Endpoint, enable: bool) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    /// Connects using `profile`, pinned to `bssid` when given.
    fn ep_connect(
        &self,
        ep: &Endpoint,
        profile: &EndPointProfile,
        bssid: Option<MacAddress>,
    ) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ep_disconnect(&self, ep: &Endpoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    /// Writes the STA-side security daemon configuration.
    fn ep_sync_secdmn(&self, ep: &Endpoint, profile: &EndPointProfile, conf_path: &Path) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ep_wps_start(&self, ep: &Endpoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    fn ep_wps_cancel(&self, ep: &Endpoint) -> SwlStatus {
        SwlStatus::NotImplemented
    }

    /// BSSID the driver currently reports for the endpoint (null if none).
    fn ep_current_bssid(&self, ep: &Endpoint) -> Result<MacAddress, SwlStatus> {
        Err(SwlStatus::NotImplemented)
    }

    fn ep_stats(&self, ep: &Endpoint) -> Result<StationStats, SwlStatus> {
        Err(SwlStatus::NotImplemented)
    }
}

/// Name of the backend used when a radio names no vendor.
pub const GENERIC_VENDOR: &str = "generic";

/// Backend with no driver behind it; every capability is absent.
#[derive(Debug, Clone)]
pub struct NoopVendor {
    name: String,
}

impl NoopVendor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for NoopVendor {
    fn default() -> Self {
        Self::new(GENERIC_VENDOR)
    }
}

impl VendorOps for NoopVendor {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_band_defaults() {
        let caps = RadioCaps::band_defaults(FreqBand::Band2_4GHz);
        assert_eq!(caps.supported_bands, vec![FreqBand::Band2_4GHz]);
        assert_eq!(caps.possible_channels.first(), Some(&1));
        assert!(caps.base_mac.is_null());
    }

    #[test]
    fn test_noop_vendor_reports_not_implemented() {
        let vendor = NoopVendor::default();
        assert_eq!(vendor.name(), GENERIC_VENDOR);
        assert_eq!(
            vendor.global_dmn_support("hostapd"),
            GlobalDmnSupport::Unsupported
        );
    }
}
