//! Physical radios.
//!
//! A radio owns its SSIDs, access points and endpoints (by handle) and the
//! per-radio hostapd daemon identity. Configuration edits go through
//! [`WldContext`](crate::WldContext) and are applied by the radio FSM.

mod exec;
mod ops;

use crate::fsm::Fsm;
use crate::handle::{ApId, DmnId, EpId, RadioId};
use serde::Serialize;
use std::collections::VecDeque;
use wld_types::{
    ChannelBandwidth, FreqBand, MacAddress, OperatingStandards, RadioDetailedState, RadioStatus,
    StandardSet,
};

/// Why the operating channel changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelChangeReason {
    Initial,
    Manual,
    Auto,
    Dfs,
    Reconfigure,
}

/// One entry of the channel history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelChange {
    pub channel: u8,
    pub bandwidth: ChannelBandwidth,
    pub reason: ChannelChangeReason,
    pub at_ms: u64,
}

/// A station monitored through channel state information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsiClient {
    pub mac: MacAddress,
    pub interval_ms: u32,
}

#[derive(Debug, Serialize)]
pub struct Radio {
    pub id: RadioId,
    pub name: String,
    pub vendor: String,
    /// Creation order, used to derive a default MAC.
    pub index: u32,

    pub operating_band: FreqBand,
    pub supported_bands: Vec<FreqBand>,
    pub supported_standards: StandardSet,
    pub operating_standards: OperatingStandards,
    pub possible_channels: Vec<u8>,

    pub channel: u8,
    pub bandwidth: ChannelBandwidth,
    pub target_channel: u8,
    pub target_bandwidth: ChannelBandwidth,
    pub target_reason: ChannelChangeReason,
    pub max_bandwidth: ChannelBandwidth,
    pub channel_history: VecDeque<ChannelChange>,

    pub tx_power: u8,
    pub enable: bool,
    pub status: RadioStatus,
    pub detailed_state: RadioDetailedState,
    pub mac: MacAddress,
    pub mlo_capable: bool,
    pub max_stations: usize,
    pub is_ready: bool,

    pub aps: Vec<ApId>,
    pub endpoints: Vec<EpId>,
    pub(crate) hostapd: Option<DmnId>,
    pub csi_clients: Vec<CsiClient>,
    /// Next BSSID offset handed to a new interface.
    pub(crate) next_intf_slot: u32,

    pub fsm: Fsm,
}

impl Radio {
    pub(crate) fn new(id: RadioId, name: &str, vendor: &str, index: u32, band: FreqBand) -> Self {
        let bandwidth = band.default_bandwidth();
        Self {
            id,
            name: name.to_string(),
            vendor: vendor.to_string(),
            index,
            operating_band: band,
            supported_bands: vec![band],
            supported_standards: band.default_standards(),
            operating_standards: OperatingStandards::Auto,
            possible_channels: band.default_channels(),
            channel: 0,
            bandwidth,
            target_channel: 0,
            target_bandwidth: bandwidth,
            target_reason: ChannelChangeReason::Initial,
            max_bandwidth: bandwidth,
            channel_history: VecDeque::new(),
            tx_power: 100,
            enable: true,
            status: RadioStatus::Unknown,
            detailed_state: RadioDetailedState::Unknown,
            mac: MacAddress::NULL,
            mlo_capable: false,
            max_stations: 32,
            is_ready: false,
            aps: Vec::new(),
            endpoints: Vec::new(),
            hostapd: None,
            csi_clients: Vec::new(),
            next_intf_slot: 0,
            fsm: Fsm::new(),
        }
    }

    /// Standards in effect after resolving `Auto`.
    pub fn effective_standards(&self) -> StandardSet {
        self.operating_standards.effective(self.supported_standards)
    }

    pub fn hostapd(&self) -> Option<DmnId> {
        self.hostapd
    }

    /// Records a channel change, evicting the oldest entries beyond `max`.
    pub(crate) fn push_channel_change(&mut self, change: ChannelChange, max: usize) {
        self.channel_history.push_back(change);
        while self.channel_history.len() > max {
            self.channel_history.pop_front();
        }
    }

    pub(crate) fn has_pending_channel(&self) -> bool {
        self.target_channel != self.channel || self.target_bandwidth != self.bandwidth
    }
}

/// MAC derived for a radio whose vendor did not report one.
pub(crate) fn default_radio_mac(index: u32) -> MacAddress {
    MacAddress::new([0x02, 0x77, 0x6c, 0x00, 0x00, 0x00]).with_offset((index + 1) << 8)
}
