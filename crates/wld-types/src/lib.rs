//! Common types for the WiFi control plane.
//!
//! This crate provides type-safe representations of the primitives shared
//! by the radio, access point and endpoint managers:
//!
//! - [`MacAddress`]: 48-bit MAC addresses (BSSIDs, station addresses)
//! - [`FreqBand`]: operating frequency bands
//! - [`Standard`] / [`StandardSet`]: 802.11 PHY standards
//! - [`ChannelBandwidth`]: channel widths
//! - Status enums for radios, SSIDs, access points and endpoints

mod band;
mod mac;
mod status;

pub use band::{ChannelBandwidth, FreqBand, OperatingStandards, Standard, StandardSet};
pub use mac::MacAddress;
pub use status::{
    ApStatus, ConnectionStatus, EndpointError, EndpointStatus, RadioDetailedState, RadioStatus,
    SsidStatus,
};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid frequency band: {0}")]
    InvalidBand(String),

    #[error("invalid 802.11 standard: {0}")]
    InvalidStandard(String),

    #[error("invalid channel bandwidth: {0}")]
    InvalidBandwidth(String),

    #[error("invalid status value: {0}")]
    InvalidStatus(String),
}
