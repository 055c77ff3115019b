//! WiFi control plane
//!
//! Drives radios, access points and endpoints (stations) toward their
//! configured state through per-entity commit FSMs, and manages the
//! hostapd/wpa_supplicant processes that serve them.
//!
//! # Architecture
//!
//! ```text
//! [config / API] ──> [WldContext] ──> [Fsm per entity] ──> [VendorOps]
//!                        │    │
//!                        │    └──> [DmnRegistry] ──> hostapd / wpa_supplicant
//!                        ↓
//!                   [EventBus] ──> TinyRoam, MLD, subscribers
//! ```
//!
//! # Key Components
//!
//! - [`WldContext`]: entity arenas, timers and the commit entry points
//! - [`fsm`]: the commit engine shared by radios, access points and endpoints
//! - [`mld`]: multi-link device grouping of SSIDs
//! - [`tinyroam`]: bounded-retry roaming of an endpoint to a target BSSID
//! - [`secdmn`]: security daemon processes and shared-instance groups
//! - [`daemon::WldDaemon`]: wall-clock event loop for the binary
//!
//! All state lives on one thread; asynchronous work continues through timers
//! carrying a [`TimerAction`].

pub mod ap;
pub mod config;
pub mod context;
pub mod daemon;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod fsm;
pub mod handle;
pub mod mld;
pub mod radio;
pub mod secdmn;
pub mod security;
pub mod ssid;
pub mod tinyroam;
pub mod topology;
pub mod vendor;

pub use config::WldConfig;
pub use context::{TimerAction, WldContext};
pub use error::{WldError, WldResult};
pub use handle::{ApId, DmnId, EpId, GrpId, LinkId, RadioId, SsidId};
pub use tinyroam::RoamResult;
pub use vendor::VendorOps;
