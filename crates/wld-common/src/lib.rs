//! Common control-plane primitives for the WiFi manager.
//!
//! - [`SwlStatus`]: result taxonomy shared by vendor calls and managers
//! - [`Scheduler`]: virtual-clock timer queue with explicit continuations
//! - [`EventQueue`]: named pub/sub channel with ref-counted subscribers
//!
//! # Scheduling model
//!
//! The core is single-threaded and cooperative. Nothing blocks waiting on
//! an external process; a multi-step interaction issues a request, arms a
//! timer carrying "what to do next" and resumes when the owner of the
//! [`Scheduler`] pops the due timer and dispatches its payload.

mod event_queue;
mod status;
mod timer;

pub use event_queue::{EventCallback, EventQueue};
pub use status::{StatusError, SwlStatus};
pub use timer::{Scheduler, TimerId};
