//! Typed, never-reused handles to entities owned by the context.
//!
//! Components other than the owner hold handles, not references. A handle to
//! a destroyed entity simply stops resolving, which is how subscribers and
//! timers tolerate their target disappearing.

use serde::Serialize;
use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn raw(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

handle!(
    /// Handle to a radio.
    RadioId,
    "radio#"
);
handle!(
    /// Handle to an SSID.
    SsidId,
    "ssid#"
);
handle!(
    /// Handle to an access point.
    ApId,
    "ap#"
);
handle!(
    /// Handle to an endpoint.
    EpId,
    "ep#"
);
handle!(
    /// Handle to a security daemon.
    DmnId,
    "dmn#"
);
handle!(
    /// Handle to a security daemon group.
    GrpId,
    "grp#"
);
handle!(
    /// Handle to an MLD link.
    LinkId,
    "link#"
);

/// Monotonic handle allocator shared by all entity kinds.
#[derive(Debug)]
pub(crate) struct HandleAlloc {
    next: u32,
}

impl HandleAlloc {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for HandleAlloc {
    fn default() -> Self {
        Self::new()
    }
}
