//! Result taxonomy for vendor and manager operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of one vendor or manager operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwlStatus {
    /// Success.
    Ok,
    /// Success, and the multi-step operation is now fully complete.
    OkDone,
    /// Success so far; completion is asynchronous and reported later.
    OkContinue,
    /// Caller-supplied argument failed validation. Never retried automatically.
    InvalidParam,
    /// Operation not valid in the current entity state.
    InvalidState,
    /// Capability absent in the active vendor/driver. Treated as "feature off".
    NotImplemented,
    /// Transient unavailability.
    NotAvailable,
    /// Generic failure. Subject to the FSM retry policy.
    Error,
}

impl SwlStatus {
    /// Returns true for `Ok`, `OkDone` and `OkContinue`.
    pub fn is_ok(&self) -> bool {
        matches!(self, SwlStatus::Ok | SwlStatus::OkDone | SwlStatus::OkContinue)
    }

    /// Returns true if the operation finished synchronously.
    pub fn is_done(&self) -> bool {
        matches!(self, SwlStatus::Ok | SwlStatus::OkDone)
    }

    /// Returns true if completion will be reported later.
    pub fn is_pending(&self) -> bool {
        matches!(self, SwlStatus::OkContinue)
    }

    /// Returns true if retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwlStatus::Error | SwlStatus::NotAvailable)
    }

    /// Returns true if the outcome counts against an entity's retry budget.
    pub fn is_failure(&self) -> bool {
        matches!(self, SwlStatus::Error)
    }

    /// Converts into a `Result`, mapping every non-ok code to [`StatusError`].
    pub fn into_result(self) -> Result<SwlStatus, StatusError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(StatusError(self))
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            SwlStatus::Ok => "ok",
            SwlStatus::OkDone => "ok_done",
            SwlStatus::OkContinue => "ok_continue",
            SwlStatus::InvalidParam => "invalid_param",
            SwlStatus::InvalidState => "invalid_state",
            SwlStatus::NotImplemented => "not_implemented",
            SwlStatus::NotAvailable => "not_available",
            SwlStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SwlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-ok [`SwlStatus`] carried as an error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation failed: {0}")]
pub struct StatusError(pub SwlStatus);

impl From<StatusError> for SwlStatus {
    fn from(e: StatusError) -> Self {
        e.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(SwlStatus::Ok.is_ok());
        assert!(SwlStatus::OkContinue.is_ok());
        assert!(!SwlStatus::OkContinue.is_done());
        assert!(SwlStatus::OkContinue.is_pending());

        assert!(SwlStatus::Error.is_retryable());
        assert!(SwlStatus::NotAvailable.is_retryable());
        assert!(!SwlStatus::InvalidParam.is_retryable());

        assert!(SwlStatus::Error.is_failure());
        assert!(!SwlStatus::NotImplemented.is_failure());
    }

    #[test]
    fn test_into_result() {
        assert_eq!(SwlStatus::OkDone.into_result(), Ok(SwlStatus::OkDone));
        let err = SwlStatus::InvalidState.into_result().unwrap_err();
        assert_eq!(SwlStatus::from(err), SwlStatus::InvalidState);
        assert_eq!(err.to_string(), "operation failed: invalid_state");
    }
}
