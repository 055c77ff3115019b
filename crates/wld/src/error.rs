//! Error types for control-plane operations.
//!
//! Every public operation returns [`WldResult`]. Errors never cross a
//! component boundary as panics; [`WldError::status`] maps them back onto
//! the [`SwlStatus`] taxonomy used by vendor calls.

use std::io;
use thiserror::Error;
use wld_common::SwlStatus;

/// Result type alias for control-plane operations.
pub type WldResult<T> = Result<T, WldError>;

/// Errors that can occur in the control plane.
#[derive(Debug, Error)]
pub enum WldError {
    /// A caller-supplied value failed validation.
    #[error("Invalid parameter {field}: {message}")]
    InvalidParam {
        /// The offending field.
        field: String,
        /// Error message.
        message: String,
    },

    /// Operation not valid in the current entity state.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message.
        message: String,
    },

    /// Referenced entity does not exist (or was destroyed).
    #[error("{kind} '{key}' not found")]
    NotFound {
        /// Entity kind (radio, accesspoint, ...).
        kind: &'static str,
        /// Handle or name.
        key: String,
    },

    /// Capability absent in the active vendor.
    #[error("Not implemented: {op}")]
    NotImplemented {
        /// The missing operation.
        op: String,
    },

    /// Transient unavailability.
    #[error("Not available: {what}")]
    NotAvailable {
        /// What is missing.
        what: String,
    },

    /// A vendor capability call failed.
    #[error("Vendor call {op} failed: {status}")]
    Vendor {
        /// The vendor operation.
        op: String,
        /// The returned status.
        status: SwlStatus,
    },

    /// Failed to control a security daemon process.
    #[error("Failed to control process '{command}': {source}")]
    Process {
        /// The command line.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl WldError {
    /// Creates an invalid parameter error.
    pub fn invalid_param(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParam {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(kind: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Creates a not available error.
    pub fn not_available(what: impl Into<String>) -> Self {
        Self::NotAvailable { what: what.into() }
    }

    /// Creates an error from a failed vendor status.
    pub fn vendor(op: impl Into<String>, status: SwlStatus) -> Self {
        match status {
            SwlStatus::NotImplemented => Self::NotImplemented { op: op.into() },
            status => Self::Vendor {
                op: op.into(),
                status,
            },
        }
    }

    /// Maps this error onto the status taxonomy.
    pub fn status(&self) -> SwlStatus {
        match self {
            WldError::InvalidParam { .. } | WldError::Config(_) => SwlStatus::InvalidParam,
            WldError::InvalidState { .. } | WldError::NotFound { .. } => SwlStatus::InvalidState,
            WldError::NotImplemented { .. } => SwlStatus::NotImplemented,
            WldError::NotAvailable { .. } => SwlStatus::NotAvailable,
            WldError::Vendor { status, .. } => *status,
            WldError::Process { .. } | WldError::Io(_) => SwlStatus::Error,
        }
    }

    /// Returns true if this error indicates a transient condition.
    pub fn is_retryable(&self) -> bool {
        self.status().is_retryable()
    }
}

/// Converts a vendor action status into a result.
pub(crate) fn check_vendor(op: &str, status: SwlStatus) -> WldResult<SwlStatus> {
    if status.is_ok() {
        Ok(status)
    } else {
        Err(WldError::vendor(op, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WldError::not_found("radio", "wifi0");
        assert_eq!(err.to_string(), "radio 'wifi0' not found");

        let err = WldError::invalid_param("channel", "14 not in possible channels");
        assert_eq!(
            err.to_string(),
            "Invalid parameter channel: 14 not in possible channels"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WldError::invalid_param("x", "y").status(),
            SwlStatus::InvalidParam
        );
        assert_eq!(
            WldError::vendor("radio_enable", SwlStatus::NotImplemented).status(),
            SwlStatus::NotImplemented
        );
        assert_eq!(
            WldError::vendor("radio_enable", SwlStatus::Error).status(),
            SwlStatus::Error
        );
        assert!(WldError::not_available("mld group").is_retryable());
        assert!(!WldError::invalid_state("busy").is_retryable());
    }

    #[test]
    fn test_check_vendor() {
        assert!(check_vendor("op", SwlStatus::OkContinue).is_ok());
        assert!(matches!(
            check_vendor("op", SwlStatus::NotImplemented),
            Err(WldError::NotImplemented { .. })
        ));
    }
}
