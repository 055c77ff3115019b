//! Status enumerations surfaced by radios, SSIDs, access points and endpoints.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! status_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant,)+
        }

        impl $name {
            /// Returns the status name as published upward.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseError::InvalidStatus(s.to_string())),
                }
            }
        }
    };
}

status_enum! {
    /// Abstract status of a radio.
    RadioStatus {
        /// No FSM pass has completed yet.
        Unknown => "Unknown",
        Up => "Up",
        Down => "Down",
        Dormant => "Dormant",
        NotPresent => "NotPresent",
        Error => "Error",
    }
}

status_enum! {
    /// Detailed driver-level state of a radio.
    RadioDetailedState {
        Unknown => "Unknown",
        Configuring => "Configuring",
        Idle => "Idle",
        Up => "Up",
        DfsCac => "DfsCac",
        Down => "Down",
        Error => "Error",
    }
}

status_enum! {
    /// Status of one access point (VAP).
    ApStatus {
        Disabled => "Disabled",
        Enabled => "Enabled",
        Error => "Error",
        ErrorMisconfigured => "Error_Misconfigured",
    }
}

status_enum! {
    /// Abstract status of an SSID, derived from its AP or endpoint.
    SsidStatus {
        Up => "Up",
        Down => "Down",
        Dormant => "Dormant",
        LowerLayerDown => "LowerLayerDown",
        Error => "Error",
    }
}

status_enum! {
    /// Administrative status of an endpoint.
    EndpointStatus {
        Disabled => "Disabled",
        Enabled => "Enabled",
        Error => "Error",
    }
}

status_enum! {
    /// Connection state machine of an endpoint.
    ConnectionStatus {
        Disabled => "Disabled",
        Idle => "Idle",
        Discovering => "Discovering",
        Connecting => "Connecting",
        WpsPairing => "WPS_Pairing",
        WpsPairingDone => "WPS_PairingDone",
        WpsTimeout => "WPS_Timeout",
        Connected => "Connected",
        Disconnected => "Disconnected",
        Error => "Error",
        ErrorMisconfigured => "Error_Misconfigured",
    }
}

status_enum! {
    /// Last error reported for an endpoint.
    EndpointError {
        None => "None",
        SsidNotFound => "SSID_Not_Found",
        InvalidPassphrase => "Invalid_Passphrase",
        SecurityMethodUnsupported => "SecurityMethod_Unsupported",
        WpsTimeout => "WPS_Timeout",
        WpsCanceled => "WPS_Canceled",
        Misconfigured => "Error_Misconfigured",
        AssociationTimeout => "Association_Timeout",
    }
}

impl ConnectionStatus {
    /// Returns true while the endpoint is trying to reach `Connected`.
    pub const fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Discovering
                | ConnectionStatus::Connecting
                | ConnectionStatus::WpsPairing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_strings() {
        assert_eq!(RadioStatus::Unknown.to_string(), "Unknown");
        assert_eq!(ApStatus::ErrorMisconfigured.as_str(), "Error_Misconfigured");
        assert_eq!(
            "WPS_Pairing".parse::<ConnectionStatus>().unwrap(),
            ConnectionStatus::WpsPairing
        );
        assert!("Bogus".parse::<SsidStatus>().is_err());
    }

    #[test]
    fn test_in_progress() {
        assert!(ConnectionStatus::Connecting.is_in_progress());
        assert!(!ConnectionStatus::Connected.is_in_progress());
        assert!(!ConnectionStatus::Idle.is_in_progress());
    }
}
