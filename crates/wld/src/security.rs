//! Security configuration shared by access points and endpoint profiles.

use crate::error::{WldError, WldResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Security mode of a BSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecurityMode {
    #[default]
    #[serde(rename = "None")]
    None,
    #[serde(rename = "WEP-64")]
    Wep64,
    #[serde(rename = "WEP-128")]
    Wep128,
    #[serde(rename = "WPA2-Personal")]
    Wpa2Personal,
    #[serde(rename = "WPA3-Personal")]
    Wpa3Personal,
    #[serde(rename = "WPA2-WPA3-Personal")]
    Wpa2Wpa3Personal,
    #[serde(rename = "WPA2-Enterprise")]
    Wpa2Enterprise,
    #[serde(rename = "WPA3-Enterprise")]
    Wpa3Enterprise,
}

impl SecurityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::None => "None",
            SecurityMode::Wep64 => "WEP-64",
            SecurityMode::Wep128 => "WEP-128",
            SecurityMode::Wpa2Personal => "WPA2-Personal",
            SecurityMode::Wpa3Personal => "WPA3-Personal",
            SecurityMode::Wpa2Wpa3Personal => "WPA2-WPA3-Personal",
            SecurityMode::Wpa2Enterprise => "WPA2-Enterprise",
            SecurityMode::Wpa3Enterprise => "WPA3-Enterprise",
        }
    }

    pub fn uses_psk(&self) -> bool {
        matches!(self, SecurityMode::Wpa2Personal | SecurityMode::Wpa2Wpa3Personal)
    }

    pub fn uses_sae(&self) -> bool {
        matches!(self, SecurityMode::Wpa3Personal | SecurityMode::Wpa2Wpa3Personal)
    }

    pub fn is_enterprise(&self) -> bool {
        matches!(self, SecurityMode::Wpa2Enterprise | SecurityMode::Wpa3Enterprise)
    }

    /// Modes allowed on an MLD link (open, or SAE/WPA3 based).
    pub fn is_mlo_compatible(&self) -> bool {
        matches!(
            self,
            SecurityMode::None
                | SecurityMode::Wpa3Personal
                | SecurityMode::Wpa2Wpa3Personal
                | SecurityMode::Wpa3Enterprise
        )
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and mode of one BSS.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub mode: SecurityMode,

    /// WPA2 pre-shared passphrase (8..=63 printable chars) or 64 hex digits.
    #[serde(default, skip_serializing)]
    pub key_passphrase: String,

    /// SAE password; falls back to `key_passphrase` when empty.
    #[serde(default, skip_serializing)]
    pub sae_passphrase: String,

    #[serde(default, skip_serializing)]
    pub wep_key: String,

    #[serde(default)]
    pub radius_server: Option<String>,

    #[serde(default, skip_serializing)]
    pub radius_secret: String,
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_printable_ascii(s: &str) -> bool {
    s.chars().all(|c| (' '..='~').contains(&c))
}

impl SecurityConfig {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn wpa2_personal(passphrase: impl Into<String>) -> Self {
        Self {
            mode: SecurityMode::Wpa2Personal,
            key_passphrase: passphrase.into(),
            ..Self::default()
        }
    }

    pub fn wpa3_personal(passphrase: impl Into<String>) -> Self {
        Self {
            mode: SecurityMode::Wpa3Personal,
            sae_passphrase: passphrase.into(),
            ..Self::default()
        }
    }

    /// Password actually used for SAE.
    pub fn effective_sae_passphrase(&self) -> &str {
        if self.sae_passphrase.is_empty() {
            &self.key_passphrase
        } else {
            &self.sae_passphrase
        }
    }

    /// Checks that keys are consistent with the declared mode.
    pub fn validate(&self) -> WldResult<()> {
        match self.mode {
            SecurityMode::None => Ok(()),
            SecurityMode::Wep64 => validate_wep(&self.wep_key, 5),
            SecurityMode::Wep128 => validate_wep(&self.wep_key, 13),
            SecurityMode::Wpa2Personal => validate_psk(&self.key_passphrase),
            SecurityMode::Wpa3Personal => validate_sae(self.effective_sae_passphrase()),
            SecurityMode::Wpa2Wpa3Personal => {
                validate_psk(&self.key_passphrase)?;
                validate_sae(self.effective_sae_passphrase())
            }
            SecurityMode::Wpa2Enterprise | SecurityMode::Wpa3Enterprise => {
                match self.radius_server.as_deref() {
                    Some(server) if !server.trim().is_empty() => {}
                    _ => {
                        return Err(WldError::invalid_param(
                            "radius_server",
                            format!("required for {}", self.mode),
                        ))
                    }
                }
                if self.radius_secret.is_empty() {
                    return Err(WldError::invalid_param(
                        "radius_secret",
                        format!("required for {}", self.mode),
                    ));
                }
                Ok(())
            }
        }
    }

    /// True when two configurations let a client reuse one association
    /// context (same mode and credentials).
    pub fn same_credentials(&self, other: &SecurityConfig) -> bool {
        if self.mode != other.mode {
            return false;
        }
        match self.mode {
            SecurityMode::None => true,
            SecurityMode::Wep64 | SecurityMode::Wep128 => self.wep_key == other.wep_key,
            SecurityMode::Wpa2Personal => self.key_passphrase == other.key_passphrase,
            SecurityMode::Wpa3Personal => {
                self.effective_sae_passphrase() == other.effective_sae_passphrase()
            }
            SecurityMode::Wpa2Wpa3Personal => {
                self.key_passphrase == other.key_passphrase
                    && self.effective_sae_passphrase() == other.effective_sae_passphrase()
            }
            SecurityMode::Wpa2Enterprise | SecurityMode::Wpa3Enterprise => {
                self.radius_server == other.radius_server
                    && self.radius_secret == other.radius_secret
            }
        }
    }
}

fn validate_wep(key: &str, ascii_len: usize) -> WldResult<()> {
    let ok = (key.len() == ascii_len && is_printable_ascii(key))
        || (key.len() == ascii_len * 2 && is_hex(key));
    if ok {
        Ok(())
    } else {
        Err(WldError::invalid_param(
            "wep_key",
            format!(
                "expected {} ASCII characters or {} hex digits",
                ascii_len,
                ascii_len * 2
            ),
        ))
    }
}

fn validate_psk(key: &str) -> WldResult<()> {
    let ok = ((8..=63).contains(&key.len()) && is_printable_ascii(key))
        || (key.len() == 64 && is_hex(key));
    if ok {
        Ok(())
    } else {
        Err(WldError::invalid_param(
            "key_passphrase",
            "expected 8..63 printable characters or 64 hex digits",
        ))
    }
}

fn validate_sae(pass: &str) -> WldResult<()> {
    if pass.is_empty() || pass.len() > 128 || !is_printable_ascii(pass) {
        return Err(WldError::invalid_param(
            "sae_passphrase",
            "expected 1..128 printable characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_is_valid() {
        assert!(SecurityConfig::open().validate().is_ok());
    }

    #[test]
    fn test_psk_length_rules() {
        assert!(SecurityConfig::wpa2_personal("password").validate().is_ok());
        assert!(SecurityConfig::wpa2_personal("short").validate().is_err());
        assert!(SecurityConfig::wpa2_personal("a".repeat(64)).validate().is_ok());
        assert!(SecurityConfig::wpa2_personal("z".repeat(64)).validate().is_err());
    }

    #[test]
    fn test_wep_key_formats() {
        let mut cfg = SecurityConfig {
            mode: SecurityMode::Wep64,
            wep_key: "abcde".into(),
            ..SecurityConfig::default()
        };
        assert!(cfg.validate().is_ok());
        cfg.wep_key = "0123456789".into();
        assert!(cfg.validate().is_ok());
        cfg.mode = SecurityMode::Wep128;
        assert!(cfg.validate().is_err());
        cfg.wep_key = "0123456789abcdef0123456789".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_mixed_mode_needs_both() {
        let mut cfg = SecurityConfig {
            mode: SecurityMode::Wpa2Wpa3Personal,
            key_passphrase: "password1".into(),
            ..SecurityConfig::default()
        };
        // SAE falls back to the PSK passphrase
        assert!(cfg.validate().is_ok());
        cfg.key_passphrase = "short".into();
        cfg.sae_passphrase = "long-enough".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_enterprise_requires_radius() {
        let mut cfg = SecurityConfig {
            mode: SecurityMode::Wpa2Enterprise,
            ..SecurityConfig::default()
        };
        assert!(cfg.validate().is_err());
        cfg.radius_server = Some("10.0.0.1".into());
        assert!(cfg.validate().is_err());
        cfg.radius_secret = "s3cret".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_same_credentials() {
        let a = SecurityConfig::wpa3_personal("secret-1");
        let b = SecurityConfig::wpa3_personal("secret-1");
        let c = SecurityConfig::wpa3_personal("secret-2");
        assert!(a.same_credentials(&b));
        assert!(!a.same_credentials(&c));
        assert!(!a.same_credentials(&SecurityConfig::open()));
        assert!(SecurityMode::Wpa3Personal.is_mlo_compatible());
        assert!(!SecurityMode::Wpa2Personal.is_mlo_compatible());
    }
}
