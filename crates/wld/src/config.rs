//! Configuration file support for wld
//!
//! Loads and validates daemon configuration from TOML files.
//! Default location: /etc/wld/wld.conf

use crate::error::{WldError, WldResult};
use crate::fsm::FsmConfig;
use crate::secdmn::GlobalInstanceSetting;
use crate::topology::{AccessPointEntry, EndpointEntry, RadioEntry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/wld/wld.conf";

/// FSM commit engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsmSection {
    /// Failed passes tolerated before the entity escalates to error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before retrying a failed pass
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Re-poll interval while a vendor call would block
    #[serde(default = "default_delay")]
    pub delay_ms: u64,

    /// Upper bound on waiting for a would-block vendor call
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Age after which a pending commit is considered stuck
    #[serde(default = "default_commit_pending_timeout")]
    pub commit_pending_timeout_ms: u64,
}

/// Radio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioSection {
    /// Entries kept in the channel change history
    #[serde(default = "default_channel_history_max")]
    pub channel_history_max: usize,
}

/// Endpoint reconnect and WPS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSection {
    /// First reconnect attempt after losing the link
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Interval between subsequent reconnect attempts
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,

    /// Give up after this many attempts (0 = never)
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    /// WPS walk time
    #[serde(default = "default_wps_walk_time")]
    pub wps_walk_time_secs: u64,
}

/// Security daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecDmnSection {
    /// AP-side daemon executable
    #[serde(default = "default_hostapd_cmd")]
    pub hostapd_cmd: String,

    /// STA-side daemon executable
    #[serde(default = "default_wpa_supplicant_cmd")]
    pub wpa_supplicant_cmd: String,

    /// Control interface base directory
    #[serde(default = "default_ctrl_iface_dir")]
    pub ctrl_iface_dir: PathBuf,

    /// Directory where daemon configuration files are written
    #[serde(default = "default_conf_dir")]
    pub conf_dir: PathBuf,

    /// Share one hostapd instance across radios
    #[serde(default)]
    pub use_global_instance: GlobalInstanceSetting,

    /// Delay used to coalesce restart requests
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,

    /// Interval of the liveness check on enabled daemons (0 = disabled)
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
}

/// Auto-commit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCommitSection {
    /// Commit edits automatically after `delay_ms`
    #[serde(default = "default_autocommit_enabled")]
    pub enabled: bool,

    /// Coalescing delay
    #[serde(default = "default_autocommit_delay")]
    pub delay_ms: u64,
}

/// Complete wld configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WldConfig {
    #[serde(default)]
    pub fsm: FsmSection,

    #[serde(default)]
    pub radio: RadioSection,

    #[serde(default)]
    pub endpoint: EndpointSection,

    #[serde(default)]
    pub secdmn: SecDmnSection,

    #[serde(default)]
    pub autocommit: AutoCommitSection,

    /// Radios created at startup
    #[serde(default)]
    pub radios: Vec<RadioEntry>,

    /// Access points created at startup
    #[serde(default)]
    pub access_points: Vec<AccessPointEntry>,

    /// Endpoints created at startup
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
}

// Default functions
fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_delay() -> u64 {
    100
}

fn default_timeout() -> u64 {
    5000
}

fn default_commit_pending_timeout() -> u64 {
    30000
}

fn default_channel_history_max() -> usize {
    10
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_reconnect_interval() -> u64 {
    30
}

fn default_wps_walk_time() -> u64 {
    120
}

fn default_hostapd_cmd() -> String {
    "/usr/sbin/hostapd".to_string()
}

fn default_wpa_supplicant_cmd() -> String {
    "/usr/sbin/wpa_supplicant".to_string()
}

fn default_ctrl_iface_dir() -> PathBuf {
    PathBuf::from("/var/run")
}

fn default_conf_dir() -> PathBuf {
    PathBuf::from("/tmp/wld")
}

fn default_restart_delay() -> u64 {
    500
}

fn default_watch_interval() -> u64 {
    10
}

fn default_autocommit_enabled() -> bool {
    true
}

fn default_autocommit_delay() -> u64 {
    500
}

impl Default for FsmSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            delay_ms: default_delay(),
            timeout_ms: default_timeout(),
            commit_pending_timeout_ms: default_commit_pending_timeout(),
        }
    }
}

impl Default for RadioSection {
    fn default() -> Self {
        Self {
            channel_history_max: default_channel_history_max(),
        }
    }
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: default_reconnect_delay(),
            reconnect_interval_secs: default_reconnect_interval(),
            max_reconnect_attempts: 0,
            wps_walk_time_secs: default_wps_walk_time(),
        }
    }
}

impl Default for SecDmnSection {
    fn default() -> Self {
        Self {
            hostapd_cmd: default_hostapd_cmd(),
            wpa_supplicant_cmd: default_wpa_supplicant_cmd(),
            ctrl_iface_dir: default_ctrl_iface_dir(),
            conf_dir: default_conf_dir(),
            use_global_instance: GlobalInstanceSetting::default(),
            restart_delay_ms: default_restart_delay(),
            watch_interval_secs: default_watch_interval(),
        }
    }
}

impl Default for AutoCommitSection {
    fn default() -> Self {
        Self {
            enabled: default_autocommit_enabled(),
            delay_ms: default_autocommit_delay(),
        }
    }
}

impl FsmSection {
    /// Converts the section into engine timing parameters.
    pub fn to_fsm_config(&self) -> FsmConfig {
        FsmConfig {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            delay: Duration::from_millis(self.delay_ms),
            timeout: Duration::from_millis(self.timeout_ms),
            commit_pending_timeout: Duration::from_millis(self.commit_pending_timeout_ms),
        }
    }
}

impl EndpointSection {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn wps_walk_time(&self) -> Duration {
        Duration::from_secs(self.wps_walk_time_secs)
    }
}

impl WldConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> WldResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            WldError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> WldResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| WldError::Config(format!("Failed to parse TOML config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file or use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> WldResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> WldResult<()> {
        if self.fsm.delay_ms == 0 {
            return Err(WldError::Config("fsm.delay_ms must be > 0".to_string()));
        }

        if self.fsm.timeout_ms < self.fsm.delay_ms {
            return Err(WldError::Config(
                "fsm.timeout_ms must be >= fsm.delay_ms".to_string(),
            ));
        }

        if self.fsm.retry_delay_ms == 0 {
            return Err(WldError::Config(
                "fsm.retry_delay_ms must be > 0".to_string(),
            ));
        }

        if self.radio.channel_history_max == 0 {
            return Err(WldError::Config(
                "radio.channel_history_max must be > 0".to_string(),
            ));
        }

        if self.endpoint.reconnect_interval_secs == 0 {
            return Err(WldError::Config(
                "endpoint.reconnect_interval_secs must be > 0".to_string(),
            ));
        }

        if self.secdmn.hostapd_cmd.trim().is_empty() {
            return Err(WldError::Config(
                "secdmn.hostapd_cmd must not be empty".to_string(),
            ));
        }

        if self.secdmn.wpa_supplicant_cmd.trim().is_empty() {
            return Err(WldError::Config(
                "secdmn.wpa_supplicant_cmd must not be empty".to_string(),
            ));
        }

        for (i, radio) in self.radios.iter().enumerate() {
            if radio.name.is_empty() {
                return Err(WldError::Config(format!("radios[{}].name is empty", i)));
            }
            if self.radios[..i].iter().any(|r| r.name == radio.name) {
                return Err(WldError::Config(format!(
                    "duplicate radio name '{}'",
                    radio.name
                )));
            }
        }

        for ap in &self.access_points {
            if !self.radios.iter().any(|r| r.name == ap.radio) {
                return Err(WldError::Config(format!(
                    "access point '{}' references unknown radio '{}'",
                    ap.alias, ap.radio
                )));
            }
        }

        for ep in &self.endpoints {
            if !self.radios.iter().any(|r| r.name == ep.radio) {
                return Err(WldError::Config(format!(
                    "endpoint '{}' references unknown radio '{}'",
                    ep.alias, ep.radio
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = WldConfig::default();
        assert_eq!(config.fsm.max_retries, 3);
        assert_eq!(config.radio.channel_history_max, 10);
        assert_eq!(config.endpoint.reconnect_delay_secs, 5);
        assert_eq!(config.secdmn.use_global_instance, GlobalInstanceSetting::Auto);
        assert!(config.autocommit.enabled);
        assert!(config.radios.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let toml_content = r#"
[fsm]
max_retries = 5
delay_ms = 50

[secdmn]
use_global_instance = "off"

[autocommit]
enabled = false

[[radios]]
name = "wifi0"
band = "2.4GHz"

[[access_points]]
alias = "vap2g0"
radio = "wifi0"
ssid = "home"
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = WldConfig::from_file(file.path()).unwrap();
        assert_eq!(config.fsm.max_retries, 5);
        assert_eq!(config.fsm.delay_ms, 50);
        assert_eq!(config.fsm.timeout_ms, 5000);
        assert_eq!(config.secdmn.use_global_instance, GlobalInstanceSetting::Off);
        assert!(!config.autocommit.enabled);
        assert_eq!(config.radios.len(), 1);
        assert_eq!(config.access_points[0].ssid, "home");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = WldConfig::load_or_default("/nonexistent/wld.conf").unwrap();
        assert_eq!(config.fsm.max_retries, 3);
    }

    #[test]
    fn test_validation_rejects_zero_delay() {
        let mut config = WldConfig::default();
        config.fsm.delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_dangling_radio_reference() {
        let toml_content = r#"
[[access_points]]
alias = "vap0"
radio = "missing"
ssid = "x"
"#;
        let err = WldConfig::from_toml(toml_content).unwrap_err();
        assert!(err.to_string().contains("unknown radio"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            WldConfig::from_toml("[fsm\nmax_retries = "),
            Err(WldError::Config(_))
        ));
    }
}
