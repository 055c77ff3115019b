//! Global-vs-per-radio daemon instance decision.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor capability for running one daemon instance across radios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalDmnSupport {
    Unsupported,
    Required,
    Optional,
}

/// Operator setting, only consulted when support is `Optional`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalInstanceSetting {
    On,
    Off,
    #[default]
    Auto,
}

impl fmt::Display for GlobalInstanceSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GlobalInstanceSetting::On => "on",
            GlobalInstanceSetting::Off => "off",
            GlobalInstanceSetting::Auto => "auto",
        })
    }
}

/// Per-vendor resolution of the global instance decision for one daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DmnExecInfo {
    pub dmn_name: String,
    pub support: GlobalDmnSupport,
    pub setting: GlobalInstanceSetting,
    uses_global: bool,
}

impl DmnExecInfo {
    pub fn new(dmn_name: &str, support: GlobalDmnSupport, setting: GlobalInstanceSetting) -> Self {
        Self {
            dmn_name: dmn_name.to_string(),
            support,
            setting,
            uses_global: Self::resolve(support, setting),
        }
    }

    /// `Auto` picks the global instance whenever the vendor can do it.
    pub fn resolve(support: GlobalDmnSupport, setting: GlobalInstanceSetting) -> bool {
        match support {
            GlobalDmnSupport::Unsupported => false,
            GlobalDmnSupport::Required => true,
            GlobalDmnSupport::Optional => setting != GlobalInstanceSetting::Off,
        }
    }

    pub fn uses_global(&self) -> bool {
        self.uses_global
    }

    /// Applies a new operator setting. Returns true if the decision changed.
    pub fn apply_setting(&mut self, setting: GlobalInstanceSetting) -> bool {
        self.setting = setting;
        let uses_global = Self::resolve(self.support, setting);
        let changed = uses_global != self.uses_global;
        self.uses_global = uses_global;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_table() {
        use GlobalDmnSupport::*;
        use GlobalInstanceSetting::*;
        assert!(!DmnExecInfo::resolve(Unsupported, On));
        assert!(DmnExecInfo::resolve(Required, Off));
        assert!(DmnExecInfo::resolve(Optional, On));
        assert!(DmnExecInfo::resolve(Optional, Auto));
        assert!(!DmnExecInfo::resolve(Optional, Off));
    }

    #[test]
    fn test_apply_setting_reports_change() {
        let mut info = DmnExecInfo::new(
            "hostapd",
            GlobalDmnSupport::Optional,
            GlobalInstanceSetting::Auto,
        );
        assert!(info.uses_global());
        assert!(!info.apply_setting(GlobalInstanceSetting::On));
        assert!(info.apply_setting(GlobalInstanceSetting::Off));
        assert!(!info.uses_global());
    }
}
