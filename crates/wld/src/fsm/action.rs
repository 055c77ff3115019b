//! Pending-action tags and the bitset that tracks them.

use serde::Serialize;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// One unit of work a commit pass can apply to the driver.
///
/// Declaration order is execution order within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum FsmAction {
    RadioStandards,
    RadioChannel,
    RadioTxPower,
    RadioSecDmn,
    RadioEnable,

    ApCreateVap,
    ApSsid,
    ApSecurity,
    ApMultiAp,
    ApMaxStations,
    ApSecDmn,
    ApEnable,

    EpCreateIntf,
    EpProfile,
    EpEnable,
    EpDisconnect,
    EpConnect,
}

impl FsmAction {
    pub const ALL: [FsmAction; 17] = [
        FsmAction::RadioStandards,
        FsmAction::RadioChannel,
        FsmAction::RadioTxPower,
        FsmAction::RadioSecDmn,
        FsmAction::RadioEnable,
        FsmAction::ApCreateVap,
        FsmAction::ApSsid,
        FsmAction::ApSecurity,
        FsmAction::ApMultiAp,
        FsmAction::ApMaxStations,
        FsmAction::ApSecDmn,
        FsmAction::ApEnable,
        FsmAction::EpCreateIntf,
        FsmAction::EpProfile,
        FsmAction::EpEnable,
        FsmAction::EpDisconnect,
        FsmAction::EpConnect,
    ];

    fn bit(self) -> u64 {
        1 << (self as u8)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FsmAction::RadioStandards => "radio_standards",
            FsmAction::RadioChannel => "radio_channel",
            FsmAction::RadioTxPower => "radio_tx_power",
            FsmAction::RadioSecDmn => "radio_secdmn",
            FsmAction::RadioEnable => "radio_enable",
            FsmAction::ApCreateVap => "ap_create_vap",
            FsmAction::ApSsid => "ap_ssid",
            FsmAction::ApSecurity => "ap_security",
            FsmAction::ApMultiAp => "ap_multi_ap",
            FsmAction::ApMaxStations => "ap_max_stations",
            FsmAction::ApSecDmn => "ap_secdmn",
            FsmAction::ApEnable => "ap_enable",
            FsmAction::EpCreateIntf => "ep_create_intf",
            FsmAction::EpProfile => "ep_profile",
            FsmAction::EpEnable => "ep_enable",
            FsmAction::EpDisconnect => "ep_disconnect",
            FsmAction::EpConnect => "ep_connect",
        }
    }
}

impl fmt::Display for FsmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity class an FSM drives; bounds which actions a pass may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FsmKind {
    Radio,
    AccessPoint,
    Endpoint,
}

impl FsmKind {
    /// Every action of this kind (what a sync-all pass executes).
    pub fn actions(self) -> ActionSet {
        let (first, last) = match self {
            FsmKind::Radio => (FsmAction::RadioStandards, FsmAction::RadioEnable),
            FsmKind::AccessPoint => (FsmAction::ApCreateVap, FsmAction::ApEnable),
            FsmKind::Endpoint => (FsmAction::EpCreateIntf, FsmAction::EpConnect),
        };
        FsmAction::ALL
            .iter()
            .filter(|a| **a >= first && **a <= last)
            .copied()
            .collect()
    }
}

/// Dense set of pending actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ActionSet(u64);

impl ActionSet {
    pub const EMPTY: ActionSet = ActionSet(0);

    pub fn contains(&self, action: FsmAction) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn insert(&mut self, action: FsmAction) {
        self.0 |= action.bit();
    }

    pub fn remove(&mut self, action: FsmAction) {
        self.0 &= !action.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Restricts the set to actions also present in `other`.
    pub fn intersect(self, other: ActionSet) -> ActionSet {
        ActionSet(self.0 & other.0)
    }

    /// Next action in execution order.
    pub fn first(&self) -> Option<FsmAction> {
        FsmAction::ALL.iter().copied().find(|a| self.contains(*a))
    }

    pub fn iter(&self) -> impl Iterator<Item = FsmAction> + '_ {
        FsmAction::ALL.iter().copied().filter(|a| self.contains(*a))
    }
}

impl From<FsmAction> for ActionSet {
    fn from(action: FsmAction) -> Self {
        ActionSet(action.bit())
    }
}

impl FromIterator<FsmAction> for ActionSet {
    fn from_iter<I: IntoIterator<Item = FsmAction>>(iter: I) -> Self {
        let mut set = ActionSet::EMPTY;
        for a in iter {
            set.insert(a);
        }
        set
    }
}

impl BitOr for ActionSet {
    type Output = ActionSet;

    fn bitor(self, rhs: ActionSet) -> ActionSet {
        ActionSet(self.0 | rhs.0)
    }
}

impl BitOr<FsmAction> for ActionSet {
    type Output = ActionSet;

    fn bitor(self, rhs: FsmAction) -> ActionSet {
        ActionSet(self.0 | rhs.bit())
    }
}

impl BitOr for FsmAction {
    type Output = ActionSet;

    fn bitor(self, rhs: FsmAction) -> ActionSet {
        ActionSet(self.bit() | rhs.bit())
    }
}

impl BitOrAssign for ActionSet {
    fn bitor_assign(&mut self, rhs: ActionSet) {
        self.0 |= rhs.0;
    }
}

impl BitOrAssign<FsmAction> for ActionSet {
    fn bitor_assign(&mut self, rhs: FsmAction) {
        self.0 |= rhs.bit();
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|a| a.as_str()).collect();
        write!(f, "[{}]", names.join(","))
    }
}

impl Serialize for ActionSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|a| a.as_str()))
    }
}
