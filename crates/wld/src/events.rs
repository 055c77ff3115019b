//! Process-wide event bus.
//!
//! Payloads carry handles, never references: a subscriber that needs more
//! than the payload resolves the handle and must tolerate it being stale.

use crate::handle::{ApId, EpId, RadioId, SsidId};
use crate::mld::MldType;
use wld_common::EventQueue;
use wld_types::{
    ApStatus, ConnectionStatus, EndpointStatus, MacAddress, RadioDetailedState, RadioStatus,
    SsidStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioStatusChange {
    pub radio: RadioId,
    pub old_status: RadioStatus,
    pub old_detailed_state: RadioDetailedState,
    pub status: RadioStatus,
    pub detailed_state: RadioDetailedState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApStatusChange {
    pub ap: ApId,
    pub old_ap_status: ApStatus,
    pub old_ssid_status: SsidStatus,
    pub ap_status: ApStatus,
    pub ssid_status: SsidStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApChange {
    Create,
    CreateFinal,
    Destroy,
    Deinit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApLifecycleEvent {
    pub ap: ApId,
    pub change: ApChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApActionType {
    RssiSample,
    Steer,
    Kick,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApActionEvent {
    pub ap: ApId,
    pub action: ApActionType,
    pub station: MacAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpStatusChange {
    pub ep: EpId,
    pub old_status: EndpointStatus,
    pub old_connection_status: ConnectionStatus,
    pub status: EndpointStatus,
    pub connection_status: ConnectionStatus,
    /// BSSID the endpoint reports being connected to (null when not connected).
    pub bssid: MacAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpChange {
    Create,
    CreateFinal,
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpLifecycleEvent {
    pub ep: EpId,
    pub change: EpChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationChange {
    Create,
    Assoc,
    Auth,
    Disassoc,
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationLifecycleEvent {
    pub ap: ApId,
    pub station: MacAddress,
    pub change: StationChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MldChange {
    Add,
    Update,
    Del,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MldEvent {
    pub mld_type: MldType,
    pub unit: u32,
    pub ssid: SsidId,
    pub change: MldChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WldLifecycleEvent {
    InitDone,
    DatamodelLoaded,
    CleanupStart,
}

/// Named channels of the bus.
#[derive(Debug)]
pub struct EventBus {
    pub radio_status: EventQueue<RadioStatusChange>,
    pub ap_status: EventQueue<ApStatusChange>,
    pub ap_lifecycle: EventQueue<ApLifecycleEvent>,
    pub ap_action: EventQueue<ApActionEvent>,
    pub ep_status: EventQueue<EpStatusChange>,
    pub ep_lifecycle: EventQueue<EpLifecycleEvent>,
    pub station_lifecycle: EventQueue<StationLifecycleEvent>,
    pub mld: EventQueue<MldEvent>,
    pub lifecycle: EventQueue<WldLifecycleEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            radio_status: EventQueue::new("radio_status"),
            ap_status: EventQueue::new("ap_status"),
            ap_lifecycle: EventQueue::new("ap_lifecycle"),
            ap_action: EventQueue::new("ap_action"),
            ep_status: EventQueue::new("ep_status"),
            ep_lifecycle: EventQueue::new("ep_lifecycle"),
            station_lifecycle: EventQueue::new("station_lifecycle"),
            mld: EventQueue::new("mld"),
            lifecycle: EventQueue::new("lifecycle"),
        }
    }

    /// Drops every subscriber on every channel.
    pub fn clear(&self) {
        self.radio_status.clear();
        self.ap_status.clear();
        self.ap_lifecycle.clear();
        self.ap_action.clear();
        self.ep_status.clear();
        self.ep_lifecycle.clear();
        self.station_lifecycle.clear();
        self.mld.clear();
        self.lifecycle.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wld_common::EventCallback;

    #[test]
    fn test_channels_are_independent() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let cb: EventCallback<WldLifecycleEvent> = Rc::new(move |ev| s.borrow_mut().push(*ev));
        bus.lifecycle.register(&cb);

        bus.ep_lifecycle.notify(&EpLifecycleEvent {
            ep: EpId(1),
            change: EpChange::Create,
        });
        bus.lifecycle.notify(&WldLifecycleEvent::InitDone);
        assert_eq!(*seen.borrow(), vec![WldLifecycleEvent::InitDone]);

        bus.clear();
        bus.lifecycle.notify(&WldLifecycleEvent::CleanupStart);
        assert_eq!(seen.borrow().len(), 1);
    }
}
