//! Bounded-retry roaming of an endpoint to a target BSSID.
//!
//! A roam moves through numbered attempts. Each attempt pins the next
//! connect to the target and arms a per-attempt timer; a CONNECTED status
//! change short-circuits the wait. Every accepted [`WldContext::roam_to`]
//! call ends in exactly one callback invocation.

use crate::context::{TimerAction, WldContext};
use crate::events::EpStatusChange;
use crate::fsm::{FsmAction, StepMode};
use crate::handle::EpId;
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use wld_common::{EventCallback, TimerId};
use wld_types::{ConnectionStatus, MacAddress};

/// Shortest accepted per-attempt timeout.
pub const MIN_ATTEMPT_TIMEOUT_SECS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoamResult {
    Success,
    AlreadyConnected,
    RoamToMyself,
    AllAttemptsFailed,
    /// Superseded by a newer roam request.
    Replaced,
}

impl fmt::Display for RoamResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoamResult::Success => "SUCCESS",
            RoamResult::AlreadyConnected => "ALREADY_CONNECTED",
            RoamResult::RoamToMyself => "ROAM_TO_MYSELF",
            RoamResult::AllAttemptsFailed => "ALL_ATTEMPTS_FAILED",
            RoamResult::Replaced => "REPLACED",
        };
        f.write_str(s)
    }
}

pub type RoamCallback = Box<dyn FnOnce(EpId, RoamResult)>;

/// Sequence number of the in-flight roam per endpoint, shared with the
/// status-change subscriber.
pub(crate) type RoamWatch = Rc<RefCell<HashMap<EpId, u64>>>;

/// Roam sub-state of an endpoint. A null target means not roaming.
#[derive(Serialize)]
pub struct TinyRoam {
    pub target: MacAddress,
    pub attempt: u32,
    pub max_attempts: u32,
    pub timeout_secs: u32,
    pub nr_roams: u64,
    pub last_result: Option<RoamResult>,
    #[serde(skip)]
    pub(crate) seq: u64,
    #[serde(skip)]
    callback: Option<RoamCallback>,
    #[serde(skip)]
    pub(crate) timer: Option<TimerId>,
}

impl Default for TinyRoam {
    fn default() -> Self {
        Self {
            target: MacAddress::NULL,
            attempt: 0,
            max_attempts: 0,
            timeout_secs: 0,
            nr_roams: 0,
            last_result: None,
            seq: 0,
            callback: None,
            timer: None,
        }
    }
}

impl fmt::Debug for TinyRoam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TinyRoam")
            .field("target", &self.target)
            .field("attempt", &self.attempt)
            .field("max_attempts", &self.max_attempts)
            .field("timeout_secs", &self.timeout_secs)
            .field("seq", &self.seq)
            .field("last_result", &self.last_result)
            .finish()
    }
}

impl TinyRoam {
    pub fn is_active(&self) -> bool {
        !self.target.is_null()
    }

    fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs))
    }
}

impl WldContext {
    /// Starts roaming `ep` to `target`.
    ///
    /// Returns false, without side effects, when the arguments are invalid
    /// or the endpoint does not exist. A roam already in flight for the
    /// endpoint ends with [`RoamResult::Replaced`] first.
    #[instrument(skip(self, callback))]
    pub fn roam_to(
        &mut self,
        ep: EpId,
        target: MacAddress,
        max_attempts: u32,
        timeout_secs: u32,
        callback: RoamCallback,
    ) -> bool {
        if !target.is_valid_unicast()
            || max_attempts < 1
            || timeout_secs < MIN_ATTEMPT_TIMEOUT_SECS
            || !self.endpoints.contains_key(&ep)
        {
            warn!(%ep, %target, max_attempts, timeout_secs, "roam request rejected");
            return false;
        }
        if self.endpoints.get(&ep).is_some_and(|e| e.roam.is_active()) {
            self.finish_roam(ep, RoamResult::Replaced);
        }

        self.roam_seq += 1;
        let seq = self.roam_seq;
        let Some(endpoint) = self.endpoints.get_mut(&ep) else {
            return false;
        };
        let reconnect = endpoint.reconnect.timer.take();
        let roam = &mut endpoint.roam;
        roam.target = target;
        roam.attempt = 0;
        roam.max_attempts = max_attempts;
        roam.timeout_secs = timeout_secs;
        roam.seq = seq;
        roam.callback = Some(callback);
        info!(ep = %endpoint.alias, %target, max_attempts, timeout_secs, "roam started");

        self.cancel(reconnect);
        self.roam_watch.borrow_mut().insert(ep, seq);
        let timer = self.arm(Duration::ZERO, TimerAction::TinyRoamStep { ep, seq });
        if let Some(endpoint) = self.endpoints.get_mut(&ep) {
            endpoint.roam.timer = Some(timer);
        }
        true
    }

    /// Deferred start of the roam and per-attempt timeout.
    pub(crate) fn tinyroam_step(&mut self, ep: EpId, seq: u64) {
        let Some(endpoint) = self.endpoints.get_mut(&ep) else {
            return;
        };
        let roam = &mut endpoint.roam;
        if !roam.is_active() || roam.seq != seq {
            return;
        }
        roam.timer = None;
        let (attempt, target, own_mac) = (roam.attempt, roam.target, endpoint.mac);

        if attempt > 0 {
            self.evaluate_roam(ep);
            return;
        }
        if self.observed_bssid(ep) == target {
            self.finish_roam(ep, RoamResult::AlreadyConnected);
        } else if target == own_mac {
            self.finish_roam(ep, RoamResult::RoamToMyself);
        } else {
            self.roam_attempt(ep);
        }
    }

    /// Success short-circuit once a connection has come up.
    pub(crate) fn tinyroam_check(&mut self, ep: EpId, seq: u64) {
        let Some(roam) = self.endpoints.get(&ep).map(|e| &e.roam) else {
            return;
        };
        if !roam.is_active() || roam.seq != seq || roam.attempt == 0 {
            return;
        }
        let target = roam.target;
        if self.observed_bssid(ep) == target {
            self.finish_roam(ep, RoamResult::Success);
        }
    }

    fn roam_attempt(&mut self, ep: EpId) {
        let Some(endpoint) = self.endpoints.get_mut(&ep) else {
            return;
        };
        let roam = &mut endpoint.roam;
        roam.attempt += 1;
        let (seq, attempt, target, timeout) =
            (roam.seq, roam.attempt, roam.target, roam.attempt_timeout());
        endpoint.connect_bssid = Some(target);
        endpoint.hold_disconnected = false;
        endpoint.fsm.mark_dirty(FsmAction::EpConnect);
        info!(ep = %endpoint.alias, %target, attempt, "roam attempt");

        if let Err(e) = self.step_fsm(ep.into(), StepMode::Run) {
            warn!(%ep, error = %e, "roam attempt could not be issued");
        }
        let timer = self.arm(timeout, TimerAction::TinyRoamStep { ep, seq });
        match self.endpoints.get_mut(&ep) {
            Some(endpoint) if endpoint.roam.seq == seq && endpoint.roam.is_active() => {
                endpoint.roam.timer = Some(timer);
            }
            _ => self.cancel(Some(timer)),
        }
        // the driver may already be there
        self.arm(Duration::ZERO, TimerAction::TinyRoamCheck { ep, seq });
    }

    fn evaluate_roam(&mut self, ep: EpId) {
        let Some(endpoint) = self.endpoints.get(&ep) else {
            return;
        };
        let (target, attempt, max_attempts) = (
            endpoint.roam.target,
            endpoint.roam.attempt,
            endpoint.roam.max_attempts,
        );
        let observed = self.observed_bssid(ep);
        if observed == target {
            self.finish_roam(ep, RoamResult::Success);
            return;
        }
        if observed.is_null() {
            debug!(%ep, attempt, "roam attempt: not connected");
        } else {
            debug!(%ep, attempt, %observed, "roam attempt: wrong bssid");
        }
        if attempt < max_attempts {
            self.roam_attempt(ep);
            return;
        }

        warn!(%ep, %target, attempt, "roam failed, reconnecting to any access point");
        self.finish_roam(ep, RoamResult::AllAttemptsFailed);
        if let Some(endpoint) = self.endpoints.get_mut(&ep) {
            endpoint.fsm.mark_dirty(FsmAction::EpConnect);
            if let Err(e) = self.step_fsm(ep.into(), StepMode::Run) {
                warn!(%ep, error = %e, "fallback reconnect failed");
            }
        }
    }

    /// BSSID the endpoint is connected to: the driver's answer when it has
    /// one, else the last reported connection.
    fn observed_bssid(&self, ep: EpId) -> MacAddress {
        let Some(endpoint) = self.endpoints.get(&ep) else {
            return MacAddress::NULL;
        };
        let from_driver = self
            .radios
            .get(&endpoint.radio)
            .and_then(|r| self.vendor_ops(&r.vendor).ok())
            .and_then(|ops| ops.ep_current_bssid(endpoint).ok());
        match from_driver {
            Some(bssid) => bssid,
            None if endpoint.connection_status == ConnectionStatus::Connected => {
                endpoint.current_bssid
            }
            None => MacAddress::NULL,
        }
    }

    /// Ends the in-flight roam and fires its callback.
    pub(crate) fn finish_roam(&mut self, ep: EpId, result: RoamResult) {
        let Some(endpoint) = self.endpoints.get_mut(&ep) else {
            return;
        };
        let roam = &mut endpoint.roam;
        let (target, attempt) = (roam.target, roam.attempt);
        let callback = roam.callback.take();
        let timer = roam.timer.take();
        roam.target = MacAddress::NULL;
        roam.attempt = 0;
        roam.last_result = Some(result);
        if result == RoamResult::Success {
            roam.nr_roams += 1;
        }
        endpoint.connect_bssid = None;
        info!(ep = %endpoint.alias, %target, attempt, %result, "roam finished");

        self.cancel(timer);
        self.roam_watch.borrow_mut().remove(&ep);
        if let Some(callback) = callback {
            callback(ep, result);
        }
        if result != RoamResult::Success {
            self.resume_ep_reconnect(ep);
        }
    }

    /// Status-change subscriber arming the success check of a watched roam.
    pub(crate) fn tinyroam_subscriber(&self) -> EventCallback<EpStatusChange> {
        let watch = Rc::clone(&self.roam_watch);
        let timers = Rc::clone(&self.timers);
        Rc::new(move |ev: &EpStatusChange| {
            if ev.connection_status != ConnectionStatus::Connected {
                return;
            }
            let Some(seq) = watch.borrow().get(&ev.ep).copied() else {
                return;
            };
            timers
                .borrow_mut()
                .arm(Duration::ZERO, TimerAction::TinyRoamCheck { ep: ev.ep, seq });
        })
    }
}
