//! Virtual-clock timer queue.
//!
//! Every deferred action in the control plane (FSM delay/retry, roam
//! attempts, reconnect, daemon restarts) is a timer whose payload describes
//! the continuation. The owner drives the clock with [`Scheduler::pop_until`]
//! and dispatches each payload; tests advance the clock explicitly.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Handle of an armed timer. Never reused within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Timer queue ordered by deadline, then by arming order.
#[derive(Debug)]
pub struct Scheduler<A> {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, TimerId), A>,
    deadlines: HashMap<TimerId, Duration>,
}

impl<A> Scheduler<A> {
    /// Creates an empty scheduler with the clock at zero.
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 1,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Arms a timer firing `delay` after the current time.
    ///
    /// A zero delay defers the action to the next dispatch round, after every
    /// timer already due.
    pub fn arm(&mut self, delay: Duration, action: A) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let deadline = self.now + delay;
        self.queue.insert((deadline, id), action);
        self.deadlines.insert(id, deadline);
        tracing::trace!(%id, ?delay, "timer armed");
        id
    }

    /// Cancels a timer, returning its payload if it was still armed.
    pub fn cancel(&mut self, id: TimerId) -> Option<A> {
        let deadline = self.deadlines.remove(&id)?;
        tracing::trace!(%id, "timer cancelled");
        self.queue.remove(&(deadline, id))
    }

    /// Returns true if the timer is armed and has not fired.
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Time left before the timer fires.
    pub fn remaining(&self, id: TimerId) -> Option<Duration> {
        self.deadlines
            .get(&id)
            .map(|d| d.saturating_sub(self.now))
    }

    /// Deadline of the earliest armed timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pops the earliest timer due at or before `limit`.
    ///
    /// The clock moves forward to the popped timer's deadline so that timers
    /// armed while handling it are relative to the right instant.
    pub fn pop_until(&mut self, limit: Duration) -> Option<(TimerId, A)> {
        let (&(deadline, id), _) = self.queue.iter().next()?;
        if deadline > limit {
            return None;
        }
        let action = self.queue.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        if deadline > self.now {
            self.now = deadline;
        }
        Some((id, action))
    }

    /// Moves the clock forward. Never moves it backward.
    pub fn set_now(&mut self, now: Duration) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterates over armed payloads in firing order.
    pub fn pending(&self) -> impl Iterator<Item = &A> {
        self.queue.values()
    }

    /// Drops every armed timer.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}
