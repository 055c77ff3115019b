//! Per-entity commit state machine.
//!
//! Edits accumulate in a live action set. A pass snapshots that set, clears
//! it and executes the snapshot through an [`FsmExecutor`]; edits made while
//! the pass is in flight land in the fresh live set and wait for the next
//! pass. While a pass is pending (`com_pend`) every new run request is a
//! no-op, which serializes commits per entity.

use super::action::{ActionSet, FsmAction, FsmKind};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, warn};
use wld_common::{SwlStatus, TimerId};

/// Upper bound on passes chained within one run when looping is allowed.
const MAX_LOOP_PASSES: u32 = 4;

/// Timing and retry policy shared by every FSM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsmConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub delay: Duration,
    pub timeout: Duration,
    pub commit_pending_timeout: Duration,
}

impl Default for FsmConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            delay: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
            commit_pending_timeout: Duration::from_secs(30),
        }
    }
}

/// Macro-state of an FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FsmState {
    #[default]
    Idle,
    /// Waiting for a prerequisite entity.
    Dependency,
    /// Executing a snapshot.
    Run,
    /// Head action would block; re-polled by the delay timer or completed
    /// through [`Fsm::action_done`].
    Wait,
    Finish,
    /// Retry budget exhausted; halted until reset.
    Error,
}

/// Result of one step call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmStep {
    /// Nothing pending.
    Idle,
    /// A commit is in flight; nothing executed.
    Busy,
    /// FSM is in the error state.
    Halted,
    /// Prerequisites not met; nothing consumed.
    Dependency,
    /// Head action would block; caller re-polls after the delay.
    Wait,
    /// A call failed; caller re-runs after the retry delay.
    Retry,
    /// Retry budget exhausted.
    Failed,
    /// Pass complete.
    Finished,
}

/// How a step is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Fresh run request.
    Run,
    /// Delay timer fired for a waiting pass.
    Resume,
    /// Vendor reported the outcome of the waiting action.
    Complete(SwlStatus),
}

/// Executes the actions of one entity against the vendor layer.
pub trait FsmExecutor {
    fn kind(&self) -> FsmKind;

    /// Returns false while a prerequisite entity is not ready.
    fn dependencies_ready(&self) -> bool {
        true
    }

    fn execute(&mut self, action: FsmAction) -> SwlStatus;
}

/// Commit state of one radio, access point or endpoint.
#[derive(Debug, Default, Serialize)]
pub struct Fsm {
    state: FsmState,
    requested_state: Option<FsmState>,
    actions: ActionSet,
    sync_all: bool,
    ac_actions: ActionSet,
    ac_sync_all: bool,
    csc: u64,
    ac_csc: u64,
    com_pend: bool,
    #[serde(skip)]
    com_pend_start: Duration,
    #[serde(skip)]
    wait_start: Option<Duration>,
    retry_count: u32,
    allow_loop: bool,
    nr_run_starts: u64,
    nr_finish: u64,
    nr_errors: u64,
    last_failure: Option<(FsmAction, SwlStatus)>,
    #[serde(skip)]
    done: ActionSet,
    #[serde(skip)]
    pub(crate) timer: Option<TimerId>,
}

impl Fsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FsmState {
        self.state
    }

    pub fn requested_state(&self) -> Option<FsmState> {
        self.requested_state
    }

    /// Records the state a caller wants next; applied on the next run.
    ///
    /// `Run` forces a pass even with nothing pending, `Idle` clears an
    /// error state and `Error` halts the FSM.
    pub fn request_state(&mut self, state: FsmState) {
        if self.requested_state != Some(state) {
            self.requested_state = Some(state);
        }
    }

    /// ORs actions into the live set.
    pub fn mark_dirty(&mut self, actions: impl Into<ActionSet>) {
        self.actions |= actions.into();
        self.csc += 1;
    }

    /// Forces the next pass to execute every action of the entity kind.
    pub fn set_sync_all(&mut self) {
        self.sync_all = true;
        self.csc += 1;
    }

    pub fn sync_all(&self) -> bool {
        self.sync_all
    }

    pub fn pending_actions(&self) -> ActionSet {
        self.actions
    }

    /// Snapshot being executed by the in-flight pass.
    pub fn active_actions(&self) -> ActionSet {
        self.ac_actions
    }

    /// Change counter captured when the current or last pass started.
    pub fn active_csc(&self) -> u64 {
        self.ac_csc
    }

    pub fn change_counter(&self) -> u64 {
        self.csc
    }

    /// Returns true if a run would have work to do.
    pub fn is_dirty(&self) -> bool {
        !self.actions.is_empty() || self.sync_all || self.requested_state.is_some()
    }

    pub fn is_commit_pending(&self) -> bool {
        self.com_pend
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn nr_run_starts(&self) -> u64 {
        self.nr_run_starts
    }

    pub fn nr_finish(&self) -> u64 {
        self.nr_finish
    }

    pub fn nr_errors(&self) -> u64 {
        self.nr_errors
    }

    pub fn last_failure(&self) -> Option<(FsmAction, SwlStatus)> {
        self.last_failure
    }

    /// Allows chaining passes within one run while actions remain. Meant for
    /// staged vendor operations whose first stage queues the second.
    pub fn set_allow_loop(&mut self, allow: bool) {
        self.allow_loop = allow;
    }

    /// Actions that completed since the last call.
    pub fn take_done(&mut self) -> ActionSet {
        std::mem::take(&mut self.done)
    }

    /// Operator-level reset out of the error state.
    ///
    /// The next pass resynchronizes everything.
    pub fn reset(&mut self) {
        self.actions |= self.ac_actions;
        self.ac_actions.clear();
        self.ac_sync_all = false;
        self.com_pend = false;
        self.wait_start = None;
        self.retry_count = 0;
        self.state = FsmState::Idle;
        self.sync_all = true;
    }

    /// Dispatches to [`Fsm::run`], [`Fsm::resume`] or [`Fsm::action_done`].
    pub fn step(
        &mut self,
        mode: StepMode,
        now: Duration,
        cfg: &FsmConfig,
        exec: &mut dyn FsmExecutor,
    ) -> FsmStep {
        match mode {
            StepMode::Run => self.run(now, cfg, exec),
            StepMode::Resume => self.resume(now, cfg, exec),
            StepMode::Complete(status) => self.action_done(status, now, cfg, exec),
        }
    }

    /// Core step function.
    pub fn run(&mut self, now: Duration, cfg: &FsmConfig, exec: &mut dyn FsmExecutor) -> FsmStep {
        if self.com_pend {
            if now.saturating_sub(self.com_pend_start) < cfg.commit_pending_timeout {
                return FsmStep::Busy;
            }
            warn!(
                kind = ?exec.kind(),
                pending = %self.ac_actions,
                "commit pending beyond bound, abandoning pass"
            );
            self.nr_errors += 1;
            self.actions |= self.ac_actions;
            self.ac_actions.clear();
            self.com_pend = false;
            self.wait_start = None;
            self.state = FsmState::Idle;
        }

        let mut force = false;
        match self.requested_state.take() {
            Some(FsmState::Idle) if self.state == FsmState::Error => self.reset(),
            Some(FsmState::Error) => {
                self.state = FsmState::Error;
                return FsmStep::Halted;
            }
            Some(FsmState::Run) => force = true,
            _ => {}
        }

        if self.state == FsmState::Error {
            return FsmStep::Halted;
        }
        if !force && self.actions.is_empty() && !self.sync_all {
            return FsmStep::Idle;
        }
        if !exec.dependencies_ready() {
            if self.state != FsmState::Dependency {
                debug!(kind = ?exec.kind(), "commit waiting for dependency");
            }
            self.state = FsmState::Dependency;
            return FsmStep::Dependency;
        }

        let mut passes = 0;
        loop {
            self.start_pass(now, exec.kind());
            passes += 1;
            let step = self.drive(now, cfg, exec);
            if step != FsmStep::Finished
                || !self.allow_loop
                || self.actions.is_empty()
                || passes >= MAX_LOOP_PASSES
            {
                return step;
            }
        }
    }

    /// Continuation for the delay timer armed after [`FsmStep::Wait`].
    pub fn resume(&mut self, now: Duration, cfg: &FsmConfig, exec: &mut dyn FsmExecutor) -> FsmStep {
        if !self.com_pend || self.state != FsmState::Wait {
            return self.run(now, cfg, exec);
        }
        self.drive(now, cfg, exec)
    }

    /// Completes the head action of a waiting pass with a status reported
    /// asynchronously by the vendor, then continues the pass.
    pub fn action_done(
        &mut self,
        status: SwlStatus,
        now: Duration,
        cfg: &FsmConfig,
        exec: &mut dyn FsmExecutor,
    ) -> FsmStep {
        let Some(action) = self.ac_actions.first() else {
            return FsmStep::Idle;
        };
        if !self.com_pend || self.state != FsmState::Wait {
            debug!(kind = ?exec.kind(), %status, "stale completion ignored");
            return FsmStep::Idle;
        }
        if let Some(step) = self.apply_status(action, status, now, cfg) {
            return step;
        }
        self.drive(now, cfg, exec)
    }

    fn start_pass(&mut self, now: Duration, kind: FsmKind) {
        let universe = kind.actions();
        self.ac_actions = if self.sync_all {
            universe
        } else {
            self.actions.intersect(universe)
        };
        self.ac_sync_all = self.sync_all;
        self.ac_csc = self.csc;
        self.actions.clear();
        self.sync_all = false;

        self.state = FsmState::Run;
        self.nr_run_starts += 1;
        self.com_pend = true;
        self.com_pend_start = now;
        self.wait_start = None;
        debug!(
            ?kind,
            actions = %self.ac_actions,
            sync_all = self.ac_sync_all,
            csc = self.ac_csc,
            "commit pass start"
        );
    }

    fn drive(&mut self, now: Duration, cfg: &FsmConfig, exec: &mut dyn FsmExecutor) -> FsmStep {
        while let Some(action) = self.ac_actions.first() {
            let status = exec.execute(action);
            if let Some(step) = self.apply_status(action, status, now, cfg) {
                return step;
            }
        }
        self.finish()
    }

    /// Applies the outcome of one action. Returns a step when the pass stops.
    fn apply_status(
        &mut self,
        action: FsmAction,
        status: SwlStatus,
        now: Duration,
        cfg: &FsmConfig,
    ) -> Option<FsmStep> {
        match status {
            SwlStatus::Ok | SwlStatus::OkDone => {
                self.ac_actions.remove(action);
                self.done.insert(action);
                self.wait_start = None;
                None
            }
            SwlStatus::NotImplemented => {
                debug!(%action, "not implemented by vendor, skipped");
                self.ac_actions.remove(action);
                self.wait_start = None;
                None
            }
            SwlStatus::InvalidParam | SwlStatus::InvalidState => {
                warn!(%action, %status, "action rejected, dropped from pass");
                self.ac_actions.remove(action);
                self.nr_errors += 1;
                self.last_failure = Some((action, status));
                self.wait_start = None;
                None
            }
            SwlStatus::OkContinue => {
                let started = *self.wait_start.get_or_insert(now);
                if now.saturating_sub(started) >= cfg.timeout {
                    warn!(%action, "vendor call still blocking after timeout");
                    Some(self.fail(action, SwlStatus::Error, cfg))
                } else {
                    self.state = FsmState::Wait;
                    Some(FsmStep::Wait)
                }
            }
            SwlStatus::NotAvailable | SwlStatus::Error => Some(self.fail(action, status, cfg)),
        }
    }

    fn fail(&mut self, action: FsmAction, status: SwlStatus, cfg: &FsmConfig) -> FsmStep {
        self.retry_count += 1;
        self.nr_errors += 1;
        self.last_failure = Some((action, status));
        // unfinished work goes back to the live set for the retry
        self.actions |= self.ac_actions;
        self.ac_actions.clear();
        self.ac_sync_all = false;
        self.com_pend = false;
        self.wait_start = None;

        if self.retry_count > cfg.max_retries {
            error!(
                %action,
                %status,
                retries = self.retry_count,
                "commit retry budget exhausted"
            );
            self.state = FsmState::Error;
            FsmStep::Failed
        } else {
            warn!(%action, %status, retry = self.retry_count, "commit pass failed, will retry");
            self.state = FsmState::Idle;
            FsmStep::Retry
        }
    }

    fn finish(&mut self) -> FsmStep {
        self.state = FsmState::Finish;
        self.nr_finish += 1;
        self.com_pend = false;
        self.ac_sync_all = false;
        self.wait_start = None;
        self.retry_count = 0;
        debug!(done = %self.done, nr_finish = self.nr_finish, "commit pass finished");
        self.state = FsmState::Idle;
        FsmStep::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    struct Script {
        kind: FsmKind,
        ready: bool,
        calls: Vec<FsmAction>,
        replies: HashMap<FsmAction, Vec<SwlStatus>>,
    }

    impl Script {
        fn new(kind: FsmKind) -> Self {
            Self {
                kind,
                ready: true,
                calls: Vec::new(),
                replies: HashMap::new(),
            }
        }

        fn reply(mut self, action: FsmAction, statuses: &[SwlStatus]) -> Self {
            self.replies.insert(action, statuses.to_vec());
            self
        }
    }

    impl FsmExecutor for Script {
        fn kind(&self) -> FsmKind {
            self.kind
        }

        fn dependencies_ready(&self) -> bool {
            self.ready
        }

        fn execute(&mut self, action: FsmAction) -> SwlStatus {
            self.calls.push(action);
            match self.replies.get_mut(&action) {
                Some(list) if !list.is_empty() => list.remove(0),
                _ => SwlStatus::Ok,
            }
        }
    }

    const T0: Duration = Duration::ZERO;

    #[test]
    fn test_idle_when_nothing_pending() {
        let mut fsm = Fsm::new();
        let mut exec = Script::new(FsmKind::Radio);
        assert_eq!(fsm.run(T0, &FsmConfig::default(), &mut exec), FsmStep::Idle);
        assert_eq!(fsm.nr_run_starts(), 0);
        assert!(exec.calls.is_empty());
    }

    #[test]
    fn test_pass_executes_snapshot_in_order() {
        let mut fsm = Fsm::new();
        fsm.mark_dirty(FsmAction::RadioEnable);
        fsm.mark_dirty(FsmAction::RadioChannel);
        fsm.mark_dirty(FsmAction::RadioChannel);
        let mut exec = Script::new(FsmKind::Radio);

        assert_eq!(fsm.run(T0, &FsmConfig::default(), &mut exec), FsmStep::Finished);
        assert_eq!(exec.calls, vec![FsmAction::RadioChannel, FsmAction::RadioEnable]);
        assert_eq!(fsm.nr_run_starts(), 1);
        assert_eq!(fsm.nr_finish(), 1);
        assert_eq!(fsm.take_done().len(), 2);
        assert!(!fsm.is_dirty());
    }

    #[test]
    fn test_sync_all_executes_every_action_and_clears() {
        let mut fsm = Fsm::new();
        fsm.set_sync_all();
        let mut exec = Script::new(FsmKind::AccessPoint);
        fsm.run(T0, &FsmConfig::default(), &mut exec);
        assert_eq!(exec.calls.len(), FsmKind::AccessPoint.actions().len());
        assert!(!fsm.sync_all());
    }

    #[test]
    fn test_second_run_while_pending_is_noop() {
        let mut fsm = Fsm::new();
        fsm.mark_dirty(FsmAction::ApCreateVap);
        let mut exec =
            Script::new(FsmKind::AccessPoint).reply(FsmAction::ApCreateVap, &[SwlStatus::OkContinue]);
        let cfg = FsmConfig::default();

        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Wait);
        fsm.mark_dirty(FsmAction::ApSsid);
        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Busy);
        assert_eq!(exec.calls, vec![FsmAction::ApCreateVap]);

        // edit made during the pass stays queued for the next one
        assert_eq!(fsm.active_actions(), FsmAction::ApCreateVap.into());
        assert_eq!(fsm.pending_actions(), FsmAction::ApSsid.into());
    }

    #[test]
    fn test_async_completion_continues_pass() {
        let mut fsm = Fsm::new();
        fsm.mark_dirty(ActionSet::from(FsmAction::EpCreateIntf) | FsmAction::EpEnable);
        let mut exec =
            Script::new(FsmKind::Endpoint).reply(FsmAction::EpCreateIntf, &[SwlStatus::OkContinue]);
        let cfg = FsmConfig::default();

        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Wait);
        assert_eq!(
            fsm.action_done(SwlStatus::Ok, Duration::from_millis(10), &cfg, &mut exec),
            FsmStep::Finished
        );
        assert_eq!(exec.calls, vec![FsmAction::EpCreateIntf, FsmAction::EpEnable]);
        assert!(!fsm.is_commit_pending());
    }

    #[test]
    fn test_would_block_times_out_into_retry() {
        let mut fsm = Fsm::new();
        fsm.mark_dirty(FsmAction::RadioChannel);
        let mut exec = Script::new(FsmKind::Radio).reply(
            FsmAction::RadioChannel,
            &[SwlStatus::OkContinue, SwlStatus::OkContinue, SwlStatus::OkContinue],
        );
        let cfg = FsmConfig {
            timeout: Duration::from_millis(200),
            ..FsmConfig::default()
        };

        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Wait);
        assert_eq!(fsm.resume(Duration::from_millis(100), &cfg, &mut exec), FsmStep::Wait);
        assert_eq!(fsm.resume(Duration::from_millis(200), &cfg, &mut exec), FsmStep::Retry);
        assert_eq!(fsm.retry_count(), 1);
        assert!(fsm.pending_actions().contains(FsmAction::RadioChannel));
    }

    #[test]
    fn test_not_implemented_is_skipped() {
        let mut fsm = Fsm::new();
        fsm.mark_dirty(ActionSet::from(FsmAction::RadioTxPower) | FsmAction::RadioEnable);
        let mut exec =
            Script::new(FsmKind::Radio).reply(FsmAction::RadioTxPower, &[SwlStatus::NotImplemented]);
        assert_eq!(fsm.run(T0, &FsmConfig::default(), &mut exec), FsmStep::Finished);
        assert_eq!(fsm.take_done(), FsmAction::RadioEnable.into());
        assert_eq!(fsm.retry_count(), 0);
    }

    #[test]
    fn test_retry_budget_escalates_to_error() {
        let mut fsm = Fsm::new();
        fsm.mark_dirty(FsmAction::ApEnable);
        let mut exec = Script::new(FsmKind::AccessPoint)
            .reply(FsmAction::ApEnable, &[SwlStatus::Error; 8]);
        let cfg = FsmConfig {
            max_retries: 2,
            ..FsmConfig::default()
        };

        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Retry);
        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Retry);
        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Failed);
        assert_eq!(fsm.state(), FsmState::Error);

        // halted: no further vendor calls
        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Halted);
        assert_eq!(exec.calls.len(), 3);

        fsm.request_state(FsmState::Idle);
        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Retry);
        assert_eq!(fsm.retry_count(), 1);
    }

    #[test]
    fn test_dependency_consumes_nothing() {
        let mut fsm = Fsm::new();
        fsm.mark_dirty(FsmAction::ApSsid);
        let mut exec = Script::new(FsmKind::AccessPoint);
        exec.ready = false;
        assert_eq!(fsm.run(T0, &FsmConfig::default(), &mut exec), FsmStep::Dependency);
        assert_eq!(fsm.state(), FsmState::Dependency);
        assert!(fsm.pending_actions().contains(FsmAction::ApSsid));
        assert_eq!(fsm.nr_run_starts(), 0);
    }

    #[test]
    fn test_stuck_commit_is_abandoned_after_bound() {
        let mut fsm = Fsm::new();
        fsm.mark_dirty(FsmAction::EpConnect);
        let mut exec = Script::new(FsmKind::Endpoint)
            .reply(FsmAction::EpConnect, &[SwlStatus::OkContinue]);
        let cfg = FsmConfig::default();

        assert_eq!(fsm.run(T0, &cfg, &mut exec), FsmStep::Wait);
        let late = cfg.commit_pending_timeout + Duration::from_secs(1);
        assert_eq!(fsm.run(late, &cfg, &mut exec), FsmStep::Finished);
        assert_eq!(exec.calls, vec![FsmAction::EpConnect, FsmAction::EpConnect]);
    }

    #[test]
    fn test_requested_run_forces_empty_pass() {
        let mut fsm = Fsm::new();
        fsm.request_state(FsmState::Run);
        fsm.request_state(FsmState::Run);
        let mut exec = Script::new(FsmKind::Radio);
        assert_eq!(fsm.run(T0, &FsmConfig::default(), &mut exec), FsmStep::Finished);
        assert_eq!(fsm.nr_finish(), 1);
        assert_eq!(fsm.requested_state(), None);
    }
}
