//! Process-wide context.
//!
//! Owns every entity, the vendor registry, the daemon registry, the MLD
//! manager, the event bus and the timer queue. All work happens on the
//! caller's thread: operations either complete synchronously or arm a timer
//! whose [`TimerAction`] payload says how to continue.

use crate::ap::AccessPoint;
use crate::config::WldConfig;
use crate::endpoint::Endpoint;
use crate::error::{WldError, WldResult};
use crate::events::{EpStatusChange, EventBus, WldLifecycleEvent};
use crate::fsm::{ActionSet, Fsm, FsmConfig, FsmEntity, FsmState, FsmStep, StepMode};
use crate::handle::{ApId, DmnId, EpId, GrpId, HandleAlloc, RadioId, SsidId};
use crate::mld::{MldEnv, MldMgr, MldType};
use crate::radio::Radio;
use crate::secdmn::{
    DmnExecInfo, DmnRegistry, GlobalInstanceSetting, ProcessSpawner, SecDmn, SecDmnGrp,
    SecDmnGrpHandlers,
};
use crate::ssid::{Ssid, SsidOwner};
use crate::tinyroam::RoamWatch;
use crate::vendor::VendorOps;
use serde::Serialize;
use serde_json::json;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use wld_common::{EventCallback, Scheduler, SwlStatus, TimerId};
use wld_types::{MacAddress, Standard};

/// Name of the AP-side security daemon.
pub const HOSTAPD: &str = "hostapd";
/// Name of the STA-side security daemon.
pub const WPA_SUPPLICANT: &str = "wpa_supplicant";

/// Continuation carried by a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    FsmRun(FsmEntity),
    FsmDelay(FsmEntity),
    FsmRetry(FsmEntity),
    AutoCommit,
    TinyRoamStep { ep: EpId, seq: u64 },
    TinyRoamCheck { ep: EpId, seq: u64 },
    EpReconnect(EpId),
    EpWpsTimeout(EpId),
    ApWpsTimeout(ApId),
    DmnRestart(DmnId),
    DmnWatch,
}

pub(crate) struct VendorEntry {
    pub(crate) ops: Rc<dyn VendorOps>,
    pub(crate) hostapd: DmnExecInfo,
    pub(crate) hostapd_group: Option<GrpId>,
}

pub struct WldContext {
    pub(crate) config: WldConfig,
    pub(crate) fsm_cfg: FsmConfig,
    pub(crate) alloc: HandleAlloc,
    pub(crate) radios: BTreeMap<RadioId, Radio>,
    pub(crate) ssids: BTreeMap<SsidId, Ssid>,
    pub(crate) aps: BTreeMap<ApId, AccessPoint>,
    pub(crate) endpoints: BTreeMap<EpId, Endpoint>,
    pub(crate) vendors: BTreeMap<String, VendorEntry>,
    pub(crate) dmns: DmnRegistry,
    pub(crate) mld: MldMgr,
    pub(crate) bus: Rc<EventBus>,
    pub(crate) timers: Rc<RefCell<Scheduler<TimerAction>>>,
    pub(crate) roam_watch: RoamWatch,
    pub(crate) roam_seq: u64,
    pub(crate) next_radio_index: u32,
    roam_subscription: Option<EventCallback<EpStatusChange>>,
    autocommit_timer: Option<TimerId>,
    watch_timer: Option<TimerId>,
    initialized: bool,
}

impl fmt::Debug for WldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WldContext")
            .field("radios", &self.radios.len())
            .field("ssids", &self.ssids.len())
            .field("aps", &self.aps.len())
            .field("endpoints", &self.endpoints.len())
            .field("vendors", &self.vendors.keys().collect::<Vec<_>>())
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl WldContext {
    pub fn new(config: WldConfig, spawner: Rc<dyn ProcessSpawner>) -> Self {
        let bus = Rc::new(EventBus::new());
        Self {
            fsm_cfg: config.fsm.to_fsm_config(),
            config,
            alloc: HandleAlloc::new(),
            radios: BTreeMap::new(),
            ssids: BTreeMap::new(),
            aps: BTreeMap::new(),
            endpoints: BTreeMap::new(),
            vendors: BTreeMap::new(),
            dmns: DmnRegistry::new(spawner),
            mld: MldMgr::new(Rc::clone(&bus)),
            bus,
            timers: Rc::new(RefCell::new(Scheduler::new())),
            roam_watch: RoamWatch::default(),
            roam_seq: 0,
            next_radio_index: 0,
            roam_subscription: None,
            autocommit_timer: None,
            watch_timer: None,
            initialized: false,
        }
    }

    /// Brings up process-wide services and fires INIT_DONE.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.mld.init();
        let cb = self.tinyroam_subscriber();
        self.bus.ep_status.register(&cb);
        self.roam_subscription = Some(cb);
        if self.config.secdmn.watch_interval_secs > 0 {
            let interval = Duration::from_secs(self.config.secdmn.watch_interval_secs);
            self.watch_timer = Some(self.arm(interval, TimerAction::DmnWatch));
        }
        self.initialized = true;
        info!("wld context initialized");
        self.bus.lifecycle.notify(&WldLifecycleEvent::InitDone);
    }

    /// Fires DATAMODEL_LOADED once the bootstrap configuration is applied.
    pub fn datamodel_loaded(&self) {
        info!(
            radios = self.radios.len(),
            aps = self.aps.len(),
            endpoints = self.endpoints.len(),
            "data model loaded"
        );
        self.bus.lifecycle.notify(&WldLifecycleEvent::DatamodelLoaded);
    }

    /// Fires CLEANUP_START, then tears everything down.
    pub fn shutdown(&mut self) {
        info!("wld context shutting down");
        self.bus.lifecycle.notify(&WldLifecycleEvent::CleanupStart);

        let radios: Vec<RadioId> = self.radios.keys().copied().collect();
        for id in radios {
            if let Err(e) = self.delete_radio(id) {
                warn!(%id, error = %e, "radio teardown failed");
            }
        }
        self.mld.deinit();
        for entry in self.vendors.values_mut() {
            entry.hostapd_group = None;
        }
        self.dmns.shutdown();
        self.timers.borrow_mut().clear();
        self.autocommit_timer = None;
        self.watch_timer = None;
        if let Some(cb) = self.roam_subscription.take() {
            self.bus.ep_status.unregister(&cb);
        }
        self.roam_watch.borrow_mut().clear();
        self.bus.clear();
        self.initialized = false;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &WldConfig {
        &self.config
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn mld(&self) -> &MldMgr {
        &self.mld
    }

    pub fn secdmn(&self) -> &DmnRegistry {
        &self.dmns
    }

    // Clock and timers

    pub fn now(&self) -> Duration {
        self.timers.borrow().now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.borrow().next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Returns true if a timer carrying `action` is armed.
    pub fn has_timer(&self, action: &TimerAction) -> bool {
        self.timers.borrow().pending().any(|a| a == action)
    }

    pub(crate) fn arm(&self, delay: Duration, action: TimerAction) -> TimerId {
        self.timers.borrow_mut().arm(delay, action)
    }

    pub(crate) fn cancel(&self, timer: Option<TimerId>) {
        if let Some(id) = timer {
            self.timers.borrow_mut().cancel(id);
        }
    }

    /// Advances the virtual clock, dispatching every timer that falls due.
    pub fn advance(&mut self, by: Duration) {
        let target = self.now() + by;
        self.run_until(target);
    }

    /// Dispatches timers due at or before `deadline`, then sets the clock.
    pub fn run_until(&mut self, deadline: Duration) {
        loop {
            let next = self.timers.borrow_mut().pop_until(deadline);
            let Some((_, action)) = next else {
                break;
            };
            self.dispatch(action);
        }
        self.timers.borrow_mut().set_now(deadline);
    }

    /// Dispatches timers already due, including zero-delay ones.
    pub fn run_pending(&mut self) {
        let now = self.now();
        self.run_until(now);
    }

    fn dispatch(&mut self, action: TimerAction) {
        debug!(?action, "timer fired");
        let result = match action {
            TimerAction::FsmRun(entity) | TimerAction::FsmRetry(entity) => {
                self.clear_fsm_timer(entity);
                self.step_fsm(entity, StepMode::Run).map(|_| ())
            }
            TimerAction::FsmDelay(entity) => {
                self.clear_fsm_timer(entity);
                self.step_fsm(entity, StepMode::Resume).map(|_| ())
            }
            TimerAction::AutoCommit => {
                self.autocommit_timer = None;
                self.commit()
            }
            TimerAction::TinyRoamStep { ep, seq } => {
                self.tinyroam_step(ep, seq);
                Ok(())
            }
            TimerAction::TinyRoamCheck { ep, seq } => {
                self.tinyroam_check(ep, seq);
                Ok(())
            }
            TimerAction::EpReconnect(ep) => self.handle_ep_reconnect(ep),
            TimerAction::EpWpsTimeout(ep) => self.handle_ep_wps_timeout(ep),
            TimerAction::ApWpsTimeout(ap) => self.handle_ap_wps_timeout(ap),
            TimerAction::DmnRestart(dmn) => self.handle_dmn_restart(dmn),
            TimerAction::DmnWatch => {
                self.handle_dmn_watch();
                Ok(())
            }
        };
        if let Err(e) = result {
            match e {
                WldError::NotFound { .. } => debug!(?action, error = %e, "timer target gone"),
                e => warn!(?action, error = %e, "timer action failed"),
            }
        }
    }

    // Commit

    pub(crate) fn fsm_mut(&mut self, entity: FsmEntity) -> Option<&mut Fsm> {
        match entity {
            FsmEntity::Radio(id) => self.radios.get_mut(&id).map(|r| &mut r.fsm),
            FsmEntity::AccessPoint(id) => self.aps.get_mut(&id).map(|a| &mut a.fsm),
            FsmEntity::Endpoint(id) => self.endpoints.get_mut(&id).map(|e| &mut e.fsm),
        }
    }

    /// Commit state of an entity.
    pub fn fsm(&self, entity: FsmEntity) -> Option<&Fsm> {
        match entity {
            FsmEntity::Radio(id) => self.radios.get(&id).map(|r| &r.fsm),
            FsmEntity::AccessPoint(id) => self.aps.get(&id).map(|a| &a.fsm),
            FsmEntity::Endpoint(id) => self.endpoints.get(&id).map(|e| &e.fsm),
        }
    }

    fn fsm_or_not_found(&mut self, entity: FsmEntity) -> WldResult<&mut Fsm> {
        self.fsm_mut(entity)
            .ok_or_else(|| WldError::not_found("entity", entity))
    }

    /// Marks actions pending and arms the auto-commit timer.
    pub(crate) fn touch(&mut self, entity: FsmEntity, actions: ActionSet) -> WldResult<()> {
        self.fsm_or_not_found(entity)?.mark_dirty(actions);
        self.schedule_autocommit();
        Ok(())
    }

    /// Forces a full resynchronization of an entity on its next pass.
    pub fn request_sync(&mut self, entity: FsmEntity) -> WldResult<()> {
        self.fsm_or_not_found(entity)?.set_sync_all();
        self.schedule_autocommit();
        Ok(())
    }

    /// Records a requested FSM state, applied on the next pass.
    pub fn request_fsm_state(&mut self, entity: FsmEntity, state: FsmState) -> WldResult<()> {
        self.fsm_or_not_found(entity)?.request_state(state);
        self.schedule_autocommit();
        Ok(())
    }

    pub(crate) fn schedule_autocommit(&mut self) {
        if !self.config.autocommit.enabled || self.autocommit_timer.is_some() {
            return;
        }
        let delay = Duration::from_millis(self.config.autocommit.delay_ms);
        self.autocommit_timer = Some(self.arm(delay, TimerAction::AutoCommit));
    }

    /// Runs every dirty FSM: radios first, then access points, then endpoints.
    #[instrument(skip(self))]
    pub fn commit(&mut self) -> WldResult<()> {
        if let Some(timer) = self.autocommit_timer.take() {
            self.timers.borrow_mut().cancel(timer);
        }
        let mut entities: Vec<FsmEntity> = Vec::new();
        entities.extend(self.radios.keys().map(|id| FsmEntity::Radio(*id)));
        entities.extend(self.aps.keys().map(|id| FsmEntity::AccessPoint(*id)));
        entities.extend(self.endpoints.keys().map(|id| FsmEntity::Endpoint(*id)));

        for entity in entities {
            let dirty = self.fsm(entity).is_some_and(|f| f.is_dirty());
            if dirty {
                self.step_fsm(entity, StepMode::Run)?;
            }
        }
        Ok(())
    }

    /// Runs one FSM step now.
    pub fn run_fsm(&mut self, entity: FsmEntity) -> WldResult<FsmStep> {
        self.step_fsm(entity, StepMode::Run)
    }

    /// Completion entry point for a vendor that answered `OkContinue`.
    #[instrument(skip(self))]
    pub fn fsm_action_done(&mut self, entity: FsmEntity, status: SwlStatus) -> WldResult<FsmStep> {
        self.step_fsm(entity, StepMode::Complete(status))
    }

    /// Operator-level reset out of the error state, followed by a full pass.
    #[instrument(skip(self))]
    pub fn reset_fsm(&mut self, entity: FsmEntity) -> WldResult<FsmStep> {
        self.fsm_or_not_found(entity)?.request_state(FsmState::Idle);
        self.step_fsm(entity, StepMode::Run)
    }

    pub(crate) fn step_fsm(&mut self, entity: FsmEntity, mode: StepMode) -> WldResult<FsmStep> {
        let step = match entity {
            FsmEntity::Radio(id) => self.step_radio(id, mode)?,
            FsmEntity::AccessPoint(id) => self.step_ap(id, mode)?,
            FsmEntity::Endpoint(id) => self.step_endpoint(id, mode)?,
        };
        self.schedule_after_step(entity, step);
        Ok(step)
    }

    fn clear_fsm_timer(&mut self, entity: FsmEntity) {
        if let Some(fsm) = self.fsm_mut(entity) {
            fsm.timer = None;
        }
    }

    /// Arms a run of an entity's FSM, replacing any timer it already has.
    pub(crate) fn schedule_fsm(&mut self, entity: FsmEntity, delay: Duration, action: TimerAction) {
        let Some(old) = self.fsm_mut(entity).map(|f| f.timer.take()) else {
            return;
        };
        self.cancel(old);
        let timer = self.arm(delay, action);
        if let Some(fsm) = self.fsm_mut(entity) {
            fsm.timer = Some(timer);
        }
    }

    fn schedule_after_step(&mut self, entity: FsmEntity, step: FsmStep) {
        let next = match step {
            FsmStep::Busy | FsmStep::Idle => return,
            FsmStep::Wait => Some((self.fsm_cfg.delay, TimerAction::FsmDelay(entity))),
            FsmStep::Retry => Some((self.fsm_cfg.retry_delay, TimerAction::FsmRetry(entity))),
            FsmStep::Finished if self.fsm(entity).is_some_and(|f| f.is_dirty()) => {
                Some((Duration::ZERO, TimerAction::FsmRun(entity)))
            }
            FsmStep::Finished | FsmStep::Halted | FsmStep::Dependency | FsmStep::Failed => None,
        };
        match next {
            Some((delay, action)) => self.schedule_fsm(entity, delay, action),
            None => {
                let old = self.fsm_mut(entity).and_then(|f| f.timer.take());
                self.cancel(old);
            }
        }
    }

    // Vendors

    /// Registers a vendor backend and resolves its hostapd instance mode.
    #[instrument(skip(self, ops), fields(vendor = ops.name()))]
    pub fn register_vendor(&mut self, ops: Rc<dyn VendorOps>) -> WldResult<()> {
        let name = ops.name().to_string();
        if self.vendors.contains_key(&name) {
            return Err(WldError::invalid_state(format!(
                "vendor '{}' already registered",
                name
            )));
        }
        let info = DmnExecInfo::new(
            HOSTAPD,
            ops.global_dmn_support(HOSTAPD),
            self.config.secdmn.use_global_instance,
        );
        let group = info
            .uses_global()
            .then(|| self.create_hostapd_group(&name));
        ops.on_global_dmn_changed(HOSTAPD, info.uses_global());
        info!(vendor = %name, global_hostapd = info.uses_global(), "vendor registered");
        self.vendors.insert(
            name,
            VendorEntry {
                ops,
                hostapd: info,
                hostapd_group: group,
            },
        );
        Ok(())
    }

    pub fn vendor_names(&self) -> impl Iterator<Item = &str> {
        self.vendors.keys().map(String::as_str)
    }

    pub fn vendor_exec_info(&self, vendor: &str) -> Option<&DmnExecInfo> {
        self.vendors.get(vendor).map(|v| &v.hostapd)
    }

    pub(crate) fn vendor_ops(&self, vendor: &str) -> WldResult<Rc<dyn VendorOps>> {
        self.vendors
            .get(vendor)
            .map(|v| Rc::clone(&v.ops))
            .ok_or_else(|| WldError::not_found("vendor", vendor))
    }

    pub(crate) fn hostapd_group(&self, vendor: &str) -> Option<GrpId> {
        self.vendors.get(vendor).and_then(|v| v.hostapd_group)
    }

    fn create_hostapd_group(&mut self, vendor: &str) -> GrpId {
        let grp = self.dmns.grp_init(
            &format!("{}-{}", HOSTAPD, vendor),
            &self.config.secdmn.hostapd_cmd,
            "",
        );
        let handlers = SecDmnGrpHandlers {
            // one shared instance serves every configured radio
            get_args: Some(Box::new(|_grp: &SecDmnGrp, members: &[&SecDmn]| {
                if members.is_empty() {
                    return None;
                }
                let confs: Vec<&str> = members.iter().map(|m| m.args.as_str()).collect();
                Some(confs.join(" "))
            })),
            is_member_startable: Some(Box::new(|dmn: &SecDmn| dmn.is_startable())),
            has_sched_restart: Some(Box::new(|dmn: &SecDmn| dmn.sched_restart)),
        };
        if let Err(e) = self.dmns.grp_set_evt_handlers(grp, handlers) {
            warn!(error = %e, "failed to install hostapd group handlers");
        }
        grp
    }

    /// Changes the global hostapd instance setting and re-homes the radio
    /// daemons of every vendor whose decision changed.
    #[instrument(skip(self))]
    pub fn set_global_dmn_setting(&mut self, setting: GlobalInstanceSetting) -> WldResult<()> {
        self.config.secdmn.use_global_instance = setting;
        let names: Vec<String> = self.vendors.keys().cloned().collect();
        for name in names {
            let Some(entry) = self.vendors.get_mut(&name) else {
                continue;
            };
            if !entry.hostapd.apply_setting(setting) {
                continue;
            }
            let uses_global = entry.hostapd.uses_global();
            let old_group = entry.hostapd_group.take();
            let dmns: Vec<DmnId> = self
                .radios
                .values()
                .filter(|r| r.vendor == name)
                .filter_map(|r| r.hostapd)
                .collect();

            if uses_global {
                let grp = self.create_hostapd_group(&name);
                for dmn in &dmns {
                    self.dmns.dmn_join_group(*dmn, grp)?;
                }
                if let Some(entry) = self.vendors.get_mut(&name) {
                    entry.hostapd_group = Some(grp);
                }
            } else if let Some(grp) = old_group {
                self.dmns.grp_cleanup(grp)?;
            }
            for dmn in dmns {
                self.schedule_dmn_restart(dmn);
            }
            if let Some(entry) = self.vendors.get(&name) {
                entry.ops.on_global_dmn_changed(HOSTAPD, uses_global);
            }
            info!(vendor = %name, uses_global, "hostapd instance mode changed");
        }
        Ok(())
    }

    // Daemons

    /// Coalesces restart requests for a daemon behind one timer.
    pub(crate) fn schedule_dmn_restart(&mut self, id: DmnId) {
        let delay = Duration::from_millis(self.config.secdmn.restart_delay_ms);
        let Some(dmn) = self.dmns.dmn_mut(id) else {
            return;
        };
        dmn.sched_restart = true;
        if dmn.restart_timer.is_some() {
            return;
        }
        let timer = self.timers.borrow_mut().arm(delay, TimerAction::DmnRestart(id));
        if let Some(dmn) = self.dmns.dmn_mut(id) {
            dmn.restart_timer = Some(timer);
        }
    }

    fn handle_dmn_restart(&mut self, id: DmnId) -> WldResult<()> {
        let dmn = self
            .dmns
            .dmn_mut(id)
            .ok_or_else(|| WldError::not_found("daemon", id))?;
        dmn.restart_timer = None;
        if !dmn.sched_restart {
            return Ok(());
        }
        let (group, startable) = (dmn.group(), dmn.is_startable());
        if group.is_none() && !startable {
            dmn.sched_restart = false;
        }
        match group {
            Some(grp) => {
                self.dmns.grp_check_restart(grp)?;
                if let Some(dmn) = self.dmns.dmn_mut(id) {
                    dmn.sched_restart = false;
                }
            }
            None if startable => {
                self.dmns.dmn_restart(id)?;
            }
            None => self.dmns.dmn_stop(id)?,
        }
        Ok(())
    }

    fn handle_dmn_watch(&mut self) {
        let restarted = self.dmns.watch();
        if !restarted.is_empty() {
            info!(?restarted, "daemon watch restarted processes");
        }
        let interval = Duration::from_secs(self.config.secdmn.watch_interval_secs);
        self.watch_timer = Some(self.arm(interval, TimerAction::DmnWatch));
    }

    // Lookup

    pub fn radio(&self, id: RadioId) -> Option<&Radio> {
        self.radios.get(&id)
    }

    pub fn ssid(&self, id: SsidId) -> Option<&Ssid> {
        self.ssids.get(&id)
    }

    pub fn access_point(&self, id: ApId) -> Option<&AccessPoint> {
        self.aps.get(&id)
    }

    pub fn endpoint(&self, id: EpId) -> Option<&Endpoint> {
        self.endpoints.get(&id)
    }

    pub fn radios(&self) -> impl Iterator<Item = &Radio> {
        self.radios.values()
    }

    pub fn access_points(&self) -> impl Iterator<Item = &AccessPoint> {
        self.aps.values()
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    pub fn find_radio(&self, name: &str) -> Option<RadioId> {
        self.radios.values().find(|r| r.name == name).map(|r| r.id)
    }

    pub fn find_access_point(&self, alias: &str) -> Option<ApId> {
        self.aps.values().find(|a| a.alias == alias).map(|a| a.id)
    }

    pub fn find_endpoint(&self, alias: &str) -> Option<EpId> {
        self.endpoints
            .values()
            .find(|e| e.alias == alias)
            .map(|e| e.id)
    }

    pub(crate) fn radio_ref(&self, id: RadioId) -> WldResult<&Radio> {
        self.radios
            .get(&id)
            .ok_or_else(|| WldError::not_found("radio", id))
    }

    pub(crate) fn radio_mut(&mut self, id: RadioId) -> WldResult<&mut Radio> {
        self.radios
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("radio", id))
    }

    pub(crate) fn ap_ref(&self, id: ApId) -> WldResult<&AccessPoint> {
        self.aps
            .get(&id)
            .ok_or_else(|| WldError::not_found("accesspoint", id))
    }

    pub(crate) fn ap_mut(&mut self, id: ApId) -> WldResult<&mut AccessPoint> {
        self.aps
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("accesspoint", id))
    }

    pub(crate) fn ep_ref(&self, id: EpId) -> WldResult<&Endpoint> {
        self.endpoints
            .get(&id)
            .ok_or_else(|| WldError::not_found("endpoint", id))
    }

    pub(crate) fn ep_mut(&mut self, id: EpId) -> WldResult<&mut Endpoint> {
        self.endpoints
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("endpoint", id))
    }

    /// Serializes the live state for debugging.
    pub fn snapshot(&self) -> WldResult<serde_json::Value> {
        fn values<'a, T: Serialize + 'a>(
            it: impl Iterator<Item = &'a T>,
        ) -> WldResult<serde_json::Value> {
            let list: Vec<&T> = it.collect();
            serde_json::to_value(list)
                .map_err(|e| WldError::invalid_state(format!("snapshot failed: {}", e)))
        }

        Ok(json!({
            "now_ms": self.now().as_millis() as u64,
            "radios": values(self.radios.values())?,
            "ssids": values(self.ssids.values())?,
            "access_points": values(self.aps.values())?,
            "endpoints": values(self.endpoints.values())?,
            "mld": self.mld.snapshot(),
            "secdmn": self.dmns.snapshot(),
        }))
    }
}

/// Read-only view of the entities, handed to the MLD manager.
pub(crate) struct EntityView<'a> {
    radios: &'a BTreeMap<RadioId, Radio>,
    ssids: &'a BTreeMap<SsidId, Ssid>,
    aps: &'a BTreeMap<ApId, AccessPoint>,
}

impl<'a> EntityView<'a> {
    fn new(
        radios: &'a BTreeMap<RadioId, Radio>,
        ssids: &'a BTreeMap<SsidId, Ssid>,
        aps: &'a BTreeMap<ApId, AccessPoint>,
    ) -> Self {
        Self { radios, ssids, aps }
    }

    fn radio_of(&self, ssid: SsidId) -> Option<&Radio> {
        self.ssids
            .get(&ssid)
            .and_then(|s| self.radios.get(&s.radio))
    }
}

impl MldEnv for EntityView<'_> {
    fn mld_type(&self, ssid: SsidId) -> Option<MldType> {
        match self.ssids.get(&ssid)?.owner {
            SsidOwner::AccessPoint(_) => Some(MldType::Ap),
            SsidOwner::Endpoint(_) => Some(MldType::Sta),
            SsidOwner::Untyped => None,
        }
    }

    fn supports_mlo(&self, ssid: SsidId) -> bool {
        self.radio_of(ssid)
            .is_some_and(|r| r.supported_standards.contains(Standard::Be))
    }

    fn ssid_enabled(&self, ssid: SsidId) -> bool {
        self.ssids.get(&ssid).is_some_and(|s| s.enable)
    }

    fn radio_enabled(&self, ssid: SsidId) -> bool {
        self.radio_of(ssid).is_some_and(|r| r.enable)
    }

    fn mlo_capable(&self, ssid: SsidId) -> bool {
        self.radio_of(ssid).is_some_and(|r| r.mlo_capable)
    }

    fn link_mac(&self, ssid: SsidId) -> MacAddress {
        self.ssids
            .get(&ssid)
            .map(|s| s.bssid)
            .unwrap_or(MacAddress::NULL)
    }

    fn shared_connection_config(&self, ssid: SsidId, neighbours: &[SsidId]) -> bool {
        let ap_of = |id: &SsidId| match self.ssids.get(id).map(|s| s.owner) {
            Some(SsidOwner::AccessPoint(ap)) => self.aps.get(&ap),
            _ => None,
        };
        let Some(ap) = ap_of(&ssid) else {
            return false;
        };
        if !ap.security.mode.is_mlo_compatible() {
            return false;
        }
        neighbours
            .iter()
            .filter(|n| **n != ssid)
            .all(|n| ap_of(n).is_some_and(|other| other.security.same_credentials(&ap.security)))
    }
}

impl WldContext {
    pub(crate) fn entity_view(&self) -> EntityView<'_> {
        EntityView::new(&self.radios, &self.ssids, &self.aps)
    }

    /// The MLD manager together with a view of the entities it inspects.
    pub(crate) fn mld_with_view(&mut self) -> (&mut MldMgr, EntityView<'_>) {
        (
            &mut self.mld,
            EntityView::new(&self.radios, &self.ssids, &self.aps),
        )
    }
}
