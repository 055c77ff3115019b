//! Security daemons and daemon groups.
//!
//! A daemon either runs its own process or is a member of at most one group
//! whose single shared process serves every startable member. Membership is
//! only changed through [`DmnRegistry::dmn_join_group`] and
//! [`DmnRegistry::dmn_leave_group`].

mod dmn;
mod exec;
mod group;
mod spawner;

pub use dmn::SecDmn;
pub use exec::{DmnExecInfo, GlobalDmnSupport, GlobalInstanceSetting};
pub use group::{GetArgsCb, MemberStartableCb, SchedRestartCb, SecDmnGrp, SecDmnGrpHandlers};
pub use spawner::{split_args, ProcessSpawner, TokioSpawner};

use crate::error::{WldError, WldResult};
use crate::handle::{DmnId, GrpId, HandleAlloc};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, instrument, warn};

/// Owner of every daemon and group.
pub struct DmnRegistry {
    spawner: Rc<dyn ProcessSpawner>,
    dmns: BTreeMap<DmnId, SecDmn>,
    groups: BTreeMap<GrpId, SecDmnGrp>,
    alloc: HandleAlloc,
}

impl DmnRegistry {
    pub fn new(spawner: Rc<dyn ProcessSpawner>) -> Self {
        Self {
            spawner,
            dmns: BTreeMap::new(),
            groups: BTreeMap::new(),
            alloc: HandleAlloc::new(),
        }
    }

    pub fn dmn(&self, id: DmnId) -> Option<&SecDmn> {
        self.dmns.get(&id)
    }

    pub(crate) fn dmn_mut(&mut self, id: DmnId) -> Option<&mut SecDmn> {
        self.dmns.get_mut(&id)
    }

    pub fn group(&self, id: GrpId) -> Option<&SecDmnGrp> {
        self.groups.get(&id)
    }

    pub fn dmns(&self) -> impl Iterator<Item = &SecDmn> {
        self.dmns.values()
    }

    fn get_dmn(&self, id: DmnId) -> WldResult<&SecDmn> {
        self.dmns
            .get(&id)
            .ok_or_else(|| WldError::not_found("daemon", id))
    }

    fn get_group(&self, id: GrpId) -> WldResult<&SecDmnGrp> {
        self.groups
            .get(&id)
            .ok_or_else(|| WldError::not_found("daemon group", id))
    }

    fn get_group_mut(&mut self, id: GrpId) -> WldResult<&mut SecDmnGrp> {
        self.groups
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("daemon group", id))
    }

    // Daemon

    pub fn dmn_create(&mut self, name: &str, cmd: &str, args: &str, ctrl_iface_dir: PathBuf) -> DmnId {
        let id = DmnId(self.alloc.next());
        self.dmns
            .insert(id, SecDmn::new(id, name, cmd, args, ctrl_iface_dir));
        debug!(%id, name, "daemon created");
        id
    }

    /// Stops the daemon, leaves its group and forgets it.
    pub fn dmn_destroy(&mut self, id: DmnId) -> WldResult<()> {
        if let Some(dmn) = self.dmns.get_mut(&id) {
            dmn.enabled = false;
        }
        self.dmn_leave_group(id)?;
        self.dmn_stop(id)?;
        self.dmns.remove(&id);
        debug!(%id, "daemon destroyed");
        Ok(())
    }

    /// Joins a group. Joining the current group again is a no-op.
    #[instrument(skip(self))]
    pub fn dmn_join_group(&mut self, id: DmnId, grp: GrpId) -> WldResult<()> {
        let current = self.get_dmn(id)?.group;
        self.get_group(grp)?;
        if current == Some(grp) {
            return Ok(());
        }
        if current.is_some() {
            self.dmn_leave_group(id)?;
        }
        // a standalone process is replaced by the group's
        if let Some(pid) = self.dmns.get_mut(&id).and_then(|d| d.pid.take()) {
            self.spawner.stop(pid)?;
        }
        self.get_group_mut(grp)?.add_member(id);
        if let Some(dmn) = self.dmns.get_mut(&id) {
            dmn.group = Some(grp);
        }
        info!(dmn = %id, group = %grp, "daemon joined group");
        Ok(())
    }

    /// Leaves the current group, if any.
    pub fn dmn_leave_group(&mut self, id: DmnId) -> WldResult<()> {
        let Some(grp) = self.get_dmn(id)?.group else {
            return Ok(());
        };
        if let Some(group) = self.groups.get_mut(&grp) {
            group.remove_member(id);
        }
        if let Some(dmn) = self.dmns.get_mut(&id) {
            dmn.group = None;
        }
        info!(dmn = %id, group = %grp, "daemon left group");
        Ok(())
    }

    pub fn dmn_set_enabled(&mut self, id: DmnId, enabled: bool) -> WldResult<()> {
        let dmn = self
            .dmns
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("daemon", id))?;
        dmn.enabled = enabled;
        Ok(())
    }

    pub fn dmn_set_has_config(&mut self, id: DmnId, has_config: bool) -> WldResult<()> {
        let dmn = self
            .dmns
            .get_mut(&id)
            .ok_or_else(|| WldError::not_found("daemon", id))?;
        dmn.has_config = has_config;
        Ok(())
    }

    pub fn dmn_is_running(&self, id: DmnId) -> bool {
        let Some(dmn) = self.dmns.get(&id) else {
            return false;
        };
        match dmn.group {
            Some(grp) => {
                self.grp_is_running(grp)
                    && self
                        .groups
                        .get(&grp)
                        .is_some_and(|g| g.is_member_startable(dmn))
            }
            None => dmn.pid.is_some_and(|pid| self.spawner.is_running(pid)),
        }
    }

    /// Starts the daemon (through its group when it has one).
    #[instrument(skip(self))]
    pub fn dmn_start(&mut self, id: DmnId) -> WldResult<bool> {
        let dmn = self.get_dmn(id)?;
        if let Some(grp) = dmn.group {
            if self.grp_is_running(grp) {
                // membership may have changed; let the shared process pick it up
                return self.grp_refresh(grp);
            }
            return self.grp_start(grp);
        }
        if !dmn.is_startable() {
            debug!(dmn = %dmn.name, "daemon not startable");
            return Ok(false);
        }
        if dmn.pid.is_some_and(|pid| self.spawner.is_running(pid)) {
            return Ok(true);
        }
        let (cmd, args, ctrl_dir) = (dmn.cmd.clone(), split_args(&dmn.args), dmn.ctrl_iface_dir.clone());
        self.spawner.prepare_ctrl_dir(&ctrl_dir)?;
        let pid = self.spawner.start(&cmd, &args)?;
        if let Some(dmn) = self.dmns.get_mut(&id) {
            dmn.pid = Some(pid);
            dmn.nr_starts += 1;
            dmn.sched_restart = false;
        }
        Ok(true)
    }

    /// Stops the daemon. A group member is dropped from the shared process
    /// by refreshing the group.
    #[instrument(skip(self))]
    pub fn dmn_stop(&mut self, id: DmnId) -> WldResult<()> {
        let dmn = self.get_dmn(id)?;
        if let Some(grp) = dmn.group {
            if self.grp_is_running(grp) {
                self.grp_refresh(grp)?;
            }
            return Ok(());
        }
        if let Some(pid) = self.dmns.get_mut(&id).and_then(|d| d.pid.take()) {
            self.spawner.stop(pid)?;
        }
        Ok(())
    }

    /// Stops then starts the daemon.
    pub fn dmn_restart(&mut self, id: DmnId) -> WldResult<bool> {
        if let Some(grp) = self.get_dmn(id)?.group {
            return self.grp_refresh(grp);
        }
        self.dmn_stop(id)?;
        self.dmn_start(id)
    }

    /// Makes a running daemon re-read its configuration; starts it otherwise.
    pub fn dmn_reload(&mut self, id: DmnId) -> WldResult<bool> {
        let dmn = self.get_dmn(id)?;
        let pid = match dmn.group {
            Some(grp) => self.groups.get(&grp).and_then(|g| g.pid),
            None => dmn.pid,
        };
        match pid {
            Some(pid) if self.spawner.is_running(pid) => {
                self.spawner.reload(pid)?;
                Ok(true)
            }
            _ => self.dmn_start(id),
        }
    }

    // Group

    pub fn grp_init(&mut self, name: &str, cmd: &str, start_args: &str) -> GrpId {
        let id = GrpId(self.alloc.next());
        self.groups
            .insert(id, SecDmnGrp::new(id, name, cmd, start_args));
        info!(%id, name, "daemon group initialized");
        id
    }

    /// Stops the shared process, releases every member and forgets the group.
    pub fn grp_cleanup(&mut self, id: GrpId) -> WldResult<()> {
        self.grp_drop_members(id)?;
        self.groups.remove(&id);
        info!(%id, "daemon group cleaned up");
        Ok(())
    }

    pub fn grp_set_evt_handlers(&mut self, id: GrpId, handlers: SecDmnGrpHandlers) -> WldResult<()> {
        self.get_group_mut(id)?.handlers = handlers;
        Ok(())
    }

    /// True when at least one member is enabled.
    pub fn grp_is_enabled(&self, id: GrpId) -> bool {
        self.groups.get(&id).is_some_and(|g| {
            g.members
                .iter()
                .filter_map(|m| self.dmns.get(m))
                .any(|d| d.enabled)
        })
    }

    pub fn grp_is_running(&self, id: GrpId) -> bool {
        self.groups
            .get(&id)
            .and_then(|g| g.pid)
            .is_some_and(|pid| self.spawner.is_running(pid))
    }

    pub fn grp_get_proc(&self, id: GrpId) -> Option<u32> {
        self.groups.get(&id).and_then(|g| g.pid)
    }

    pub fn grp_members_count(&self, id: GrpId) -> usize {
        self.groups.get(&id).map_or(0, |g| g.members_count())
    }

    pub fn grp_member_by_pos(&self, id: GrpId, pos: usize) -> Option<DmnId> {
        self.groups.get(&id)?.member_by_pos(pos)
    }

    pub fn grp_member_by_name(&self, id: GrpId, name: &str) -> Option<DmnId> {
        self.groups
            .get(&id)?
            .members
            .iter()
            .copied()
            .find(|m| self.dmns.get(m).is_some_and(|d| d.name == name))
    }

    pub fn grp_has_member(&self, id: GrpId, dmn: DmnId) -> bool {
        self.groups.get(&id).is_some_and(|g| g.has_member(dmn))
    }

    /// Overrides whether a member takes part in the next start, without
    /// touching the member's own enable state.
    pub fn grp_set_member_startable(&mut self, id: GrpId, dmn: DmnId, startable: bool) -> WldResult<()> {
        let group = self.get_group_mut(id)?;
        if !group.has_member(dmn) {
            return Err(WldError::invalid_state(format!(
                "{} is not a member of {}",
                dmn, group.name
            )));
        }
        if startable {
            group.not_startable.remove(&dmn);
        } else {
            group.not_startable.insert(dmn);
        }
        Ok(())
    }

    /// Force-empties the group. The group itself stays usable.
    pub fn grp_drop_members(&mut self, id: GrpId) -> WldResult<()> {
        self.grp_stop(id)?;
        let members: Vec<DmnId> = self.get_group(id)?.members.clone();
        for dmn in members {
            self.dmn_leave_group(dmn)?;
        }
        Ok(())
    }

    /// Starts the shared process with the currently startable members.
    ///
    /// Returns false when no member is startable (the process is then stopped).
    #[instrument(skip(self))]
    pub fn grp_start(&mut self, id: GrpId) -> WldResult<bool> {
        if self.grp_is_running(id) {
            return Ok(true);
        }
        let group = self.get_group(id)?;
        let startable: Vec<&SecDmn> = group
            .members
            .iter()
            .filter_map(|m| self.dmns.get(m))
            .filter(|d| group.is_member_startable(d))
            .collect();
        if startable.is_empty() {
            debug!(group = %group.name, "no startable member");
            self.grp_stop(id)?;
            return Ok(false);
        }
        let args = split_args(&group.build_args(&startable));
        let dirs: Vec<PathBuf> = startable.iter().map(|d| d.ctrl_iface_dir.clone()).collect();
        let started: Vec<DmnId> = startable.iter().map(|d| d.id).collect();
        let cmd = group.cmd.clone();

        for dir in &dirs {
            self.spawner.prepare_ctrl_dir(dir)?;
        }
        let pid = self.spawner.start(&cmd, &args)?;
        let group = self.get_group_mut(id)?;
        group.pid = Some(pid);
        group.nr_starts += 1;
        for dmn in started {
            if let Some(d) = self.dmns.get_mut(&dmn) {
                d.sched_restart = false;
                d.nr_starts += 1;
            }
        }
        Ok(true)
    }

    pub fn grp_stop(&mut self, id: GrpId) -> WldResult<()> {
        if let Some(pid) = self.get_group_mut(id)?.pid.take() {
            self.spawner.stop(pid)?;
        }
        Ok(())
    }

    /// Restarts the shared process so it picks up membership changes.
    pub fn grp_refresh(&mut self, id: GrpId) -> WldResult<bool> {
        self.grp_stop(id)?;
        self.grp_start(id)
    }

    /// Relays pending member restarts. Returns true if the group restarted.
    pub fn grp_check_restart(&mut self, id: GrpId) -> WldResult<bool> {
        let group = self.get_group(id)?;
        let pending = group
            .members
            .iter()
            .filter_map(|m| self.dmns.get(m))
            .any(|d| group.has_sched_restart(d));
        if !pending {
            return Ok(false);
        }
        self.grp_refresh(id)
    }

    /// Restarts enabled daemons and groups whose process died.
    ///
    /// Returns the names of what was restarted.
    pub fn watch(&mut self) -> Vec<String> {
        let mut restarted = Vec::new();

        let standalone: Vec<DmnId> = self
            .dmns
            .values()
            .filter(|d| d.group.is_none() && d.is_startable())
            .filter(|d| !d.pid.is_some_and(|pid| self.spawner.is_running(pid)))
            .filter(|d| d.pid.is_some())
            .map(|d| d.id)
            .collect();
        for id in standalone {
            if let Some(d) = self.dmns.get_mut(&id) {
                d.pid = None;
            }
            match self.dmn_start(id) {
                Ok(true) => {
                    if let Some(d) = self.dmns.get(&id) {
                        warn!(dmn = %d.name, "daemon died, restarted");
                        restarted.push(d.name.clone());
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(%id, error = %e, "failed to restart daemon"),
            }
        }

        let groups: Vec<GrpId> = self
            .groups
            .values()
            .filter(|g| g.pid.is_some())
            .map(|g| g.id)
            .filter(|g| !self.grp_is_running(*g))
            .collect();
        for id in groups {
            if let Some(g) = self.groups.get_mut(&id) {
                g.pid = None;
            }
            match self.grp_start(id) {
                Ok(true) => {
                    if let Some(g) = self.groups.get(&id) {
                        warn!(group = %g.name, "daemon group process died, restarted");
                        restarted.push(g.name.clone());
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(%id, error = %e, "failed to restart daemon group"),
            }
        }
        restarted
    }

    /// Stops every process and forgets every daemon and group.
    pub fn shutdown(&mut self) {
        let groups: Vec<GrpId> = self.groups.keys().copied().collect();
        for id in groups {
            if let Err(e) = self.grp_cleanup(id) {
                warn!(%id, error = %e, "group cleanup failed");
            }
        }
        let dmns: Vec<DmnId> = self.dmns.keys().copied().collect();
        for id in dmns {
            if let Err(e) = self.dmn_destroy(id) {
                warn!(%id, error = %e, "daemon destroy failed");
            }
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let groups: Vec<serde_json::Value> = self
            .groups
            .values()
            .map(|g| {
                json!({
                    "id": g.id,
                    "name": g.name,
                    "members": g.members,
                    "running": self.grp_is_running(g.id),
                })
            })
            .collect();
        json!({
            "daemons": self.dmns.values().collect::<Vec<_>>(),
            "groups": groups,
        })
    }
}
