//! A pool of daemons served by one shared process.

use super::dmn::SecDmn;
use crate::handle::{DmnId, GrpId};
use std::collections::HashSet;
use std::fmt;

/// Builds the start arguments of the shared process from its startable members.
pub type GetArgsCb = Box<dyn Fn(&SecDmnGrp, &[&SecDmn]) -> Option<String>>;
/// Tells whether a member meets its start preconditions.
pub type MemberStartableCb = Box<dyn Fn(&SecDmn) -> bool>;
/// Tells whether a member has a restart pending that the group must relay.
pub type SchedRestartCb = Box<dyn Fn(&SecDmn) -> bool>;

#[derive(Default)]
pub struct SecDmnGrpHandlers {
    pub get_args: Option<GetArgsCb>,
    pub is_member_startable: Option<MemberStartableCb>,
    pub has_sched_restart: Option<SchedRestartCb>,
}

impl fmt::Debug for SecDmnGrpHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecDmnGrpHandlers")
            .field("get_args", &self.get_args.is_some())
            .field("is_member_startable", &self.is_member_startable.is_some())
            .field("has_sched_restart", &self.has_sched_restart.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct SecDmnGrp {
    pub id: GrpId,
    pub name: String,
    pub cmd: String,
    pub start_args: String,
    pub(crate) members: Vec<DmnId>,
    pub(crate) not_startable: HashSet<DmnId>,
    pub(crate) handlers: SecDmnGrpHandlers,
    pub(crate) pid: Option<u32>,
    pub nr_starts: u32,
}

impl SecDmnGrp {
    pub(crate) fn new(id: GrpId, name: &str, cmd: &str, start_args: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            cmd: cmd.to_string(),
            start_args: start_args.to_string(),
            members: Vec::new(),
            not_startable: HashSet::new(),
            handlers: SecDmnGrpHandlers::default(),
            pid: None,
            nr_starts: 0,
        }
    }

    pub fn members_count(&self) -> usize {
        self.members.len()
    }

    pub fn member_by_pos(&self, pos: usize) -> Option<DmnId> {
        self.members.get(pos).copied()
    }

    pub fn has_member(&self, dmn: DmnId) -> bool {
        self.members.contains(&dmn)
    }

    pub fn members(&self) -> &[DmnId] {
        &self.members
    }

    /// Process id of the shared instance.
    pub fn proc(&self) -> Option<u32> {
        self.pid
    }

    /// Evaluated right before every (re)start.
    pub fn is_member_startable(&self, dmn: &SecDmn) -> bool {
        if self.not_startable.contains(&dmn.id) {
            return false;
        }
        match &self.handlers.is_member_startable {
            Some(cb) => cb(dmn),
            None => dmn.is_startable(),
        }
    }

    pub fn has_sched_restart(&self, dmn: &SecDmn) -> bool {
        match &self.handlers.has_sched_restart {
            Some(cb) => cb(dmn),
            None => dmn.sched_restart,
        }
    }

    /// Start arguments for the given startable members.
    pub fn build_args(&self, members: &[&SecDmn]) -> String {
        self.handlers
            .get_args
            .as_ref()
            .and_then(|cb| cb(self, members))
            .unwrap_or_else(|| self.start_args.clone())
    }

    pub(crate) fn add_member(&mut self, dmn: DmnId) -> bool {
        if self.members.contains(&dmn) {
            return false;
        }
        self.members.push(dmn);
        true
    }

    pub(crate) fn remove_member(&mut self, dmn: DmnId) -> bool {
        self.not_startable.remove(&dmn);
        let before = self.members.len();
        self.members.retain(|m| *m != dmn);
        before != self.members.len()
    }
}
