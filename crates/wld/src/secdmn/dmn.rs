//! One security daemon process identity.

use crate::handle::{DmnId, GrpId};
use serde::Serialize;
use std::path::PathBuf;
use wld_common::TimerId;

#[derive(Debug, Serialize)]
pub struct SecDmn {
    pub id: DmnId,
    pub name: String,
    pub cmd: String,
    /// Start arguments when running standalone.
    pub args: String,
    pub ctrl_iface_dir: PathBuf,
    /// Wanted running by its owner.
    pub enabled: bool,
    /// Its configuration file has been written at least once.
    pub has_config: bool,
    pub(crate) pid: Option<u32>,
    pub(crate) group: Option<GrpId>,
    /// A restart is pending and will be relayed by the group or timer.
    pub sched_restart: bool,
    #[serde(skip)]
    pub(crate) restart_timer: Option<TimerId>,
    pub nr_starts: u32,
}

impl SecDmn {
    pub(crate) fn new(id: DmnId, name: &str, cmd: &str, args: &str, ctrl_iface_dir: PathBuf) -> Self {
        Self {
            id,
            name: name.to_string(),
            cmd: cmd.to_string(),
            args: args.to_string(),
            ctrl_iface_dir,
            enabled: false,
            has_config: false,
            pid: None,
            group: None,
            sched_restart: false,
            restart_timer: None,
            nr_starts: 0,
        }
    }

    /// Process id of the standalone instance.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn group(&self) -> Option<GrpId> {
        self.group
    }

    /// Startable when enabled and configured.
    pub fn is_startable(&self) -> bool {
        self.enabled && self.has_config
    }

    /// Control socket path used for out-of-band commands.
    pub fn ctrl_iface_path(&self) -> PathBuf {
        self.ctrl_iface_dir.join(&self.name)
    }
}
