//! External process control for security daemons.

use crate::error::{WldError, WldResult};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tracing::{debug, info, warn};

/// Starts, stops, reloads and probes daemon processes.
pub trait ProcessSpawner {
    /// Starts `cmd` with `args` and returns its process id.
    fn start(&self, cmd: &str, args: &[String]) -> WldResult<u32>;

    fn stop(&self, pid: u32) -> WldResult<()>;

    /// Asks the process to re-read its configuration.
    fn reload(&self, pid: u32) -> WldResult<()>;

    fn is_running(&self, pid: u32) -> bool;

    /// Creates the control interface directory of a daemon.
    fn prepare_ctrl_dir(&self, dir: &Path) -> WldResult<()> {
        std::fs::create_dir_all(dir)?;
        Ok(())
    }
}

/// Splits a daemon argument string on whitespace.
pub fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

/// Drains a daemon's stderr into the log so a full pipe never stalls it.
async fn forward_stderr(pid: u32, cmd: String, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => warn!(pid, daemon = %cmd, "{}", line),
            Ok(None) => break,
            Err(e) => {
                debug!(pid, daemon = %cmd, error = %e, "stderr closed");
                break;
            }
        }
    }
}

/// Spawner backed by `tokio::process`. Must be used from within a runtime.
#[derive(Debug, Default)]
pub struct TokioSpawner {
    children: RefCell<HashMap<u32, Child>>,
}

impl TokioSpawner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessSpawner for TokioSpawner {
    fn start(&self, cmd: &str, args: &[String]) -> WldResult<u32> {
        let command_line = format!("{} {}", cmd, args.join(" "));
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WldError::Process {
                command: command_line.clone(),
                source: e,
            })?;
        let pid = child.id().ok_or_else(|| WldError::Process {
            command: command_line.clone(),
            source: io::Error::other("process exited before reporting a pid"),
        })?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(pid, cmd.to_string(), stderr));
        }
        info!(pid, command = %command_line, "daemon process started");
        self.children.borrow_mut().insert(pid, child);
        Ok(pid)
    }

    fn stop(&self, pid: u32) -> WldResult<()> {
        let Some(mut child) = self.children.borrow_mut().remove(&pid) else {
            debug!(pid, "stop requested for unknown process");
            return Ok(());
        };
        child.start_kill().map_err(|e| WldError::Process {
            command: format!("kill {}", pid),
            source: e,
        })?;
        info!(pid, "daemon process stopped");
        Ok(())
    }

    fn reload(&self, pid: u32) -> WldResult<()> {
        let raw = i32::try_from(pid)
            .map_err(|_| WldError::invalid_param("pid", format!("{} out of range", pid)))?;
        signal::kill(Pid::from_raw(raw), Signal::SIGHUP).map_err(|errno| WldError::Process {
            command: format!("kill -HUP {}", pid),
            source: io::Error::from(errno),
        })?;
        debug!(pid, "daemon process reloaded");
        Ok(())
    }

    fn is_running(&self, pid: u32) -> bool {
        let mut children = self.children.borrow_mut();
        let Some(child) = children.get_mut(&pid) else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(exit)) => {
                warn!(pid, %exit, "daemon process exited");
                children.remove(&pid);
                false
            }
            Err(e) => {
                warn!(pid, error = %e, "failed to poll daemon process");
                false
            }
        }
    }
}
