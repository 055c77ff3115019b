//! Daemon event loop.
//!
//! Maps wall-clock time onto the context's virtual clock: the loop sleeps
//! until the next armed timer, then dispatches everything that fell due.

use crate::context::WldContext;
use crate::error::{WldError, WldResult};
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Upper bound on one sleep when no timer is armed.
const IDLE_WAKEUP: Duration = Duration::from_secs(1);

pub struct WldDaemon {
    ctx: WldContext,
    started: Instant,
    /// Virtual time at loop start; wall-clock elapsed time is added to it.
    base: Duration,
    running: bool,
}

impl WldDaemon {
    pub fn new(ctx: WldContext) -> Self {
        let base = ctx.now();
        Self {
            ctx,
            started: Instant::now(),
            base,
            running: false,
        }
    }

    pub fn context(&self) -> &WldContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut WldContext {
        &mut self.ctx
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Virtual time corresponding to the current wall clock.
    fn wall_now(&self) -> Duration {
        self.base + self.started.elapsed()
    }

    fn wakeup_at(&self) -> Instant {
        let now = self.wall_now();
        let wait = match self.ctx.next_deadline() {
            Some(deadline) => deadline.saturating_sub(now).min(IDLE_WAKEUP),
            None => IDLE_WAKEUP,
        };
        Instant::now() + wait
    }

    /// Dispatches every timer due by the current wall clock.
    pub fn tick(&mut self) {
        let now = self.wall_now();
        self.ctx.run_until(now);
    }

    /// Runs until SIGINT or SIGTERM, then tears the context down.
    pub async fn run(&mut self) -> WldResult<()> {
        let mut sigterm = signal(SignalKind::terminate())?;
        self.running = true;
        self.base = self.ctx.now();
        self.started = Instant::now();
        info!(timers = self.ctx.pending_timers(), "wld event loop started");

        while self.running {
            // due work first: bootstrap may have armed zero-delay timers
            self.tick();
            let wakeup = self.wakeup_at();
            tokio::select! {
                _ = sleep_until(wakeup) => {}
                res = tokio::signal::ctrl_c() => {
                    res.map_err(WldError::from)?;
                    info!("received SIGINT, shutting down");
                    self.stop();
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, shutting down");
                    self.stop();
                }
            }
        }

        self.ctx.shutdown();
        info!("wld event loop stopped");
        Ok(())
    }

    pub fn stop(&mut self) {
        debug!("stop requested");
        self.running = false;
    }

    pub fn into_context(self) -> WldContext {
        self.ctx
    }
}
