// src/exec/supervisor.rs

//! Lifecycle of the single supervised application process.
//!
//! The supervisor owns at most one child at a time. Every child gets a
//! dedicated reaper task that is the only place calling `wait()`; it flips a
//! `watch` flag exactly once when the process is gone. Stopping a child is
//! two-phase: interrupt, wait up to the grace period for the flag, then kill
//! and wait for the flag unconditionally. The next generation is only spawned
//! after the previous one has been reaped.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{Mutex, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::model::DEFAULT_GRACE_PERIOD;
use crate::errors::{DevloopError, Result};
use crate::exec::backend::{BoxFuture, Supervisor};
use crate::exec::terminate::{TerminationRequest, interrupt};
use crate::exec::ACTIVE_ENV_VAR;

/// Handle to one running generation of the application.
#[derive(Debug)]
pub struct SupervisedProcess {
    pid: Option<u32>,
    program: String,
    exited: watch::Receiver<bool>,
    /// Dropping this sender also makes the reaper kill the child, so a lost
    /// handle can never leave an orphan behind.
    kill_tx: Option<oneshot::Sender<()>>,
}

impl SupervisedProcess {
    /// Start `artifact` (program followed by optional whitespace-separated
    /// arguments) with inherited stdio, and hand the child to a reaper task.
    pub fn spawn(artifact: &str) -> Result<Self> {
        let mut parts = artifact.split_whitespace();
        let program = parts.next().ok_or(DevloopError::EmptyCommand)?;

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .env(ACTIVE_ENV_VAR, "1")
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| DevloopError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let pid = child.id();

        let (exited_tx, exited_rx) = watch::channel(false);
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(reap(child, pid, kill_rx, exited_tx));

        Ok(Self {
            pid,
            program: program.to_string(),
            exited: exited_rx,
            kill_tx: Some(kill_tx),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// True once the reaper has collected the process.
    pub fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Resolve once the reaper has collected the process.
    pub async fn wait_exit(&mut self) {
        // An error means the reaper is gone, which also implies the child is.
        let _ = self.exited.wait_for(|exited| *exited).await;
    }

    /// Interrupt, wait up to `grace`, then kill. Returns once reaped.
    pub async fn shutdown(&mut self, grace: Duration) {
        if self.has_exited() {
            debug!(pid = ?self.pid, "process already exited");
            return;
        }

        if !self.request() {
            self.force();
            self.wait_exit().await;
            return;
        }

        match timeout(grace, self.wait_exit()).await {
            Ok(()) => debug!(pid = ?self.pid, "process exited after interrupt"),
            Err(_) => {
                warn!(
                    pid = ?self.pid,
                    grace_ms = grace.as_millis() as u64,
                    "process ignored interrupt; killing"
                );
                self.force();
                self.wait_exit().await;
            }
        }
    }
}

impl TerminationRequest for SupervisedProcess {
    fn request(&self) -> bool {
        match self.pid {
            Some(pid) if !self.has_exited() => interrupt(pid),
            _ => false,
        }
    }

    fn force(&mut self) {
        if let Some(kill_tx) = self.kill_tx.take() {
            if kill_tx.send(()).is_err() {
                debug!(pid = ?self.pid, "reaper already finished while killing");
            }
        }
    }
}

/// Sole owner of the child: waits for it exactly once, killing it first if
/// asked to (or if the handle was dropped).
async fn reap(
    mut child: Child,
    pid: Option<u32>,
    kill_rx: oneshot::Receiver<()>,
    exited_tx: watch::Sender<bool>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx => {
            if let Err(e) = child.start_kill() {
                debug!(?pid, error = %e, "kill failed; process probably exited");
            }
            child.wait().await
        }
    };

    match status {
        Ok(status) => info!(?pid, exit_code = ?status.code(), "application exited"),
        Err(e) => warn!(?pid, error = %e, "failed to wait for application"),
    }

    exited_tx.send_replace(true);
}

/// Production [`Supervisor`]: one child slot behind an async lock, so
/// `restart` and `stop` never interleave.
#[derive(Debug)]
pub struct ProcessSupervisor {
    current: Mutex<Option<SupervisedProcess>>,
    grace: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl ProcessSupervisor {
    pub fn new(grace: Duration) -> Self {
        Self {
            current: Mutex::new(None),
            grace,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace
    }

    /// Pid of the current generation, if one is alive.
    pub async fn current_pid(&self) -> Option<u32> {
        let current = self.current.lock().await;
        current
            .as_ref()
            .filter(|process| !process.has_exited())
            .and_then(SupervisedProcess::pid)
    }

    pub async fn restart_process(&self, artifact: &str) -> Result<()> {
        let mut current = self.current.lock().await;

        // Keep the old handle in the slot until it is reaped: if this future
        // is dropped midway, `stop` still finds and finishes it.
        if let Some(process) = current.as_mut() {
            info!(pid = ?process.pid(), "stopping previous application");
            process.shutdown(self.grace).await;
        }
        *current = None;

        let process = SupervisedProcess::spawn(artifact)?;
        info!(pid = ?process.pid(), program = %process.program(), "application started");
        *current = Some(process);
        Ok(())
    }

    pub async fn stop_process(&self) {
        let mut current = self.current.lock().await;
        if let Some(process) = current.as_mut() {
            info!(pid = ?process.pid(), "stopping application");
            process.shutdown(self.grace).await;
        }
        *current = None;
    }
}

impl Supervisor for ProcessSupervisor {
    fn restart<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.restart_process(artifact))
    }

    fn stop(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.stop_process())
    }
}
