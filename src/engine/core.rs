// src/engine/core.rs

//! One build-then-restart cycle and the status it publishes.
//!
//! The cycle only talks to the [`Builder`] / [`Supervisor`] traits and a
//! [`Reporter`], so its state transitions can be unit tested with fakes:
//!
//! ```text
//! Idle -> Building -> BuildFailed ------------------------> Idle
//!                  -> BuildSucceeded -> Restarting -> Running -> Idle
//! ```
//!
//! The async shell that feeds it tokens lives in [`runtime`](super::runtime).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::exec::{BuildOutcome, Builder, Supervisor};
use crate::report::Reporter;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Building,
    Restarting,
    Stopped,
}

/// How a finished cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Build succeeded and the new generation is running.
    Restarted,
    /// Build failed; the previous generation (if any) was left alone.
    BuildFailed,
    /// Build succeeded but the artifact could not be started.
    StartFailed,
}

/// Snapshot published after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopStatus {
    pub phase: Phase,
    /// Completed cycles, whatever their outcome.
    pub cycles: u64,
    pub last_outcome: Option<CycleOutcome>,
}

/// Runs cycles one at a time against the configured backends.
pub struct RebuildCycle<B, S> {
    builder: Arc<B>,
    supervisor: Arc<S>,
    reporter: Arc<dyn Reporter>,
    artifact: String,
    status: watch::Sender<LoopStatus>,
}

impl<B, S> std::fmt::Debug for RebuildCycle<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildCycle")
            .field("artifact", &self.artifact)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl<B: Builder, S: Supervisor> RebuildCycle<B, S> {
    pub fn new(
        builder: Arc<B>,
        supervisor: Arc<S>,
        reporter: Arc<dyn Reporter>,
        artifact: impl Into<String>,
        status: watch::Sender<LoopStatus>,
    ) -> Self {
        Self {
            builder,
            supervisor,
            reporter,
            artifact: artifact.into(),
            status,
        }
    }

    /// Build, and restart the application if the build succeeded.
    pub async fn run(&self) -> CycleOutcome {
        self.set_phase(Phase::Building);
        self.reporter.build_started();

        let started = Instant::now();
        let build = self.builder.build().await;
        let elapsed = started.elapsed();
        debug!(?build, elapsed_ms = elapsed.as_millis() as u64, "build finished");

        let outcome = match build {
            BuildOutcome::Failed { code } => {
                info!(?code, "build failed; keeping the current process");
                self.reporter.build_failed(code);
                CycleOutcome::BuildFailed
            }
            BuildOutcome::Success => {
                self.set_phase(Phase::Restarting);
                match self.supervisor.restart(&self.artifact).await {
                    Ok(()) => {
                        info!(artifact = %self.artifact, "application restarted");
                        self.reporter.restarted(elapsed);
                        CycleOutcome::Restarted
                    }
                    Err(err) => {
                        warn!(artifact = %self.artifact, error = %err, "failed to start application");
                        self.reporter.start_failed(&err);
                        CycleOutcome::StartFailed
                    }
                }
            }
        };

        self.status.send_modify(|status| {
            status.phase = Phase::Idle;
            status.cycles += 1;
            status.last_outcome = Some(outcome);
        });
        outcome
    }

    fn set_phase(&self, phase: Phase) {
        self.status.send_modify(|status| status.phase = phase);
    }
}
