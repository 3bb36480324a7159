// src/exec/backend.rs

//! Pluggable build and supervision backends.
//!
//! The engine talks to a [`Builder`] and a [`Supervisor`] instead of spawning
//! processes itself. Production code uses [`CommandBuilder`] and
//! [`ProcessSupervisor`]; tests swap in fakes that script build outcomes and
//! record restarts without touching the OS.
//!
//! [`CommandBuilder`]: crate::exec::builder::CommandBuilder
//! [`ProcessSupervisor`]: crate::exec::supervisor::ProcessSupervisor

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;

/// Boxed future returned by backend trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of one invocation of the build command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    /// Non-zero exit, death by signal (`code == None`), or failure to spawn.
    Failed { code: Option<i32> },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Success)
    }
}

/// Runs the configured build.
///
/// A failing build is an ordinary outcome, never an error: the loop keeps
/// watching either way.
pub trait Builder: Send + Sync {
    fn build(&self) -> BoxFuture<'_, BuildOutcome>;
}

/// Owns the single supervised application process.
pub trait Supervisor: Send + Sync {
    /// Stop the current process (if any) and start `artifact`.
    ///
    /// Fails only when the new process cannot be started.
    fn restart<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Stop the current process, if any. Never fails.
    fn stop(&self) -> BoxFuture<'_, ()>;
}
