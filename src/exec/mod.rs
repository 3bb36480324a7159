// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] defines the `Builder` / `Supervisor` traits the engine talks
//!   to, so tests can replace real processes with fakes.
//! - [`builder`] runs the build command and classifies its output.
//! - [`supervisor`] owns the single application process and its reaper.
//! - [`terminate`] holds the platform-specific graceful interrupt.

pub mod backend;
pub mod builder;
pub mod supervisor;
pub mod terminate;

pub use backend::{BoxFuture, BuildOutcome, Builder, Supervisor};
pub use builder::{CommandBuilder, classify_line};
pub use supervisor::{ProcessSupervisor, SupervisedProcess};
pub use terminate::TerminationRequest;

/// Set in the environment of every process devloop starts. Its presence at
/// startup means devloop is being run from inside another devloop.
pub const ACTIVE_ENV_VAR: &str = "DEVLOOP_ACTIVE";
