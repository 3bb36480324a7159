// src/engine/mod.rs

//! Orchestration engine for devloop.
//!
//! This module ties together:
//! - the rebuild queue (at most one rebuild pending at any time)
//! - the debouncer that turns bursts of changes into one rebuild request
//! - the main runtime event loop that reacts to:
//!   - filesystem notifications
//!   - notification-stream errors
//!   - shutdown signals
//!
//! A single build-then-restart cycle lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

pub mod core;
pub mod debounce;
pub mod queue;
pub mod runtime;

pub use core::{CycleOutcome, LoopStatus, Phase, RebuildCycle};
pub use debounce::Debouncer;
pub use queue::{RebuildQueue, RebuildTrigger};
pub use runtime::{Orchestrator, ensure_not_nested, wait_for_shutdown};
