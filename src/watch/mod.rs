// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Wiring up a filesystem notification backend (`notify`), native or polling.
//! - Subscribing to every relevant directory, since backends are used
//!   non-recursively and new directories must be picked up as they appear.
//! - Deciding which individual events are worth a rebuild.
//!
//! It does **not** debounce or build anything; that is the engine's job.

pub mod backend;
pub mod directory;
pub mod filter;
pub mod path_utils;

pub use backend::{FileSystemWatcher, NotifyWatcher, WatchSinks, WatchStreams, create_backend, watch_channels};
pub use directory::DirectoryWatcher;
pub use filter::{EventFilter, should_handle};
