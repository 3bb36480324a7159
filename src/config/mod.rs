// src/config/mod.rs

//! Configuration loading and validation for devloop.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and the resolved [`Config`] (`model.rs`).
//! - Load a config file from disk, tolerating its absence (`loader.rs`).
//! - Merge user values onto defaults and validate them (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_fs, load_from_path};
pub use model::{Config, RawConfigFile, RawDevSection};
pub use validate::{normalize_extension, validate_config};
