// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{Config, RawConfigFile, RawDevSection};
use crate::errors::{DevloopError, Result};

impl TryFrom<RawConfigFile> for Config {
    type Error = DevloopError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let config = merge_onto_defaults(raw.dev);
        validate_config(&config)?;
        Ok(config)
    }
}

/// Overlay the non-empty values of `dev` on top of [`Config::default`].
fn merge_onto_defaults(dev: RawDevSection) -> Config {
    let mut cfg = Config::default();

    if let Some(root) = non_empty(dev.root) {
        cfg.root = PathBuf::from(root);
    }
    if let Some(tmp_dir) = non_empty(dev.tmp_dir) {
        cfg.tmp_dir = PathBuf::from(tmp_dir);
    }
    if let Some(bin) = non_empty(dev.bin) {
        cfg.bin = bin;
    }
    if let Some(build_cmd) = non_empty(dev.build_cmd) {
        cfg.build_cmd = build_cmd;
    }
    if let Some(dirs) = non_empty_list(dev.watch_dirs) {
        cfg.watch_dirs = dirs.into_iter().map(PathBuf::from).collect();
    }
    if let Some(exclude) = non_empty_list(dev.exclude) {
        cfg.exclude = exclude;
    }
    if let Some(extensions) = non_empty_list(dev.extensions) {
        cfg.extensions = extensions;
    }
    cfg.extensions = cfg
        .extensions
        .iter()
        .map(|ext| normalize_extension(ext))
        .filter(|ext| ext.len() > 1)
        .collect();

    if let Some(ms) = dev.debounce_ms {
        cfg.debounce = Duration::from_millis(ms);
    }
    if let Some(ms) = dev.grace_period_ms {
        cfg.grace_period = Duration::from_millis(ms);
    }
    cfg.poll_interval = dev.poll_interval_ms.map(Duration::from_millis);

    cfg
}

/// Check the invariants of an already merged [`Config`].
pub fn validate_config(cfg: &Config) -> Result<()> {
    if cfg.build_cmd.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "[dev].build_cmd must not be empty".to_string(),
        ));
    }
    if cfg.bin.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "[dev].bin must not be empty".to_string(),
        ));
    }
    if cfg.watch_dirs.is_empty() {
        return Err(DevloopError::ConfigError(
            "[dev].watch_dirs must list at least one directory".to_string(),
        ));
    }
    if cfg.extensions.is_empty() {
        return Err(DevloopError::ConfigError(
            "[dev].extensions must list at least one extension".to_string(),
        ));
    }
    if cfg.grace_period.is_zero() {
        return Err(DevloopError::ConfigError(
            "[dev].grace_period_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.poll_interval.is_some_and(|d| d.is_zero()) {
        return Err(DevloopError::ConfigError(
            "[dev].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// `"go"` and `".go"` both become `".go"`.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_list(value: Option<Vec<String>>) -> Option<Vec<String>> {
    value.filter(|v| !v.is_empty())
}
