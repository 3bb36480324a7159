#![allow(dead_code)]

use std::path::Path;

use devloop::config::{Config, RawConfigFile, RawDevSection};

/// Builder for `Config` to simplify test setup.
///
/// Starts from an empty `[dev]` table, so anything not set falls back to the
/// built-in defaults exactly as a partial `Devloop.toml` would.
pub struct ConfigBuilder {
    dev: RawDevSection,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            dev: RawDevSection::default(),
        }
    }

    /// Root, tmp dir and a single watch dir all under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new()
            .root(dir)
            .tmp_dir(&dir.join(".devloop/tmp"))
            .watch_dir(dir)
    }

    pub fn root(mut self, dir: &Path) -> Self {
        self.dev.root = Some(dir.display().to_string());
        self
    }

    pub fn tmp_dir(mut self, dir: &Path) -> Self {
        self.dev.tmp_dir = Some(dir.display().to_string());
        self
    }

    pub fn watch_dir(mut self, dir: &Path) -> Self {
        self.dev
            .watch_dirs
            .get_or_insert_with(Vec::new)
            .push(dir.display().to_string());
        self
    }

    pub fn exclude(mut self, names: &[&str]) -> Self {
        self.dev.exclude = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.dev.extensions = Some(exts.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build_cmd(mut self, cmd: &str) -> Self {
        self.dev.build_cmd = Some(cmd.to_string());
        self
    }

    pub fn bin(mut self, bin: &str) -> Self {
        self.dev.bin = Some(bin.to_string());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.dev.debounce_ms = Some(ms);
        self
    }

    pub fn grace_period_ms(mut self, ms: u64) -> Self {
        self.dev.grace_period_ms = Some(ms);
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.dev.poll_interval_ms = Some(ms);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        RawConfigFile { dev: self.dev }
    }

    pub fn build(self) -> Config {
        Config::try_from(self.raw()).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
