// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration file as read from TOML.
///
/// Only the `[dev]` table is interpreted; other tables belong to other tools
/// sharing the same file and are ignored.
///
/// ```toml
/// [dev]
/// root        = "."
/// bin         = ".devloop/tmp/app"
/// build_cmd   = "go build -o .devloop/tmp/app ./cmd/api/"
/// watch_dirs  = ["."]
/// exclude     = [".devloop", "vendor", "node_modules", "tests"]
/// extensions  = [".go"]
/// debounce_ms = 300
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub dev: RawDevSection,
}

/// `[dev]` table.
///
/// Every field is optional. A value only replaces the built-in default when it
/// is present *and* non-empty, so a partial table still benefits from the
/// remaining defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDevSection {
    /// Working directory for the build command.
    #[serde(default)]
    pub root: Option<String>,

    /// Directory holding build artifacts; created at startup.
    #[serde(default)]
    pub tmp_dir: Option<String>,

    /// Path to the binary to run, optionally followed by arguments.
    #[serde(default)]
    pub bin: Option<String>,

    /// Shell command that produces `bin`.
    #[serde(default)]
    pub build_cmd: Option<String>,

    #[serde(default)]
    pub watch_dirs: Option<Vec<String>>,

    /// Path segment names that are never watched or acted upon.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    /// File extensions that trigger a rebuild (`".go"` or `"go"`).
    #[serde(default)]
    pub extensions: Option<Vec<String>>,

    /// Debounce window in milliseconds. `0` triggers on every event.
    #[serde(default)]
    pub debounce_ms: Option<u64>,

    /// How long a running app gets to exit after an interrupt before it is
    /// killed.
    #[serde(default)]
    pub grace_period_ms: Option<u64>,

    /// When set, use the polling backend with this interval instead of native
    /// filesystem notifications.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

pub const DEFAULT_ROOT: &str = ".";
pub const DEFAULT_TMP_DIR: &str = ".devloop/tmp";
pub const DEFAULT_BIN: &str = ".devloop/tmp/app";
pub const DEFAULT_BUILD_CMD: &str = "go build -o .devloop/tmp/app ./cmd/api/";
pub const DEFAULT_WATCH_DIRS: &[&str] = &["."];
pub const DEFAULT_EXCLUDE: &[&str] = &[".devloop", "vendor", "node_modules", ".git", "tests"];
pub const DEFAULT_EXTENSIONS: &[&str] = &[".go"];
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Resolved, validated settings for the dev loop.
///
/// Built once (see [`TryFrom<RawConfigFile>`](crate::config::validate)) and
/// never mutated afterwards; components hold it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub(crate) root: PathBuf,
    pub(crate) tmp_dir: PathBuf,
    pub(crate) bin: String,
    pub(crate) build_cmd: String,
    pub(crate) watch_dirs: Vec<PathBuf>,
    pub(crate) exclude: Vec<String>,
    pub(crate) extensions: Vec<String>,
    pub(crate) debounce: Duration,
    pub(crate) grace_period: Duration,
    pub(crate) poll_interval: Option<Duration>,
}

impl Config {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Artifact to run. May carry whitespace-separated arguments.
    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn build_cmd(&self) -> &str {
        &self.build_cmd
    }

    pub fn watch_dirs(&self) -> &[PathBuf] {
        &self.watch_dirs
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Allowed extensions, always with a leading dot.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            tmp_dir: PathBuf::from(DEFAULT_TMP_DIR),
            bin: DEFAULT_BIN.to_string(),
            build_cmd: DEFAULT_BUILD_CMD.to_string(),
            watch_dirs: DEFAULT_WATCH_DIRS.iter().map(PathBuf::from).collect(),
            exclude: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            debounce: DEFAULT_DEBOUNCE,
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: None,
        }
    }
}
