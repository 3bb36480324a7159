// src/watch/directory.rs

//! Recursive directory subscriptions on top of a non-recursive backend.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::report::Reporter;
use crate::watch::backend::FileSystemWatcher;
use crate::watch::filter::EventFilter;

/// Keeps one subscription per non-excluded directory below the watch roots.
///
/// The walk prunes excluded directories, so their subtrees are never visited.
/// Directories that cannot be listed or subscribed are reported and skipped.
///
/// Every walked directory is subscribed again, even when already known: a
/// directory deleted and recreated under the same path needs a fresh
/// subscription, and backends treat repeats as a no-op.
pub struct DirectoryWatcher {
    backend: Box<dyn FileSystemWatcher>,
    fs: Arc<dyn FileSystem>,
    filter: EventFilter,
    reporter: Arc<dyn Reporter>,
    watched: HashSet<PathBuf>,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("watched", &self.watched.len())
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    pub fn new(
        backend: Box<dyn FileSystemWatcher>,
        fs: Arc<dyn FileSystem>,
        filter: EventFilter,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            backend,
            fs,
            filter,
            reporter,
            watched: HashSet::new(),
        }
    }

    /// Subscribe to `dir` and every non-excluded directory beneath it.
    ///
    /// Returns how many directories became newly watched. Directories that
    /// are already watched are walked and resubscribed but not counted.
    pub fn add_recursive(&mut self, dir: &Path) -> usize {
        if !self.fs.is_dir(dir) {
            self.report(dir, "not a directory");
            return 0;
        }

        let mut added = 0;
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut stack = vec![dir.to_path_buf()];

        while let Some(current) = stack.pop() {
            if self.filter.is_excluded(&current) {
                debug!(path = ?current, "pruning excluded directory");
                continue;
            }

            // Symlinked directories can form cycles.
            let key = self
                .fs
                .canonicalize(&current)
                .unwrap_or_else(|_| current.clone());
            if !visited.insert(key) {
                continue;
            }

            match self.backend.subscribe(&current) {
                Ok(()) => {
                    if self.watched.insert(current.clone()) {
                        debug!(path = ?current, "watching directory");
                        added += 1;
                    }
                }
                Err(err) => {
                    self.watched.remove(&current);
                    self.report(&current, &err.to_string());
                    continue;
                }
            }

            match self.fs.read_dir(&current) {
                Ok(entries) => {
                    // Reverse so the stack pops entries in listing order.
                    for entry in entries.into_iter().rev() {
                        if self.fs.is_dir(&entry) {
                            stack.push(entry);
                        }
                    }
                }
                Err(err) => {
                    debug!(path = ?current, error = %err, "cannot list directory; skipping children");
                }
            }
        }

        added
    }

    /// Drop `dir` and everything below it once it is gone from disk.
    ///
    /// Returns how many entries were dropped; nothing happens while `dir`
    /// still exists.
    pub fn forget_removed(&mut self, dir: &Path) -> usize {
        if !self.watched.contains(dir) || self.fs.is_dir(dir) {
            return 0;
        }
        let before = self.watched.len();
        self.watched.retain(|watched| !watched.starts_with(dir));
        let dropped = before - self.watched.len();
        debug!(path = ?dir, dropped, "watched directory removed");
        dropped
    }

    pub fn is_watched(&self, dir: &Path) -> bool {
        self.watched.contains(dir)
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }

    fn report(&self, dir: &Path, reason: &str) {
        warn!(path = ?dir, %reason, "cannot watch directory");
        self.reporter
            .warning(&format!("Cannot watch {}: {reason}", dir.display()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::{Config, RawConfigFile, RawDevSection};
    use crate::errors::{DevloopError, Result};
    use crate::fs::mock::MockFileSystem;
    use crate::report::LineKind;

    #[derive(Default, Clone)]
    struct RecordingWatcher {
        subscribed: Arc<Mutex<Vec<PathBuf>>>,
        refuse: Option<PathBuf>,
    }

    impl FileSystemWatcher for RecordingWatcher {
        fn subscribe(&mut self, dir: &Path) -> Result<()> {
            if self.refuse.as_deref() == Some(dir) {
                return Err(DevloopError::ConfigError("refused".into()));
            }
            self.subscribed.lock().unwrap().push(dir.to_path_buf());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Warnings(Mutex<Vec<String>>);

    impl Reporter for Warnings {
        fn banner(&self, _: &Config) {}
        fn build_started(&self) {}
        fn build_line(&self, _: LineKind, _: &str) {}
        fn build_failed(&self, _: Option<i32>) {}
        fn restarted(&self, _: std::time::Duration) {}
        fn start_failed(&self, _: &DevloopError) {}
        fn warning(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
        fn stopping(&self) {}
        fn stopped(&self) {}
    }

    fn project() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/main.go", "");
        fs.add_file("/proj/cmd/api/main.go", "");
        fs.add_file("/proj/internal/store/db.go", "");
        fs.add_file("/proj/vendor/lib/lib.go", "");
        fs.add_file("/proj/.devloop/tmp/app", "");
        fs
    }

    fn filter() -> EventFilter {
        let config = Config::try_from(RawConfigFile {
            dev: RawDevSection {
                watch_dirs: Some(vec!["/proj".into()]),
                ..Default::default()
            },
        })
        .unwrap();
        EventFilter::new(&config)
    }

    fn watcher_for(
        fs: MockFileSystem,
        backend: RecordingWatcher,
    ) -> (DirectoryWatcher, Arc<Warnings>) {
        let warnings = Arc::new(Warnings::default());
        let watcher = DirectoryWatcher::new(
            Box::new(backend),
            Arc::new(fs),
            filter(),
            warnings.clone(),
        );
        (watcher, warnings)
    }

    #[test]
    fn subscribes_every_directory_except_excluded_subtrees() {
        let backend = RecordingWatcher::default();
        let (mut watcher, _) = watcher_for(project(), backend.clone());

        assert_eq!(watcher.add_recursive(Path::new("/proj")), 5);

        let subscribed = backend.subscribed.lock().unwrap().clone();
        assert_eq!(
            subscribed,
            vec![
                PathBuf::from("/proj"),
                PathBuf::from("/proj/cmd"),
                PathBuf::from("/proj/cmd/api"),
                PathBuf::from("/proj/internal"),
                PathBuf::from("/proj/internal/store"),
            ]
        );
        assert!(!watcher.is_watched(Path::new("/proj/vendor")));
        assert!(!watcher.is_watched(Path::new("/proj/.devloop/tmp")));
    }

    #[test]
    fn rewalking_only_adds_new_directories() {
        let fs = project();
        let (mut watcher, _) = watcher_for(fs.clone(), RecordingWatcher::default());
        watcher.add_recursive(Path::new("/proj"));

        fs.add_dir("/proj/internal/cache");
        assert_eq!(watcher.add_recursive(Path::new("/proj/internal")), 1);
        assert_eq!(watcher.watched_count(), 6);
        assert_eq!(watcher.add_recursive(Path::new("/proj")), 0);
    }

    #[test]
    fn recreated_directory_is_subscribed_again() {
        let fs = project();
        let backend = RecordingWatcher::default();
        let (mut watcher, _) = watcher_for(fs.clone(), backend.clone());
        watcher.add_recursive(Path::new("/proj"));

        fs.remove("/proj/internal");
        assert_eq!(watcher.forget_removed(Path::new("/proj/internal")), 2);
        assert!(!watcher.is_watched(Path::new("/proj/internal/store")));
        assert_eq!(watcher.watched_count(), 3);

        fs.add_dir("/proj/internal");
        assert_eq!(watcher.add_recursive(Path::new("/proj/internal")), 1);

        let subscribed = backend.subscribed.lock().unwrap().clone();
        let internal = subscribed
            .iter()
            .filter(|d| d.as_path() == Path::new("/proj/internal"))
            .count();
        assert_eq!(internal, 2);
    }

    #[test]
    fn existing_directories_are_not_forgotten() {
        let (mut watcher, _) = watcher_for(project(), RecordingWatcher::default());
        watcher.add_recursive(Path::new("/proj"));
        assert_eq!(watcher.forget_removed(Path::new("/proj/cmd")), 0);
        assert_eq!(watcher.forget_removed(Path::new("/proj/unknown")), 0);
        assert_eq!(watcher.watched_count(), 5);
    }

    #[test]
    fn excluded_start_directory_is_ignored() {
        let (mut watcher, _) = watcher_for(project(), RecordingWatcher::default());
        assert_eq!(watcher.add_recursive(Path::new("/proj/vendor/lib")), 0);
        assert_eq!(watcher.watched_count(), 0);
    }

    #[test]
    fn subscription_failures_are_reported_and_skip_the_subtree() {
        let backend = RecordingWatcher {
            refuse: Some(PathBuf::from("/proj/internal")),
            ..Default::default()
        };
        let (mut watcher, warnings) = watcher_for(project(), backend);

        assert_eq!(watcher.add_recursive(Path::new("/proj")), 3);
        assert!(!watcher.is_watched(Path::new("/proj/internal/store")));

        let warnings = warnings.0.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("/proj/internal"));
    }

    #[test]
    fn unreadable_directories_are_watched_but_not_descended() {
        let fs = project();
        fs.deny("/proj/locked");
        fs.add_dir("/proj/locked/inner");
        let (mut watcher, _) = watcher_for(fs, RecordingWatcher::default());

        watcher.add_recursive(Path::new("/proj"));
        assert!(watcher.is_watched(Path::new("/proj/locked")));
        assert!(!watcher.is_watched(Path::new("/proj/locked/inner")));
    }

    #[test]
    fn symlink_cycles_terminate() {
        let fs = project();
        fs.link("/proj/internal/loop", "/proj");
        let (mut watcher, _) = watcher_for(fs, RecordingWatcher::default());

        assert_eq!(watcher.add_recursive(Path::new("/proj")), 5);
    }

    #[test]
    fn missing_directory_is_reported() {
        let (mut watcher, warnings) = watcher_for(project(), RecordingWatcher::default());
        assert_eq!(watcher.add_recursive(Path::new("/elsewhere")), 0);
        assert_eq!(warnings.0.lock().unwrap().len(), 1);
    }
}
