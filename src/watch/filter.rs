// src/watch/filter.rs

//! Decides whether a single change notification should lead to a rebuild.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::types::{WatchEvent, WatchEventKind};
use crate::watch::path_utils::{canonical_or_self, has_excluded_segment, relative_str};

/// Files whose stem ends with this suffix are specs/tests. They are run by a
/// separate command and never trigger a rebuild.
pub const SPEC_FILE_SUFFIX: &str = "_spec";

/// Predicate over [`WatchEvent`]s, precomputed from a [`Config`].
///
/// Exclusion is tested against the path *relative to the watch directory that
/// contains it*, so a checkout living under e.g. `/home/me/tests/app` is not
/// swallowed by a `tests` exclusion.
#[derive(Debug, Clone)]
pub struct EventFilter {
    roots: Vec<PathBuf>,
    exclude: Vec<String>,
    extensions: Vec<String>,
}

impl EventFilter {
    pub fn new(config: &Config) -> Self {
        let mut roots: Vec<PathBuf> = config
            .watch_dirs()
            .iter()
            .map(|dir| canonical_or_self(dir))
            .collect();
        // Longest first, so nested watch dirs resolve to the innermost root.
        roots.sort_by_key(|root| std::cmp::Reverse(root.components().count()));

        Self {
            roots,
            exclude: config.exclude().to_vec(),
            extensions: config.extensions().to_vec(),
        }
    }

    pub fn should_handle(&self, event: &WatchEvent) -> bool {
        if !matches!(event.kind, WatchEventKind::Write | WatchEventKind::Create) {
            return false;
        }
        if self.is_excluded(&event.path) {
            return false;
        }
        if is_spec_file(&event.path) {
            return false;
        }
        self.has_allowed_extension(&event.path)
    }

    /// True when any segment of `path` (below its watch root) is excluded.
    pub fn is_excluded(&self, path: &Path) -> bool {
        has_excluded_segment(&self.relative(path), &self.exclude)
    }

    fn has_allowed_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| allowed.strip_prefix('.') == Some(ext))
    }

    fn relative(&self, path: &Path) -> String {
        if let Some(rel) = self.relative_to_roots(path) {
            return rel;
        }
        // Roots are canonical; event paths may not be (macOS reports
        // /private/var/... for /var/...).
        if let Ok(canonical) = path.canonicalize() {
            if let Some(rel) = self.relative_to_roots(&canonical) {
                return rel;
            }
        }
        path.to_string_lossy().replace('\\', "/")
    }

    fn relative_to_roots(&self, path: &Path) -> Option<String> {
        self.roots.iter().find_map(|root| relative_str(root, path))
    }
}

/// Convenience form of [`EventFilter::should_handle`] for one-off checks.
pub fn should_handle(event: &WatchEvent, config: &Config) -> bool {
    EventFilter::new(config).should_handle(event)
}

fn is_spec_file(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with(SPEC_FILE_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RawConfigFile, RawDevSection};

    fn config_for(root: &str) -> Config {
        Config::try_from(RawConfigFile {
            dev: RawDevSection {
                watch_dirs: Some(vec![root.to_string()]),
                exclude: Some(vec![".devloop".into(), "vendor".into(), "tests".into()]),
                extensions: Some(vec![".go".into(), "tmpl".into()]),
                ..Default::default()
            },
        })
        .unwrap()
    }

    fn write(path: &str) -> WatchEvent {
        WatchEvent::new(path, WatchEventKind::Write)
    }

    #[test]
    fn accepts_writes_and_creates_of_allowed_extensions() {
        let filter = EventFilter::new(&config_for("/nonexistent/proj"));
        assert!(filter.should_handle(&write("/nonexistent/proj/cmd/main.go")));
        assert!(filter.should_handle(&WatchEvent::new(
            "/nonexistent/proj/views/index.tmpl",
            WatchEventKind::Create
        )));
    }

    #[test]
    fn rejects_other_kinds() {
        let filter = EventFilter::new(&config_for("/nonexistent/proj"));
        let event = WatchEvent::new("/nonexistent/proj/main.go", WatchEventKind::Other);
        assert!(!filter.should_handle(&event));
    }

    #[test]
    fn rejects_excluded_segments() {
        let filter = EventFilter::new(&config_for("/nonexistent/proj"));
        assert!(!filter.should_handle(&write("/nonexistent/proj/vendor/x/y.go")));
        assert!(!filter.should_handle(&write("/nonexistent/proj/.devloop/tmp/gen.go")));
    }

    #[test]
    fn exclusion_ignores_segments_above_the_watch_root() {
        let filter = EventFilter::new(&config_for("/nonexistent/tests/proj"));
        assert!(filter.should_handle(&write("/nonexistent/tests/proj/main.go")));
        assert!(!filter.should_handle(&write("/nonexistent/tests/proj/tests/main.go")));
    }

    #[test]
    fn rejects_unlisted_extensions_and_spec_files() {
        let filter = EventFilter::new(&config_for("/nonexistent/proj"));
        assert!(!filter.should_handle(&write("/nonexistent/proj/README.md")));
        assert!(!filter.should_handle(&write("/nonexistent/proj/Makefile")));
        assert!(!filter.should_handle(&write("/nonexistent/proj/user_spec.go")));
        assert!(filter.should_handle(&write("/nonexistent/proj/spec_helpers.go")));
    }

    #[cfg(unix)]
    #[test]
    fn paths_through_a_symlinked_prefix_resolve_to_their_root() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir_all(real.join("tests")).unwrap();
        std::fs::write(real.join("tests/helper.go"), "").unwrap();
        std::fs::write(real.join("main.go"), "").unwrap();
        let alias = dir.path().join("alias");
        std::os::unix::fs::symlink(&real, &alias).unwrap();

        let filter = EventFilter::new(&config_for(real.to_str().unwrap()));
        assert!(filter.should_handle(&write(alias.join("main.go").to_str().unwrap())));
        assert!(!filter.should_handle(&write(alias.join("tests/helper.go").to_str().unwrap())));
    }

    #[test]
    fn free_function_matches_filter() {
        let cfg = config_for("/nonexistent/proj");
        assert!(should_handle(&write("/nonexistent/proj/a.go"), &cfg));
        assert!(!should_handle(&write("/nonexistent/proj/a.rs"), &cfg));
    }
}
