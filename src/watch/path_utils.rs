// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Purely lexical; returns `None` if `path` is not below `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root).ok().map(to_slash)
}

/// Canonical form of `path` when it exists, otherwise the path unchanged.
pub fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// True when any `/`-separated segment of `rel` equals one of `names`.
pub fn has_excluded_segment(rel: &str, names: &[String]) -> bool {
    rel.split('/')
        .filter(|segment| !segment.is_empty())
        .any(|segment| names.iter().any(|name| name == segment))
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
