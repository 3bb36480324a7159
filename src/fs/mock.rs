// src/fs/mock.rs

use super::FileSystem;
use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(String),
    Dir(BTreeSet<String>), // child names
}

/// In-memory tree for exercising directory walks without touching disk.
///
/// Parent directories are created implicitly. Directories registered through
/// [`MockFileSystem::deny`] exist but fail `read_dir`, like a directory
/// without read permission. [`MockFileSystem::link`] adds a directory
/// symlink, which is enough to build cycles.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
    denied: Arc<Mutex<HashSet<PathBuf>>>,
    links: Arc<Mutex<BTreeMap<PathBuf, PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref();
        let mut entries = self.entries();
        if let Some(parent) = path.parent() {
            Self::ensure_dir(&mut entries, parent);
            Self::link_child(&mut entries, parent, path);
        }
        entries.insert(path.to_path_buf(), MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.entries();
        Self::ensure_dir(&mut entries, path.as_ref());
    }

    /// Delete `path` and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.entries();
        entries.retain(|entry, _| !entry.starts_with(path));
        let name = path.file_name().and_then(|n| n.to_str());
        if let (Some(parent), Some(name)) = (path.parent(), name) {
            if let Some(MockEntry::Dir(children)) = entries.get_mut(parent) {
                children.remove(name);
            }
        }
    }

    pub fn deny(&self, path: impl AsRef<Path>) {
        self.add_dir(&path);
        self.denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.as_ref().to_path_buf());
    }

    /// Make `link` behave like a symlink to the directory `target`.
    pub fn link(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        let link = link.as_ref();
        {
            let mut entries = self.entries();
            if let Some(parent) = link.parent() {
                Self::ensure_dir(&mut entries, parent);
                Self::link_child(&mut entries, parent, link);
            }
        }
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(link.to_path_buf(), target.as_ref().to_path_buf());
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let links = self.links.lock().unwrap_or_else(PoisonError::into_inner);
        let mut current = path.to_path_buf();
        // Each pass strips at least one link prefix; more passes than links
        // means we are going round in circles.
        for _ in 0..=links.len() {
            let hit = links
                .iter()
                .find_map(|(link, target)| current.strip_prefix(link).ok().map(|rest| target.join(rest)));
            match hit {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_dir(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
        if path.as_os_str().is_empty() || entries.contains_key(path) {
            return;
        }
        entries.insert(path.to_path_buf(), MockEntry::Dir(BTreeSet::new()));
        if let Some(parent) = path.parent() {
            Self::ensure_dir(entries, parent);
            Self::link_child(entries, parent, path);
        }
    }

    fn link_child(entries: &mut BTreeMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
        let name = child.file_name().and_then(|n| n.to_str());
        if let (Some(MockEntry::Dir(children)), Some(name)) = (entries.get_mut(parent), name) {
            children.insert(name.to_string());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let path = self.resolve(path);
        self.entries().contains_key(&path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = self.resolve(path);
        matches!(self.entries().get(&path), Some(MockEntry::Dir(_)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut entries = self.entries();
        if let Some(file) = path
            .ancestors()
            .find(|p| matches!(entries.get(*p), Some(MockEntry::File(_))))
        {
            return Err(anyhow!("Not a directory: {:?}", file));
        }
        Self::ensure_dir(&mut entries, path);
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        match self.entries().get(path) {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let denied = self
            .denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path);
        if denied {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        let resolved = self.resolve(path);
        match self.entries().get(&resolved) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let resolved = self.resolve(path);
        if self.entries().contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(anyhow!("File not found: {:?}", path))
        }
    }
}
