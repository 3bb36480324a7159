// src/types.rs

use std::path::PathBuf;

use notify::EventKind;
use notify::event::{CreateKind, MetadataKind, ModifyKind, RenameMode};

/// What happened to a path, reduced to the distinctions the loop cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// File contents were written.
    Write,
    /// A file or directory was created.
    Create,
    /// Removals, the source side of a rename, metadata/permission changes,
    /// access, ...
    Other,
}

impl From<&EventKind> for WatchEventKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(CreateKind::Folder | CreateKind::File | CreateKind::Any) => {
                WatchEventKind::Create
            }
            // Something moved into place: editors save atomically this way.
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => WatchEventKind::Create,
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => WatchEventKind::Write,
            // The polling backend reports content changes as mtime bumps.
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)) => {
                WatchEventKind::Write
            }
            _ => WatchEventKind::Other,
        }
    }
}

/// A single filesystem change notification for one path.
///
/// Ephemeral: built from a backend event and consumed immediately by the
/// filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: WatchEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Split a backend event (which may carry several paths) into one
    /// `WatchEvent` per path.
    ///
    /// A paired rename lists `[from, to]`; only the destination is a creation.
    pub fn from_notify(event: &notify::Event) -> Vec<WatchEvent> {
        if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = event.kind {
            return event
                .paths
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    let kind = if i == 1 {
                        WatchEventKind::Create
                    } else {
                        WatchEventKind::Other
                    };
                    WatchEvent::new(path.clone(), kind)
                })
                .collect();
        }

        let kind = WatchEventKind::from(&event.kind);
        event
            .paths
            .iter()
            .map(|path| WatchEvent::new(path.clone(), kind))
            .collect()
    }
}
