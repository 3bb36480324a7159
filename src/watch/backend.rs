// src/watch/backend.rs

//! Filesystem notification backends.
//!
//! A [`FileSystemWatcher`] only knows how to subscribe to single directories.
//! Events and errors are delivered on the two channels of [`WatchStreams`];
//! recursion and filtering live one level up in
//! [`DirectoryWatcher`](crate::watch::directory::DirectoryWatcher).

use std::path::Path;

use notify::{Event, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, trace};

use crate::config::Config;
use crate::errors::Result;

/// Subscribes to change notifications for individual directories.
pub trait FileSystemWatcher: Send {
    /// Watch `dir` itself (not its subdirectories).
    fn subscribe(&mut self, dir: &Path) -> Result<()>;
}

/// Receiving ends of a backend.
#[derive(Debug)]
pub struct WatchStreams {
    pub events: mpsc::UnboundedReceiver<Event>,
    pub errors: mpsc::UnboundedReceiver<notify::Error>,
}

/// Sending ends matching a [`WatchStreams`]; handed to the backend callback.
#[derive(Debug, Clone)]
pub struct WatchSinks {
    pub events: mpsc::UnboundedSender<Event>,
    pub errors: mpsc::UnboundedSender<notify::Error>,
}

/// Create a connected sink/stream pair.
pub fn watch_channels() -> (WatchSinks, WatchStreams) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (error_tx, error_rx) = mpsc::unbounded_channel();
    (
        WatchSinks {
            events: event_tx,
            errors: error_tx,
        },
        WatchStreams {
            events: event_rx,
            errors: error_rx,
        },
    )
}

/// Any `notify` watcher used in non-recursive mode.
pub struct NotifyWatcher<W: Watcher> {
    inner: W,
}

impl<W: Watcher> std::fmt::Debug for NotifyWatcher<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher").finish_non_exhaustive()
    }
}

impl<W: Watcher + Send> FileSystemWatcher for NotifyWatcher<W> {
    fn subscribe(&mut self, dir: &Path) -> Result<()> {
        self.inner.watch(dir, RecursiveMode::NonRecursive)?;
        Ok(())
    }
}

/// Closure called synchronously by notify whenever something arrives.
fn forwarder(sinks: WatchSinks) -> impl FnMut(notify::Result<Event>) + Send + 'static {
    move |res| match res {
        Ok(event) => {
            // The receiver is gone once the loop has shut down.
            if sinks.events.send(event).is_err() {
                trace!("dropping notify event after shutdown");
            }
        }
        Err(err) => {
            let _ = sinks.errors.send(err);
        }
    }
}

impl NotifyWatcher<RecommendedWatcher> {
    /// Native backend for the platform (inotify, FSEvents, kqueue, ...).
    pub fn native(sinks: WatchSinks) -> Result<Self> {
        let inner = RecommendedWatcher::new(forwarder(sinks), notify::Config::default())?;
        Ok(Self { inner })
    }
}

impl NotifyWatcher<PollWatcher> {
    /// Portable fallback that rescans subscribed directories periodically.
    pub fn polling(sinks: WatchSinks, interval: std::time::Duration) -> Result<Self> {
        let config = notify::Config::default()
            .with_poll_interval(interval)
            .with_compare_contents(true);
        let inner = PollWatcher::new(forwarder(sinks), config)?;
        Ok(Self { inner })
    }
}

/// Pick the backend the config asks for and wire it to fresh channels.
pub fn create_backend(config: &Config) -> Result<(Box<dyn FileSystemWatcher>, WatchStreams)> {
    let (sinks, streams) = watch_channels();
    let backend: Box<dyn FileSystemWatcher> = match config.poll_interval() {
        Some(interval) => {
            info!(interval_ms = interval.as_millis() as u64, "using polling file watcher");
            Box::new(NotifyWatcher::polling(sinks, interval)?)
        }
        None => Box::new(NotifyWatcher::native(sinks)?),
    };
    Ok((backend, streams))
}
