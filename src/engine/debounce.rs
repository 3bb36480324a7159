// src/engine/debounce.rs

//! Resettable single-shot timer in front of the rebuild queue.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

use super::queue::RebuildTrigger;

/// Collapses a burst of qualifying events into one rebuild request.
///
/// Each [`notify`](Debouncer::notify) aborts the pending timer and arms a new
/// one, so the request fires `window` after the *last* event of a burst. A
/// zero window requests immediately.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    trigger: RebuildTrigger,
}

impl Debouncer {
    pub fn new(window: Duration, trigger: RebuildTrigger) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
            trigger,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// (Re)arm the timer. Must be called from within a Tokio runtime.
    pub fn notify(&self) {
        if self.window.is_zero() {
            self.trigger.request();
            return;
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let trigger = self.trigger.clone();
        let window = self.window;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            trace!("debounce window elapsed");
            trigger.request();
        }));
    }

    /// Drop a pending timer without firing it.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
