// src/engine/queue.rs

//! Capacity-1 "a rebuild is pending" slot.
//!
//! Any number of [`RebuildTrigger`] clones may request a rebuild; a single
//! [`RebuildQueue`] consumer drains them. While a token is already queued,
//! further requests are absorbed.

use tokio::sync::mpsc;
use tracing::trace;

/// Producer side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RebuildTrigger {
    tx: mpsc::Sender<()>,
}

impl RebuildTrigger {
    /// Queue a rebuild unless one is already pending. Never blocks.
    ///
    /// Returns `true` if this call queued the token.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("rebuild already pending; request absorbed");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                trace!("rebuild queue closed; request dropped");
                false
            }
        }
    }
}

/// Consumer side.
#[derive(Debug)]
pub struct RebuildQueue {
    rx: mpsc::Receiver<()>,
}

/// Create a connected trigger/queue pair.
pub fn channel() -> (RebuildTrigger, RebuildQueue) {
    let (tx, rx) = mpsc::channel(1);
    (RebuildTrigger { tx }, RebuildQueue { rx })
}

impl RebuildQueue {
    /// Wait for the next token. `None` once every trigger has been dropped.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await
    }

    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}
