//! Cancellation scope
//!
//! A cloneable, monotonic cancellation signal built on a `watch` channel.
//! Every clone observes the same signal; once cancelled it stays cancelled.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Externally controlled lifetime of a serializer
#[derive(Debug, Clone)]
pub struct Scope {
    tx: Arc<watch::Sender<bool>>,
}

impl Scope {
    /// Create a new, active scope
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// End the scope. Idempotent.
    pub fn cancel(&self) {
        let was_cancelled = self.tx.send_replace(true);
        if !was_cancelled {
            debug!("Scope cancelled");
        }
    }

    /// Whether the scope has ended
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the scope has ended
    ///
    /// Completes immediately if the scope is already cancelled. Safe to use
    /// as a `tokio::select!` branch.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
