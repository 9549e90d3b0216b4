//! Common test utilities
//!
//! Shared helpers for driving a serializer into known states.

#![allow(dead_code)]

use std::sync::mpsc;
use std::time::Duration;

use safe_action::executor::Serializer;
use tokio::sync::oneshot;

/// Keeps the serializer loop busy inside one task until released
pub struct Gate {
    started: Option<oneshot::Receiver<()>>,
    release: mpsc::Sender<()>,
}

impl Gate {
    /// Wait until the gated task is running inside the loop
    pub async fn wait_started(&mut self) {
        if let Some(started) = self.started.take() {
            tokio::time::timeout(Duration::from_secs(5), started)
                .await
                .expect("gated task never started")
                .expect("gated task dropped before starting");
        }
    }

    /// Let the gated task finish
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

/// A task that blocks the loop thread until its gate is released
///
/// Only usable on a multi-threaded runtime.
pub fn gated_task<S: 'static>() -> (impl FnOnce(&mut S, ()) -> Result<(), String> + Send + 'static, Gate) {
    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let task = move |_: &mut S, _: ()| -> Result<(), String> {
        let _ = started_tx.send(());
        release_rx
            .recv_timeout(Duration::from_secs(10))
            .map_err(|e| format!("gate never released: {}", e))
    };

    let gate = Gate {
        started: Some(started_rx),
        release: release_tx,
    };
    (task, gate)
}

/// Wait until every hand-off helper of `serializer` has exited
pub async fn wait_for_handoffs<S: Send + 'static>(serializer: &Serializer<S>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while serializer.pending_handoffs() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("hand-off helpers outlived the scope");
}

/// Install a subscriber once so failing tests show serializer events
pub fn init_test_logging() {
    let _ = safe_action::logging::init_simple(tracing::Level::DEBUG);
}
