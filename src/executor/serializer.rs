//! Serializer loop and submission protocols
//!
//! One long-lived tokio task owns the state and runs submitted tasks one at
//! a time, in the order it dequeues them from a bounded control channel.
//! Callers hold cheap `Serializer` handles and never touch the state
//! directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, trace, Instrument};

use super::scope::Scope;
use super::stats::{SerializerStats, StatsSnapshot};
use super::submission::{Completion, Mode, Submission, SubmissionState};
use super::task::Task;
use crate::error::{Error, Result, SubmitError};

// ─────────────────────────────────────────────────────────────────
// Serializer Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for a serializer
#[derive(Debug, Clone)]
pub struct SerializerConfig {
    /// Capacity of the control channel (at least 1)
    pub queue_capacity: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self { queue_capacity: 16 }
    }
}

// ─────────────────────────────────────────────────────────────────
// Serializer Handle
// ─────────────────────────────────────────────────────────────────

/// Handle used to submit tasks against state owned by the serializer loop
pub struct Serializer<S> {
    control: mpsc::Sender<Submission<S>>,
    scope: Scope,
    runtime: Handle,
    stats: Arc<SerializerStats>,
    next_id: Arc<AtomicU64>,
}

impl<S> Clone for Serializer<S> {
    fn clone(&self) -> Self {
        Self {
            control: self.control.clone(),
            scope: self.scope.clone(),
            runtime: self.runtime.clone(),
            stats: Arc::clone(&self.stats),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

/// Owns the serializer loop task
///
/// The loop hands its state back when it ends, either because the scope
/// was cancelled or because every `Serializer` handle was dropped.
pub struct LoopHandle<S> {
    join: JoinHandle<S>,
}

impl<S> LoopHandle<S> {
    /// Whether the loop has stopped
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the loop to stop and take back the state
    pub async fn join(self) -> Result<S> {
        self.join
            .await
            .map_err(|e| Error::Internal(format!("Serializer loop failed: {}", e)))
    }
}

impl<S: Send + 'static> Serializer<S> {
    /// Move `state` into a new serializer loop bound to `scope`
    ///
    /// Must be called from within a tokio runtime. The loop and any hand-off
    /// helpers run on that runtime.
    pub fn spawn(state: S, scope: Scope, config: SerializerConfig) -> (Self, LoopHandle<S>) {
        let capacity = config.queue_capacity.max(1);
        let (control, receiver) = mpsc::channel(capacity);
        let stats = Arc::new(SerializerStats::new());
        let runtime = Handle::current();

        let join = runtime.spawn(
            run_loop(state, receiver, scope.clone(), Arc::clone(&stats))
                .instrument(info_span!("serializer", capacity)),
        );

        let serializer = Self {
            control,
            scope,
            runtime,
            stats,
            next_id: Arc::new(AtomicU64::new(1)),
        };

        (serializer, LoopHandle { join })
    }

    /// Run `task` inside the serializer and wait for its outcome
    ///
    /// Resolves to the task's result, its failure, or
    /// `SubmitError::Cancelled` if the scope ends before the loop dequeues
    /// the submission. Once the loop has dequeued it, the task runs to
    /// completion and its outcome is returned even if the scope ends
    /// meanwhile.
    pub async fn submit_sync<P, T>(
        &self,
        task: T,
        param: P,
    ) -> std::result::Result<T::Output, SubmitError<T::Error>>
    where
        T: Task<S, P>,
        P: Send + 'static,
    {
        let id = self.next_id();
        if self.scope.is_cancelled() {
            return Err(self.cancelled(id));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let mut submission = Submission::sync(id, task, param, reply_tx);
        submission.transition(SubmissionState::WaitingToDeliver);

        // A `send` future dropped by the losing branch never enqueues.
        let delivered = tokio::select! {
            biased;
            _ = self.scope.cancelled() => false,
            sent = self.control.send(submission) => sent.is_ok(),
        };
        if !delivered {
            return Err(self.cancelled(id));
        }

        match reply_rx.await {
            Ok(outcome) => outcome,
            // The loop stopped and dropped the submission before dequeuing it.
            Err(_) => Err(self.cancelled(id)),
        }
    }

    /// Hand `task` to the serializer without waiting for it
    ///
    /// Never blocks. If the control channel is full, a short-lived helper
    /// keeps racing the hand-off against scope end. Once the scope has ended
    /// the task is silently dropped and never runs. Task failures are not
    /// reported.
    pub fn submit_async<P, T>(&self, task: T, param: P)
    where
        T: Task<S, P>,
        P: Send + 'static,
    {
        let id = self.next_id();
        if self.scope.is_cancelled() {
            self.dropped(id);
            return;
        }

        let mut submission = Submission::fire_and_forget(id, task, param);
        submission.transition(SubmissionState::WaitingToDeliver);

        match self.control.try_send(submission) {
            Ok(()) => trace!(submission_id = id, "Asynchronous submission queued"),
            Err(TrySendError::Closed(_)) => self.dropped(id),
            Err(TrySendError::Full(submission)) => self.spawn_handoff(submission),
        }
    }

    /// Race a blocked hand-off against scope end on a helper task
    fn spawn_handoff(&self, submission: Submission<S>) {
        let id = submission.id();
        let control = self.control.clone();
        let scope = self.scope.clone();
        let stats = Arc::clone(&self.stats);
        let guard = stats.handoff_started();

        self.runtime.spawn(
            async move {
                let _guard = guard;
                let delivered = tokio::select! {
                    biased;
                    _ = scope.cancelled() => false,
                    sent = control.send(submission) => sent.is_ok(),
                };
                if delivered {
                    trace!(submission_id = id, "Asynchronous submission handed off");
                } else {
                    stats.record_dropped();
                    debug!(submission_id = id, "Scope ended during hand-off, asynchronous submission dropped");
                }
            }
            .instrument(info_span!("handoff", submission_id = id)),
        );
    }

    /// Counters for this serializer
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Asynchronous hand-off helpers still alive
    pub fn pending_handoffs(&self) -> usize {
        self.stats.pending_handoffs()
    }

    /// The scope bounding this serializer
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn cancelled<E>(&self, id: u64) -> SubmitError<E> {
        self.stats.record_cancelled();
        debug!(submission_id = id, "Synchronous submission cancelled before delivery");
        SubmitError::Cancelled
    }

    fn dropped(&self, id: u64) {
        self.stats.record_dropped();
        debug!(submission_id = id, "Scope ended, asynchronous submission dropped");
    }
}

// ─────────────────────────────────────────────────────────────────
// Serializer Loop
// ─────────────────────────────────────────────────────────────────

/// The single consumer: the only place the state is ever touched
async fn run_loop<S>(
    mut state: S,
    mut control: mpsc::Receiver<Submission<S>>,
    scope: Scope,
    stats: Arc<SerializerStats>,
) -> S {
    info!("Serializer loop started");

    let cancelled = scope.cancelled();
    tokio::pin!(cancelled);

    loop {
        // Scope end is checked first so nothing is dequeued after it.
        tokio::select! {
            biased;
            _ = &mut cancelled => {
                info!("Scope ended, stopping serializer loop");
                break;
            }
            next = control.recv() => match next {
                Some(submission) => {
                    let id = submission.id();
                    let completion = submission.execute(&mut state);
                    if let Completion::Panicked(message) = &completion {
                        error!(submission_id = id, panic = %message, "Task panicked, loop continues");
                    }
                    stats.record_completion(&completion);
                }
                None => {
                    info!("All serializer handles dropped, stopping serializer loop");
                    break;
                }
            }
        }
    }

    // Refuse new hand-offs, then abandon whatever is still buffered. `recv`
    // only yields `None` once senders holding a permit have pushed, so no
    // submission can land after the receiver is gone.
    control.close();
    let mut abandoned = 0u64;
    while let Some(submission) = control.recv().await {
        trace!(
            submission_id = submission.id(),
            state = ?submission.state(),
            "Abandoning undelivered submission"
        );
        if submission.mode() == Mode::Async {
            stats.record_dropped();
        }
        abandoned += 1;
    }

    let totals = stats.snapshot();
    info!(
        executed = totals.executed(),
        failed = totals.failed,
        panicked = totals.panicked,
        abandoned,
        "Serializer loop stopped"
    );

    state
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
