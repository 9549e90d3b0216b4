//! Submission records and their lifecycle
//!
//! A submission bundles a task with its parameter and, for synchronous
//! callers, the single-use reply channel. The task and parameter are erased
//! into one boxed job so submissions of any type can share the control
//! channel.

use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::task::{run_contained, Task};
use crate::error::SubmitError;

// ─────────────────────────────────────────────────────────────────
// Submission Lifecycle
// ─────────────────────────────────────────────────────────────────

/// How the caller waits for a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Caller waits for the result, failure or cancellation
    Sync,
    /// Fire and forget
    Async,
}

/// Lifecycle state of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// Record built, not yet handed off
    Created,
    /// Being handed off to the control channel
    WaitingToDeliver,
    /// Dequeued by the serializer loop
    Delivered,
    /// Task body running inside the loop
    Executing,
    /// Task body finished with a result or a failure
    Completed,
    /// Scope ended before the loop dequeued the submission
    Canceled,
}

impl Default for SubmissionState {
    fn default() -> Self {
        SubmissionState::Created
    }
}

impl SubmissionState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Completed | SubmissionState::Canceled)
    }

    /// Whether `next` is a legal successor of this state
    ///
    /// Once a task is executing it always completes; there is no way back
    /// to `Canceled`.
    pub fn can_transition_to(&self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Created, WaitingToDeliver)
                | (Created, Canceled)
                | (WaitingToDeliver, Delivered)
                | (WaitingToDeliver, Canceled)
                | (Delivered, Executing)
                | (Executing, Completed)
        )
    }
}

/// What happened when the loop ran a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Completion {
    Succeeded,
    Failed,
    Panicked(String),
}

impl Completion {
    fn of<R, E>(outcome: &Result<R, SubmitError<E>>) -> Self {
        match outcome {
            Ok(_) => Completion::Succeeded,
            Err(SubmitError::Panicked { message }) => Completion::Panicked(message.clone()),
            Err(_) => Completion::Failed,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Submission
// ─────────────────────────────────────────────────────────────────

type Job<S> = Box<dyn FnOnce(&mut S) -> Completion + Send>;

/// Identity and lifecycle of a submission, kept apart from its job so the
/// job can be moved out when the loop runs it
#[derive(Debug)]
struct Lifecycle {
    id: u64,
    mode: Mode,
    state: SubmissionState,
}

impl Lifecycle {
    fn transition(&mut self, next: SubmissionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal submission transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(
            submission_id = self.id,
            mode = ?self.mode,
            from = ?self.state,
            to = ?next,
            "Submission transition"
        );
        self.state = next;
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        // Dropping an undelivered record drops its reply sender, which the
        // waiting caller observes as a cancellation.
        if !self.state.is_terminal() {
            self.transition(SubmissionState::Canceled);
        }
    }
}

/// One unit of work travelling through the control channel
pub(crate) struct Submission<S> {
    lifecycle: Lifecycle,
    job: Job<S>,
}

impl<S> Submission<S> {
    /// Build a synchronous submission whose outcome goes to `reply`
    pub(crate) fn sync<P, T>(
        id: u64,
        task: T,
        param: P,
        reply: oneshot::Sender<Result<T::Output, SubmitError<T::Error>>>,
    ) -> Self
    where
        S: 'static,
        T: Task<S, P>,
        P: Send + 'static,
    {
        let job: Job<S> = Box::new(move |state: &mut S| {
            let outcome = run_contained(task, state, param);
            let completion = Completion::of(&outcome);
            if reply.send(outcome).is_err() {
                debug!(submission_id = id, "Caller stopped waiting, outcome discarded");
            }
            completion
        });
        Self::new(id, Mode::Sync, job)
    }

    /// Build an asynchronous submission; its failure is discarded
    pub(crate) fn fire_and_forget<P, T>(id: u64, task: T, param: P) -> Self
    where
        S: 'static,
        T: Task<S, P>,
        P: Send + 'static,
    {
        let job: Job<S> = Box::new(move |state: &mut S| {
            let completion = Completion::of(&run_contained(task, state, param));
            if completion == Completion::Failed {
                debug!(submission_id = id, "Asynchronous task failed, failure discarded");
            }
            completion
        });
        Self::new(id, Mode::Async, job)
    }

    fn new(id: u64, mode: Mode, job: Job<S>) -> Self {
        Self {
            lifecycle: Lifecycle {
                id,
                mode,
                state: SubmissionState::Created,
            },
            job,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.lifecycle.id
    }

    pub(crate) fn mode(&self) -> Mode {
        self.lifecycle.mode
    }

    pub(crate) fn state(&self) -> SubmissionState {
        self.lifecycle.state
    }

    /// Move to the next lifecycle state
    pub(crate) fn transition(&mut self, next: SubmissionState) {
        self.lifecycle.transition(next);
    }

    /// Run the task against the state. Called only by the serializer loop.
    pub(crate) fn execute(self, state: &mut S) -> Completion {
        let Submission { mut lifecycle, job } = self;
        lifecycle.transition(SubmissionState::Delivered);
        lifecycle.transition(SubmissionState::Executing);
        let completion = job(state);
        lifecycle.transition(SubmissionState::Completed);
        completion
    }
}
