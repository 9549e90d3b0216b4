//! Task abstraction
//!
//! A task is a unit of work with exclusive, momentary access to the
//! serializer's state. Any `FnOnce(&mut S, P) -> Result<R, E>` closure or
//! function item is a task.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::SubmitError;

/// A unit of work run against state `S` with parameter `P`
pub trait Task<S, P>: Send + 'static {
    /// Value produced on success
    type Output: Send + 'static;

    /// Failure reported by the task itself
    type Error: Send + 'static;

    /// Run the task with exclusive access to the state
    fn run(self, state: &mut S, param: P) -> Result<Self::Output, Self::Error>;
}

impl<S, P, R, E, F> Task<S, P> for F
where
    F: FnOnce(&mut S, P) -> Result<R, E> + Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    type Output = R;
    type Error = E;

    fn run(self, state: &mut S, param: P) -> Result<R, E> {
        self(state, param)
    }
}

/// Run a task behind a fault boundary
///
/// A panic inside the task is turned into `SubmitError::Panicked` instead of
/// unwinding through the serializer loop. The state may have been partially
/// updated by the panicking task.
pub(crate) fn run_contained<S, P, T>(
    task: T,
    state: &mut S,
    param: P,
) -> Result<T::Output, SubmitError<T::Error>>
where
    T: Task<S, P>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| task.run(state, param))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(SubmitError::Task(e)),
        Err(payload) => Err(SubmitError::Panicked {
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Extract a readable message from a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
