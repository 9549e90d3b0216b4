//! Serialized task executor
//!
//! Runs tasks against a single piece of state, one at a time:
//! - Tasks are submitted synchronously (wait for the outcome) or
//!   asynchronously (fire and forget)
//! - A cancellation scope bounds the executor's lifetime
//! - Panicking tasks are contained and reported, the loop keeps running

mod scope;
mod serializer;
mod stats;
mod submission;
mod task;

pub use scope::Scope;
pub use serializer::{LoopHandle, Serializer, SerializerConfig};
pub use stats::{SerializerStats, StatsSnapshot};
pub use submission::{Mode, SubmissionState};
pub use task::Task;
