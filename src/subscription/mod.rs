//! Subscription registry
//!
//! A topic-to-subscriptions book kept consistent under concurrent
//! creates, counts and removals by running every access through a
//! serializer instead of a lock.

mod handler;
mod types;

pub use handler::*;
pub use types::*;
