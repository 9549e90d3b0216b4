//! safe-action
//!
//! Serialized access to shared state without locks. A single serializer
//! loop owns the state; callers submit tasks that run against it one at a
//! time, either waiting for the outcome or firing and forgetting.
//!
//! ```no_run
//! use safe_action::executor::{Scope, Serializer, SerializerConfig};
//!
//! # async fn example() -> safe_action::Result<()> {
//! let scope = Scope::new();
//! let (serializer, handle) = Serializer::spawn(0u64, scope.clone(), SerializerConfig::default());
//!
//! let total = serializer
//!     .submit_sync(|count: &mut u64, n: u64| -> Result<u64, String> {
//!         *count += n;
//!         Ok(*count)
//!     }, 5)
//!     .await;
//! assert_eq!(total, Ok(5));
//!
//! scope.cancel();
//! assert_eq!(handle.join().await?, 5);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod executor;
pub mod logging;
pub mod subscription;
pub mod version;

pub use error::{Error, Result, SubmitError};
pub use executor::{LoopHandle, Scope, Serializer, SerializerConfig, Task};
