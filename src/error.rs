//! Error types for safe-action
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI
//! - The submission outcome error returned by the serializer

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for safe-action operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Execution errors (5xx)
    ExecutionFailed = 500,
    ExecutionTimeout = 501,
    ExecutionCancelled = 502,
    ExecutionPanicked = 503,

    // Subscription errors (6xx)
    SubscriptionNotFound = 600,
    SubscriptionDuplicate = 601,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            500..=599 => 50, // Execution errors
            600..=699 => 60, // Subscription errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a submission that did not produce a result
///
/// `Task` carries the task's own failure verbatim. `Panicked` is a task
/// failure caught by the serializer's fault boundary. `Cancelled` means the
/// scope ended before the serializer dequeued the submission, so the task
/// never ran.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError<E> {
    /// The task ran and reported a failure
    #[error("{0}")]
    Task(E),

    /// The task panicked while running inside the serializer
    #[error("task panicked: {message}")]
    Panicked { message: String },

    /// The scope ended before the submission was accepted
    #[error("serializer scope cancelled before the task was accepted")]
    Cancelled,
}

impl<E> SubmitError<E> {
    /// True if the task never ran because the scope ended first
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SubmitError::Cancelled)
    }

    /// True if the task ran and failed (including a contained panic)
    pub fn is_task_failure(&self) -> bool {
        matches!(self, SubmitError::Task(_) | SubmitError::Panicked { .. })
    }

    /// Borrow the task's own failure, if that is what this is
    pub fn task_error(&self) -> Option<&E> {
        match self {
            SubmitError::Task(e) => Some(e),
            _ => None,
        }
    }

    /// Convert the task failure type, keeping the other variants
    pub fn map_task<F>(self, f: impl FnOnce(E) -> F) -> SubmitError<F> {
        match self {
            SubmitError::Task(e) => SubmitError::Task(f(e)),
            SubmitError::Panicked { message } => SubmitError::Panicked { message },
            SubmitError::Cancelled => SubmitError::Cancelled,
        }
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// A task ran and failed
    #[error("Task execution failed: {message}")]
    TaskFailed { message: String },

    /// A task panicked inside the serializer
    #[error("Task panicked: {message}")]
    TaskPanicked { message: String },

    /// The serializer scope ended before the task was accepted
    #[error("Serializer cancelled before the task was accepted")]
    Cancelled,

    /// An operation did not finish in time
    #[error("Timed out: {0}")]
    Timeout(String),

    // ─────────────────────────────────────────────────────────────
    // Subscription Errors
    // ─────────────────────────────────────────────────────────────

    /// No subscription with this id under the topic
    #[error("Subscription {id} not found under topic '{topic}'")]
    SubscriptionNotFound { topic: String, id: String },

    /// A freshly generated subscription id was already taken
    #[error("Subscription id {id} already exists")]
    DuplicateSubscription { id: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SubmitError<Error>> for Error {
    fn from(err: SubmitError<Error>) -> Self {
        match err {
            SubmitError::Task(e) => e,
            SubmitError::Panicked { message } => Error::TaskPanicked { message },
            SubmitError::Cancelled => Error::Cancelled,
        }
    }
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::Json(_) => ErrorCode::IoWrite,

            Error::TaskFailed { .. } => ErrorCode::ExecutionFailed,
            Error::TaskPanicked { .. } => ErrorCode::ExecutionPanicked,
            Error::Cancelled => ErrorCode::ExecutionCancelled,
            Error::Timeout(_) => ErrorCode::ExecutionTimeout,

            Error::SubscriptionNotFound { .. } => ErrorCode::SubscriptionNotFound,
            Error::DuplicateSubscription { .. } => ErrorCode::SubscriptionDuplicate,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'safe-action config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'safe-action config validate' to see details."
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::Cancelled => Some(
                "The serializer was shut down. Submit work only while its scope is active."
            ),
            Error::Timeout(_) => Some(
                "Increase 'timeout_secs' in the [demo] section or reduce the number of users."
            ),
            Error::TaskPanicked { .. } => Some(
                "A task body panicked. Task bodies must report failures through their return value."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a task failure error
    pub fn task_failed(message: impl Into<String>) -> Self {
        Error::TaskFailed {
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
