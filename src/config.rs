//! Configuration system for safe-action
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (SAFE_ACTION_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::executor::SerializerConfig;

/// Upper bound on simulated demo users
pub const MAX_DEMO_USERS: usize = 100_000;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    /// Serializer loop settings
    pub serializer: SerializerSettings,

    /// Logging configuration
    pub logging: LoggingSettings,

    /// Subscription demo settings
    pub demo: DemoSettings,
}

/// Serializer loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerSettings {
    /// Capacity of the control channel (must be at least 1)
    pub queue_capacity: usize,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

/// How the demo removes subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RemoveMode {
    /// Wait for each removal to be applied
    Sync,
    /// Fire and forget, then poll the counts
    Async,
}

impl std::fmt::Display for RemoveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoveMode::Sync => write!(f, "sync"),
            RemoveMode::Async => write!(f, "async"),
        }
    }
}

/// Subscription demo settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Number of simulated users creating one subscription each
    pub users: usize,

    /// Number of topics the subscriptions are spread over
    pub topics: usize,

    /// Upper bound of the random delay before each request, in milliseconds
    pub max_jitter_ms: u64,

    /// Removal protocol
    pub remove_mode: RemoveMode,

    /// Overall time limit for one scenario, in seconds
    pub timeout_secs: u64,
}

// Default implementations

impl Default for SerializerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: SerializerConfig::default().queue_capacity,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            users: 100,
            topics: 3,
            max_jitter_ms: 10,
            remove_mode: RemoveMode::Async,
            timeout_secs: 30,
        }
    }
}

impl From<&SerializerSettings> for SerializerConfig {
    fn from(settings: &SerializerSettings) -> Self {
        SerializerConfig {
            queue_capacity: settings.queue_capacity,
        }
    }
}

impl ActionConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::ConfigNotFound {
                path: path.clone(),
                source: Some(e),
            })?;
            config = Self::parse(&content)?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::config_not_found(path));
        }

        // Search in standard locations
        let search_paths = [
            PathBuf::from("safe-action.toml"),
            dirs::config_dir()
                .map(|p| p.join("safe-action").join("config.toml"))
                .unwrap_or_default(),
            default_config_path(),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Serializer settings
        if let Ok(val) = std::env::var("SAFE_ACTION_QUEUE_CAPACITY") {
            if let Ok(n) = val.parse() {
                self.serializer.queue_capacity = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("SAFE_ACTION_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("SAFE_ACTION_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("SAFE_ACTION_LOG_JSON") {
            self.logging.json_format = parse_bool(&val);
        }

        // Demo settings
        if let Ok(val) = std::env::var("SAFE_ACTION_DEMO_USERS") {
            if let Ok(n) = val.parse() {
                self.demo.users = n;
            }
        }
        if let Ok(val) = std::env::var("SAFE_ACTION_DEMO_TOPICS") {
            if let Ok(n) = val.parse() {
                self.demo.topics = n;
            }
        }
        if let Ok(val) = std::env::var("SAFE_ACTION_DEMO_MAX_JITTER_MS") {
            if let Ok(n) = val.parse() {
                self.demo.max_jitter_ms = n;
            }
        }
        if let Ok(val) = std::env::var("SAFE_ACTION_DEMO_REMOVE_MODE") {
            match val.to_lowercase().as_str() {
                "sync" => self.demo.remove_mode = RemoveMode::Sync,
                "async" => self.demo.remove_mode = RemoveMode::Async,
                _ => debug!(value = %val, "Ignoring unknown SAFE_ACTION_DEMO_REMOVE_MODE"),
            }
        }
        if let Ok(val) = std::env::var("SAFE_ACTION_DEMO_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.demo.timeout_secs = n;
            }
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.serializer.queue_capacity == 0 {
            return Err(Error::config_field_invalid(
                "serializer.queue_capacity",
                "queue_capacity must be at least 1",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        if self.demo.users == 0 || self.demo.users > MAX_DEMO_USERS {
            return Err(Error::config_field_invalid(
                "demo.users",
                format!("users must be between 1 and {}", MAX_DEMO_USERS),
            ));
        }
        if self.demo.topics == 0 {
            return Err(Error::config_field_invalid("demo.topics", "topics must be at least 1"));
        }
        if self.demo.timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "demo.timeout_secs",
                "timeout_secs must be at least 1",
            ));
        }

        Ok(())
    }

    /// Serializer configuration derived from these settings
    pub fn serializer_config(&self) -> SerializerConfig {
        SerializerConfig::from(&self.serializer)
    }
}

fn parse_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Location used by `config init` when no path is given
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".safe-action")
        .join("config.toml")
}

/// Initialize a new configuration file
///
/// Returns the path that was written.
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    fs::write(&config_path, generate_default_config()).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    info!(path = %config_path.display(), "Configuration file created");
    Ok(config_path)
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# safe-action configuration

[serializer]
# Capacity of the control channel between submitters and the loop (>= 1)
queue_capacity = 16

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.safe-action/logs/safe-action.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false

[demo]
# Simulated users, one subscription each
users = 100

# Topics the subscriptions are spread over
topics = 3

# Random delay before each request, in milliseconds
max_jitter_ms = 10

# Removal protocol: "sync" or "async"
remove_mode = "async"

# Overall time limit for one scenario, in seconds
timeout_secs = 30
"#
    .to_string()
}
