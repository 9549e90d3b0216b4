//! Logging setup for the safe-action binary
//!
//! Events go to stderr so `demo --json` keeps stdout machine-readable. The
//! serializer internals live under `safe_action::executor` and get their own
//! level: submission transitions are trace events, so `-vv` is the only way
//! to see them without drowning the demo output at `-v`.

use std::fs;
use std::io;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

const CRATE_TARGET: &str = "safe_action";
const EXECUTOR_TARGET: &str = "safe_action::executor";

/// Dependencies that only add noise at the levels the demo runs at
const QUIET_TARGETS: &[&str] = &["tokio", "runtime"];

/// Keeps the non-blocking file writer flushing until dropped
pub struct LogGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Levels picked from the configuration and the `-v`/`-q` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Verbosity {
    /// Everything in the crate outside the executor
    crate_level: Level,
    /// Serializer loop, hand-offs and submission lifecycle
    executor_level: Level,
}

impl Verbosity {
    fn new(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::uniform(Level::ERROR);
        }
        match verbose {
            0 => Self::uniform(parse_level(&settings.level)),
            1 => Self::uniform(Level::DEBUG),
            _ => Self {
                crate_level: Level::DEBUG,
                executor_level: Level::TRACE,
            },
        }
    }

    fn uniform(level: Level) -> Self {
        Self {
            crate_level: level,
            executor_level: level,
        }
    }

    /// Span close events carry durations of scenarios and hand-offs
    fn span_events(&self) -> FmtSpan {
        if self.executor_level >= Level::DEBUG {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn directives(&self) -> Vec<String> {
        let mut directives = vec![
            format!("{}={}", CRATE_TARGET, self.crate_level),
            format!("{}={}", EXECUTOR_TARGET, self.executor_level),
        ];
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
        directives
    }
}

/// Install the global subscriber for a demo run
pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let verbosity = Verbosity::new(settings, verbose, quiet);
    let filter = build_env_filter(&verbosity)?;
    let span_events = verbosity.span_events();

    let console = format_layer(io::stderr, settings.json_format, true, span_events.clone());

    let (file, file_guard) = match settings.file.as_deref() {
        Some(path) => {
            let (writer, guard) = file_writer(path, settings.max_file_size_mb, settings.max_files)?;
            (Some(format_layer(writer, settings.json_format, false, span_events)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(
        crate_level = %verbosity.crate_level,
        executor_level = %verbosity.executor_level,
        file = ?settings.file,
        json = settings.json_format,
        "Logging initialized"
    );

    Ok(LogGuards {
        _file_guard: file_guard,
    })
}

/// Minimal stderr logging for config commands and tests
pub fn init_simple(level: Level) -> Result<()> {
    let filter = build_env_filter(&Verbosity::uniform(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).compact())
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `RUST_LOG` decides for other crates; our targets always follow the flags
fn build_env_filter(verbosity: &Verbosity) -> Result<EnvFilter> {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    verbosity.directives().iter().try_fold(base, |filter, directive| {
        let directive = directive
            .parse::<Directive>()
            .map_err(|e| Error::Config(format!("Invalid log directive '{}': {}", directive, e)))?;
        Ok(filter.add_directive(directive))
    })
}

/// One formatter for console and file
///
/// JSON lines keep the enclosing span's fields, so a hand-off event carries
/// the `submission_id` of its span and scenario events carry the scenario.
fn format_layer<S, W>(writer: W, json: bool, ansi: bool, span_events: FmtSpan) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(false)
            .with_thread_names(true)
            .with_span_events(span_events)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_thread_names(true)
            .with_span_events(span_events)
            .compact()
            .boxed()
    }
}

/// tracing-appender rotates by time only; smaller size budgets rotate hourly
fn rotation_for(max_file_size_mb: u64) -> Rotation {
    if max_file_size_mb > 0 && max_file_size_mb < 10 {
        Rotation::HOURLY
    } else {
        Rotation::DAILY
    }
}

fn file_writer(
    log_file: &str,
    max_file_size_mb: u64,
    max_files: u32,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let path = Path::new(log_file);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(directory).map_err(|e| {
        Error::Config(format!("Failed to create log directory '{}': {}", directory.display(), e))
    })?;

    // "demo.log" rotates into "demo.<date>.log"
    let prefix = path
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("safe-action");
    let suffix = path.extension().and_then(|e| e.to_str()).unwrap_or("log");

    let appender = RollingFileAppender::builder()
        .rotation(rotation_for(max_file_size_mb))
        .filename_prefix(prefix)
        .filename_suffix(suffix)
        .max_log_files(max_files.max(1) as usize)
        .build(directory)
        .map_err(|e| Error::Config(format!("Failed to create log file appender: {}", e)))?;

    Ok(tracing_appender::non_blocking(appender))
}
