//! safe-action command-line entry point
//!
//! Runs the concurrent subscription demo and manages configuration.

use clap::Parser;
use tracing::{error, info};

use safe_action::cli::{Cli, Commands, ConfigSubcommand, ScenarioArg};
use safe_action::config::{self, ActionConfig, RemoveMode};
use safe_action::demo::{self, DemoSummary};
use safe_action::error::{Error, Result};
use safe_action::logging::{self, LogGuards};
use safe_action::version;

fn main() {
    if let Err(e) = run() {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => {
            // Config commands use minimal logging
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Demo {
            config,
            users,
            scenario,
            remove_mode,
            json,
        } => {
            let mut config = ActionConfig::load(config.as_deref())?;
            apply_demo_overrides(&mut config, users, remove_mode)?;

            // The guards must be kept alive until the demo has finished
            let _log_guards = init_logging_from_config(&config, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            info!(
                version = %build.full_version(),
                target = %build.target,
                profile = %build.profile,
                "Starting safe-action demo"
            );

            run_demo(config, scenario, json)
        }
    }
}

/// Initialize logging from configuration
fn init_logging_from_config(config: &ActionConfig, verbose: u8, quiet: bool) -> Result<LogGuards> {
    logging::init_logging(&config.logging, verbose, quiet)
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_demo_overrides(
    config: &mut ActionConfig,
    users: Option<usize>,
    remove_mode: Option<RemoveMode>,
) -> Result<()> {
    if let Some(users) = users {
        config.demo.users = users;
    }
    if let Some(mode) = remove_mode {
        config.demo.remove_mode = mode;
    }
    config.validate()
}

/// Run the demo on a multi-threaded runtime
fn run_demo(config: ActionConfig, scenario: ScenarioArg, json: bool) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().clamp(2, 8))
        .thread_name("safe-action")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    let summary = runtime
        .block_on(demo::run_demo(&config, &scenario.scenarios()))
        .map_err(demo_error)
        .map_err(|e| {
            error!(error = %e.format_for_log(), "Demo failed");
            e
        })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Keep typed errors when the demo failed on one, so exit codes stay meaningful
fn demo_error(err: anyhow::Error) -> Error {
    match err.downcast::<Error>() {
        Ok(e) => e,
        Err(other) => Error::Internal(format!("{:#}", other)),
    }
}

fn print_summary(summary: &DemoSummary) {
    for report in &summary.reports {
        println!();
        println!("Scenario {}:", report.scenario);
        println!("  Subscriptions created: {}", report.created);
        println!("  Peak total observed:   {}", report.peak_total);
        println!("  Count rounds:          {}", report.polls);
        println!("  Duration:              {} ms", report.elapsed_ms);
        if report.final_counts.is_empty() {
            println!("  Remaining:             none");
        }
        for (topic, count) in &report.final_counts {
            println!("  Remaining in {}: {}", topic, count);
        }
    }

    println!();
    println!("Serializer:");
    println!("  Tasks executed:  {}", summary.stats.executed());
    println!("  Task failures:   {}", summary.stats.failed);
    println!("  Cancelled calls: {}", summary.stats.cancelled);
    println!("  Dropped async:   {}", summary.stats.dropped);
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = ActionConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration file created: {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            ActionConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
