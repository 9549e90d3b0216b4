//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for safe-action.

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::RemoveMode;
use crate::demo::Scenario;

/// safe-action - serialized task execution without locks
///
/// Runs every access to a piece of shared state through a single
/// serializer loop, and ships a concurrent subscription demo built on it.
#[derive(Parser, Debug)]
#[command(name = "safe-action")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the concurrent subscription demo
    Demo {
        /// Path to configuration file
        #[arg(short, long, env = "SAFE_ACTION_CONFIG")]
        config: Option<String>,

        /// Number of simulated users (overrides configuration)
        #[arg(short, long)]
        users: Option<usize>,

        /// Scenario to run
        #[arg(short, long, value_enum, default_value_t = ScenarioArg::All)]
        scenario: ScenarioArg,

        /// Removal protocol (overrides configuration)
        #[arg(long, value_enum)]
        remove_mode: Option<RemoveMode>,

        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Scenario selection on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioArg {
    /// Create all subscriptions, then delete them all
    CreateThenDelete,
    /// Delete each subscription as soon as it is created
    CreateAndDelete,
    /// Both scenarios, one after the other
    All,
}

impl ScenarioArg {
    /// Scenarios to run, in order
    pub fn scenarios(self) -> Vec<Scenario> {
        match self {
            ScenarioArg::CreateThenDelete => vec![Scenario::CreateThenDelete],
            ScenarioArg::CreateAndDelete => vec![Scenario::CreateAndDelete],
            ScenarioArg::All => Scenario::ALL.to_vec(),
        }
    }
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
