//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface of the sciplan binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sciplan - run scientific application plans
///
/// Launches the tasks of a plan document on their runtimes, watches them to
/// completion and collects their working directories.
#[derive(Parser, Debug)]
#[command(name = "sciplan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "SCIPLAN_CONFIG", global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Confirm and launch every task of a plan file
    Launch {
        /// Plan document (rewritten with the assigned references)
        plan: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Re-submit tasks that are already launched
        #[arg(short, long)]
        force: bool,
    },

    /// Print the current status of every task
    Status {
        plan: PathBuf,
    },

    /// Poll until every task has finished (Ctrl-C stops waiting)
    Wait {
        plan: PathBuf,

        /// Minutes between polls [default: plan.poll_interval_minutes]
        #[arg(short, long)]
        interval: Option<f64>,
    },

    /// Ask the backend to cancel every task
    Stop {
        plan: PathBuf,
    },

    /// Download every task's working directory
    Fetch {
        plan: PathBuf,

        /// Local directory receiving one sub-directory per task and plan.json
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// List plans in the plan store
    Plans,

    /// Print a stored plan
    Show {
        /// Plan id
        id: String,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,
}
