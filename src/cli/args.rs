//! Command-line argument parsing for PlexCache
//!
//! This module defines the CLI structure using clap derive macros: running a
//! sync, previewing one, and managing configuration and cache state.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// PlexCache - keep upcoming media on the fast cache drive
#[derive(Parser, Debug)]
#[command(
    name = "plexcache",
    version,
    about = "Stage media you are about to watch on the cache drive",
    long_about = "Moves on-deck and watchlisted media from the array to the cache drive and moves
watched media back, skipping anything that is playing and never overfilling the cache."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize the cache tier with what users are about to watch
    Run(RunArgs),

    /// Show what a run would move without touching any file
    Plan(PlanArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Inspect or reset the decision cache and the cache ledger
    State(StateArgs),
}

/// Arguments for the run command
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// JSON catalog export (overrides catalog.snapshot_path)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Report the moves without performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore the stored decision and recompute from the catalog
    #[arg(short, long)]
    pub force_refresh: bool,

    /// Number of concurrent move workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the plan command
#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// JSON catalog export (overrides catalog.snapshot_path)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Ignore the stored decision and recompute from the catalog
    #[arg(short, long)]
    pub force_refresh: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Destination (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Check the configuration for errors
    Validate,
}

/// Arguments for state management
#[derive(Args, Debug)]
pub struct StateArgs {
    #[command(subcommand)]
    pub action: StateAction,
}

/// State actions
#[derive(Subcommand, Debug)]
pub enum StateAction {
    /// Show the stored decision and the cache ledger
    Show {
        /// List every ledger entry
        #[arg(long)]
        detailed: bool,
    },

    /// Forget the stored decision (and optionally the ledger)
    Clear {
        /// Also clear the cache ledger
        #[arg(long)]
        ledger: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl RunArgs {
    /// Reject contradictory options
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl From<PlanArgs> for RunArgs {
    fn from(plan: PlanArgs) -> Self {
        Self {
            catalog: plan.catalog,
            dry_run: true,
            force_refresh: plan.force_refresh,
            workers: None,
            json: plan.json,
            no_progress: true,
        }
    }
}
