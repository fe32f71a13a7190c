//! Command-line interface components
//!
//! This module contains CLI-specific code for the PlexCache application,
//! including argument parsing, command handlers and progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, PlanArgs, RunArgs, StateAction,
    StateArgs,
};
pub use commands::{engine_config, handle_config, handle_plan, handle_run, handle_state};
pub use progress::{ProgressDisplay, ProgressTotals};
