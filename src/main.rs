//! PlexCache CLI application
//!
//! Command-line interface for keeping upcoming media on the cache drive.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

// Import CLI modules through the library
use plexcache::cli::{handle_config, handle_plan, handle_run, handle_state, Cli, Commands};
use plexcache::config::AppConfig;
use plexcache::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error ({}): {}", e.category(), e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    // The config file's level applies when no verbosity flag is given
    let config_level = AppConfig::load(cli.global.config.clone())
        .await
        .ok()
        .map(|config| config.logging.level);
    init_logging(&cli, config_level.as_deref());

    info!("PlexCache v{} starting", env!("CARGO_PKG_VERSION"));

    let config_file = cli.global.config.clone();
    match cli.command {
        Commands::Run(args) => {
            info!("Executing run command");
            handle_run(args, config_file, cli.global.quiet).await
        }
        Commands::Plan(args) => {
            info!("Executing plan command");
            handle_plan(args, config_file).await
        }
        Commands::Config(args) => handle_config(args, config_file).await,
        Commands::State(args) => handle_state(args, config_file).await,
    }
}

/// Initialize logging based on CLI verbosity settings
///
/// `RUST_LOG` directives still apply on top of the verbosity flags.
fn init_logging(cli: &Cli, config_level: Option<&str>) {
    let flagged = cli.global.quiet || cli.global.verbose || cli.global.very_verbose;
    let log_level = match config_level {
        Some(level) if !flagged => level.to_string(),
        _ => cli.log_level().to_string(),
    };

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("plexcache={}", log_level.to_lowercase()).parse() {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
