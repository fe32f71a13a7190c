//! Command handlers for PlexCache CLI
//!
//! This module implements the command handlers that coordinate between CLI
//! arguments, the configuration file and the sync engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::coordinator::config::default_state_dir;
use crate::app::mover::format_bytes;
use crate::app::{
    CacheLedger, DecisionCache, EngineConfig, RunSummary, SnapshotCatalog, SyncEngine,
};
use crate::cli::{
    ConfigAction, ConfigArgs, PlanArgs, ProgressDisplay, RunArgs, StateAction, StateArgs,
};
use crate::config::AppConfig;
use crate::errors::{AppError, ConfigError, Result};

/// Handle the run command
///
/// Loads configuration and the catalog export, runs the engine until done or
/// interrupted, and prints the summary.
pub async fn handle_run(args: RunArgs, config_file: Option<PathBuf>, quiet: bool) -> Result<()> {
    args.validate().map_err(AppError::generic)?;

    let app_config = AppConfig::load(config_file).await?;
    let config = engine_config(&app_config, &args)?;
    let catalog_path = args
        .catalog
        .clone()
        .or_else(|| app_config.catalog.snapshot_path.clone())
        .ok_or_else(|| {
            AppError::generic(
                "No catalog export configured; pass --catalog or set catalog.snapshot_path",
            )
        })?;

    let catalog = SnapshotCatalog::load(&catalog_path).await?;
    info!("Catalog loaded from {}", catalog_path.display());

    let show_progress = !args.no_progress && !args.json && !quiet && !config.mover.dry_run;
    let buffer = config.mover.progress_buffer_size;
    let mut engine = SyncEngine::new(config, Arc::new(catalog))?;

    let display = if show_progress {
        let (tx, rx) = mpsc::channel(buffer);
        engine = engine.with_progress(tx);
        Some(ProgressDisplay::new()?.spawn(rx))
    } else {
        None
    };

    let result = engine.run_until_signal().await;
    drop(engine);
    if let Some(display) = display {
        if let Err(e) = display.await {
            debug!("Progress display ended abnormally: {}", e);
        }
    }
    let summary = result?;

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| AppError::generic(format!("Summary serialization failed: {}", e)))?;
        println!("{}", json);
    } else if !quiet {
        print_summary(&summary);
    }

    if !summary.is_clean() {
        warn!("Run completed with problems");
    }
    Ok(())
}

/// Handle the plan command: a dry run that always prints its summary
pub async fn handle_plan(args: PlanArgs, config_file: Option<PathBuf>) -> Result<()> {
    handle_run(args.into(), config_file, false).await
}

/// Runtime configuration with command-line overrides applied
pub fn engine_config(app_config: &AppConfig, args: &RunArgs) -> Result<EngineConfig> {
    let mut config = app_config.to_runtime_config()?;
    config.mover.dry_run = args.dry_run;
    config.force_refresh = args.force_refresh;
    if let Some(workers) = args.workers {
        config.mover.worker_count = workers;
    }
    config.validate()?;
    Ok(config)
}

fn print_summary(summary: &RunSummary) {
    if summary.dry_run {
        println!("\n📋 Plan:");
    } else {
        println!("\n📊 Sync Summary:");
    }
    println!("  Decision: {:?}", summary.decision);
    println!("  Candidates: {}", summary.candidates);
    println!("  Evictions: {}", summary.evictions);
    if summary.dry_run {
        println!("  Moves planned: {}", summary.planned);
    } else {
        println!("  Succeeded: {}", summary.succeeded);
        println!("  Partially succeeded: {}", summary.partially_succeeded);
        println!("  Failed: {}", summary.failed);
        println!("  Moved: {}", format_bytes(summary.bytes_moved));
    }
    println!("  Skipped: {}", summary.skipped);
    println!("  Time: {:.1}s", summary.elapsed.as_secs_f64());

    if let Some(space) = &summary.insufficient_space {
        println!("\n⚠️  {}", space);
    }
    if !summary.failures.is_empty() {
        println!("\nFailures:");
        for failure in &summary.failures {
            println!("  • {} ({}): {}", failure.title, failure.direction, failure.detail);
        }
    }
    if !summary.skips.is_empty() {
        println!("\nSkipped:");
        for skip in &summary.skips {
            println!("  • {} ({}): {}", skip.title, skip.direction, skip.detail);
        }
    }
    if !summary.degradations.is_empty() {
        println!("\nWarnings:");
        for degradation in &summary.degradations {
            println!("  • {}", degradation);
        }
    }
}

/// Handle configuration commands
pub async fn handle_config(args: ConfigArgs, config_file: Option<PathBuf>) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let path = match path {
                Some(path) => path,
                None => AppConfig::default_config_path()?,
            };
            if path.exists() && !force {
                println!("📁 Configuration already exists: {}", path.display());
                println!("   Use --force to overwrite it.");
                return Ok(());
            }
            AppConfig::write_default(&path).await?;
            println!("📁 Wrote default configuration to {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = AppConfig::load(config_file).await?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        ConfigAction::Validate => {
            let config = AppConfig::load(config_file).await?;
            match config.to_runtime_config() {
                Ok(runtime) => {
                    println!(
                        "✅ Configuration is valid ({} libraries, {} user profiles)",
                        runtime.libraries.len(),
                        runtime.users.len()
                    );
                    Ok(())
                }
                Err(ConfigError::ValidationFailed { errors }) => {
                    println!("❌ Configuration has {} problems:", errors.len());
                    for error in &errors {
                        println!("  • {}", error);
                    }
                    Err(ConfigError::ValidationFailed { errors }.into())
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Handle state commands
pub async fn handle_state(args: StateArgs, config_file: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_file).await?;
    let state_dir = config
        .state
        .state_dir
        .clone()
        .unwrap_or_else(default_state_dir);
    let max_age = Duration::from_secs(config.state.decision_max_age_hours * 60 * 60);
    let decisions = DecisionCache::in_dir(&state_dir, max_age);
    let ledger_path = CacheLedger::path_in(&state_dir);

    match args.action {
        StateAction::Show { detailed } => {
            println!("💾 PlexCache State");
            println!("==================");
            println!("Location: {}", state_dir.display());

            match decisions.peek().await {
                Some(entry) => {
                    let expired = entry.is_expired(max_age, Utc::now());
                    println!(
                        "Decision: {} candidates, {} evictions, computed {}{}",
                        entry.candidates.len(),
                        entry.evictions.len(),
                        entry.computed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        if expired { " (expired)" } else { "" }
                    );
                    println!("Fingerprint: {}", entry.fingerprint);
                }
                None => println!("Decision: none stored"),
            }

            let ledger = CacheLedger::load(&ledger_path).await?;
            println!("Ledger: {} items on cache", ledger.len());
            if detailed {
                for entry in ledger.entries() {
                    println!(
                        "  • {} → {}",
                        entry.item.display_name(),
                        entry.target.cache_path.display()
                    );
                }
            }
            Ok(())
        }
        StateAction::Clear { ledger } => {
            decisions.invalidate_all().await?;
            println!("🗑️  Cleared stored decision");
            if ledger {
                let mut cache_ledger = CacheLedger::new(ledger_path);
                if cache_ledger.clear().await? {
                    println!("🗑️  Cleared cache ledger");
                }
            }
            Ok(())
        }
    }
}
