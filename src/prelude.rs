//! Prelude module for PlexCache Library
//!
//! Re-exports the items needed to configure and drive a sync run with a single
//! `use plexcache::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use plexcache::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?.to_runtime_config()?;
//!     let catalog = SnapshotCatalog::load(Path::new("catalog.json")).await?;
//!
//!     let engine = SyncEngine::new(config, Arc::new(catalog))?;
//!     let summary = engine.run_until_signal().await?;
//!     println!("{}", summary.headline());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Configuration
pub use crate::config::AppConfig;

pub use crate::app::{
    // Orchestration
    EngineConfig,
    RunSummary,
    StopSignal,
    SyncEngine,

    // Catalog
    CatalogClient,
    CatalogSnapshot,
    SnapshotCatalog,

    // Data types
    LibraryMapping,
    MediaId,
    MediaItem,
    UserProfile,

    // Summary delivery
    LogNotifier,
    Notifier,
};
