//! Core application logic for PlexCache
//!
//! This module contains the engine components: catalog access, candidate and
//! eviction selection, path mapping, the migration executor, cache state and
//! run orchestration.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use plexcache::app::{EngineConfig, LibraryMapping, SnapshotCatalog, StopSignal, SyncEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Catalog export produced by the media server
//! let catalog = SnapshotCatalog::load(Path::new("catalog.json")).await?;
//!
//! let config = EngineConfig::default().with_libraries(vec![LibraryMapping::new(
//!     "Movies",
//!     "/mnt/user/media/movies",
//!     "/mnt/cache/media/movies",
//! )]);
//!
//! let engine = SyncEngine::new(config, Arc::new(catalog))?;
//! let summary = engine.run(&StopSignal::new()).await?;
//! println!("{}", summary.headline());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod coordinator;
pub mod decision;
pub mod guard;
pub mod inventory;
pub mod models;
pub mod mover;
pub mod notify;
pub mod paths;
pub mod selection;
pub mod state;
pub mod subtitles;
pub mod users;

// Re-export main public API
pub use catalog::{CatalogClient, CatalogSnapshot, SnapshotCatalog, TimeoutCatalog};
pub use coordinator::{DecisionSource, EngineConfig, RunSummary, SyncEngine, TaskNote};
pub use decision::{DecisionCache, DecisionCacheEntry, Fingerprint};
pub use guard::{GuardOutcome, SessionGuard};
pub use inventory::{CacheLedger, LedgerEntry};
pub use models::{
    CatalogUser, MediaId, MediaItem, MediaKind, QueueEntry, Session, UserContext, UserProfile,
};
pub use mover::{
    AdmissionPolicy, ExecutionReport, FreeSpaceProbe, MigrationExecutor, MigrationOutcome,
    MigrationTask, MoverConfig, StatvfsProbe, StopSignal, TransferDirection,
};
pub use notify::{LogNotifier, Notifier};
pub use paths::{CacheTarget, LibraryMapping, PathResolver};
pub use selection::{CandidateSet, EvictionSet, Lookahead, SelectionSettings};
pub use subtitles::SubtitleFinder;
