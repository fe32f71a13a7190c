//! Shared fixtures for integration tests
//!
//! A temporary array and cache tier with one TV library, a series of
//! episodes on the array, and a catalog snapshot describing them.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;

use plexcache::app::catalog::{CatalogSnapshot, SnapshotCatalog};
use plexcache::app::models::{MediaId, MediaItem, MediaKind};
use plexcache::app::{EngineConfig, LibraryMapping, Notifier, RunSummary};

pub const SHOW_ID: &str = "severance";
pub const EPISODE_BYTES: usize = 64;

/// Temporary two-tier storage layout
pub struct Tiers {
    pub dir: TempDir,
}

impl Tiers {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn array_root(&self) -> PathBuf {
        self.dir.path().join("user/tv")
    }

    pub fn cache_root(&self) -> PathBuf {
        self.dir.path().join("cache/tv")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn relative(n: u32) -> PathBuf {
        PathBuf::from(format!("Severance/Season 01/S01E{:02}.mkv", n))
    }

    pub fn array_path(&self, n: u32) -> PathBuf {
        self.array_root().join(Self::relative(n))
    }

    pub fn cache_path(&self, n: u32) -> PathBuf {
        self.cache_root().join(Self::relative(n))
    }

    /// Catalog item for episode `n`, pointing at the array copy
    pub fn episode(&self, n: u32) -> MediaItem {
        MediaItem {
            id: MediaId::new(episode_id(n)),
            title: format!("Episode {}", n),
            kind: MediaKind::Episode {
                show_id: SHOW_ID.to_string(),
                show_title: "Severance".to_string(),
                season: 1,
                episode: n,
            },
            path: self.array_path(n),
            library: "TV".to_string(),
            added_at: Utc::now() - ChronoDuration::days(7),
            size_bytes: Some(EPISODE_BYTES as u64),
            subtitles: Vec::new(),
        }
    }

    /// Put episodes `1..=count` on the array
    pub async fn seed_array(&self, count: u32) {
        for n in 1..=count {
            write_file(&self.array_path(n), EPISODE_BYTES).await;
        }
    }

    /// Snapshot with an owner (id "1") and `count` episodes
    pub fn snapshot(&self, count: u32) -> CatalogSnapshot {
        let mut snapshot = CatalogSnapshot::default().with_user("1", "owner", true, false);
        for n in 1..=count {
            snapshot = snapshot.with_item(self.episode(n));
        }
        snapshot
    }

    /// Engine configuration over this layout
    pub fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::default()
            .with_libraries(vec![LibraryMapping::new(
                "TV",
                self.array_root(),
                self.cache_root(),
            )])
            .with_state_dir(self.state_dir());
        config.mover.worker_count = 2;
        config
    }
}

pub fn episode_id(n: u32) -> String {
    format!("ep{}", n)
}

pub fn catalog(snapshot: CatalogSnapshot) -> Arc<SnapshotCatalog> {
    Arc::new(SnapshotCatalog::new(snapshot))
}

pub async fn write_file(path: &Path, len: usize) {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.unwrap();
    }
    tokio::fs::write(path, vec![b'x'; len]).await.unwrap();
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Notifier that keeps every summary it receives
#[derive(Default)]
pub struct RecordingNotifier {
    pub summaries: Mutex<Vec<RunSummary>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, summary: &RunSummary) {
        self.summaries.lock().unwrap().push(summary.clone());
    }
}
