//! Cache inventory ledger
//!
//! Records every item the engine placed on the cache tier, with its resolved
//! target. The ledger is what the eviction engine considers "currently
//! cached"; files that vanish from the cache behind the engine's back are
//! pruned when it is loaded.

pub mod cleanup;
pub mod exclude;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::models::{MediaId, MediaItem};
use crate::app::paths::CacheTarget;
use crate::app::state;
use crate::constants::state::LEDGER_FILE;
use crate::errors::StateResult;

pub use cleanup::remove_empty_dirs;
pub use exclude::write_exclude_file;

/// One item on the cache tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub item: MediaItem,
    pub target: CacheTarget,
    /// Subtitles on the cache tier, as `(cache path, array path)` pairs
    #[serde(default)]
    pub subtitles: Vec<(PathBuf, PathBuf)>,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredLedger {
    entries: BTreeMap<MediaId, LedgerEntry>,
}

/// File-backed record of cached items
#[derive(Debug, Clone)]
pub struct CacheLedger {
    path: PathBuf,
    entries: BTreeMap<MediaId, LedgerEntry>,
}

impl CacheLedger {
    /// Empty ledger that will be saved to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Ledger path inside a state directory
    pub fn path_in(state_dir: &Path) -> PathBuf {
        state_dir.join(LEDGER_FILE)
    }

    /// Load the ledger; a missing file is an empty ledger
    pub async fn load(path: impl Into<PathBuf>) -> StateResult<Self> {
        let path = path.into();
        let stored: StoredLedger = state::read_json(&path).await?.unwrap_or_default();
        debug!(
            "Loaded {} ledger entries from {}",
            stored.entries.len(),
            path.display()
        );
        Ok(Self {
            path,
            entries: stored.entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop entries whose cache file no longer exists
    pub async fn prune_missing(&mut self) -> Vec<LedgerEntry> {
        let mut missing = Vec::new();
        for (id, entry) in &self.entries {
            if tokio::fs::metadata(&entry.target.cache_path).await.is_err() {
                missing.push(id.clone());
            }
        }

        let pruned: Vec<LedgerEntry> = missing
            .iter()
            .filter_map(|id| self.entries.remove(id))
            .collect();
        if !pruned.is_empty() {
            info!("Pruned {} ledger entries with no cache file", pruned.len());
        }
        pruned
    }

    /// Record an item as cached
    pub fn record_cached(
        &mut self,
        item: MediaItem,
        target: CacheTarget,
        subtitles: Vec<(PathBuf, PathBuf)>,
        cached_at: DateTime<Utc>,
    ) {
        let id = item.id.clone();
        self.entries.insert(
            id,
            LedgerEntry {
                item,
                target,
                subtitles,
                cached_at,
            },
        );
    }

    /// Forget an item that went back to the array tier
    pub fn record_evicted(&mut self, id: &MediaId) -> Option<LedgerEntry> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &MediaId) -> Option<&LedgerEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &MediaId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values()
    }

    /// The cached inventory as media items
    pub fn items(&self) -> Vec<MediaItem> {
        self.entries.values().map(|e| e.item.clone()).collect()
    }

    /// Every cache-tier path the ledger owns
    pub fn cache_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .values()
            .flat_map(|e| {
                std::iter::once(e.target.cache_path.clone())
                    .chain(e.subtitles.iter().map(|(cache, _)| cache.clone()))
            })
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist atomically
    pub async fn save(&self) -> StateResult<()> {
        let stored = StoredLedger {
            entries: self.entries.clone(),
        };
        state::write_json(&self.path, &stored).await
    }

    /// Remove the backing file
    pub async fn clear(&mut self) -> StateResult<bool> {
        self.entries.clear();
        state::remove_if_exists(&self.path).await
    }
}
