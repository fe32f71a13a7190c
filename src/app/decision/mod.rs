//! Decision cache
//!
//! Memoizes the outcome of a selection pass (candidates plus evictions) across
//! runs, keyed by a [`Fingerprint`] of the pass inputs. The backing store is a
//! single JSON file holding one whole entry, replaced atomically on every
//! write, so a reader never sees candidates from one pass paired with
//! evictions from another.
//!
//! Lookups never fail: a missing, corrupt, expired or foreign-fingerprint file
//! is a miss, and the caller recomputes.

pub mod fingerprint;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::selection::{CandidateSet, EvictionSet};
use crate::app::state;
use crate::constants::state::{DECISION_FILE, DECISION_FORMAT_VERSION};
use crate::errors::StateResult;

pub use fingerprint::{Fingerprint, FingerprintInput};

/// A memoized selection pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCacheEntry {
    /// Inputs this entry was computed from
    pub fingerprint: Fingerprint,
    /// Items that belong on the cache tier
    pub candidates: CandidateSet,
    /// Items that must return to the array tier
    pub evictions: EvictionSet,
    /// When the pass ran
    pub computed_at: DateTime<Utc>,
}

impl DecisionCacheEntry {
    /// Bundle a freshly computed pass
    pub fn new(
        fingerprint: Fingerprint,
        candidates: CandidateSet,
        evictions: EvictionSet,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint,
            candidates,
            evictions,
            computed_at,
        }
    }

    /// Whether the entry is older than `max_age` at `now`
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => self.computed_at + max_age < now,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredDecision {
    version: u32,
    entry: DecisionCacheEntry,
}

/// File-backed decision cache
#[derive(Debug, Clone)]
pub struct DecisionCache {
    path: PathBuf,
    max_age: Duration,
}

impl DecisionCache {
    /// Cache stored at `path`; entries older than `max_age` are misses
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    /// Cache stored under a state directory
    pub fn in_dir(state_dir: &Path, max_age: Duration) -> Self {
        Self::new(state_dir.join(DECISION_FILE), max_age)
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry for `fingerprint`, if one is stored and still fresh
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<DecisionCacheEntry> {
        self.get_at(fingerprint, Utc::now()).await
    }

    /// [`DecisionCache::get`] evaluated at a given instant
    pub async fn get_at(
        &self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Option<DecisionCacheEntry> {
        let entry = self.peek().await?;

        if &entry.fingerprint != fingerprint {
            debug!(
                "Decision cache miss: stored fingerprint {} differs from {}",
                entry.fingerprint, fingerprint
            );
            return None;
        }
        if entry.is_expired(self.max_age, now) {
            debug!(
                "Decision cache miss: entry from {} is older than {:?}",
                entry.computed_at, self.max_age
            );
            return None;
        }

        debug!("Decision cache hit for {}", fingerprint);
        Some(entry)
    }

    /// The stored entry, whatever its fingerprint, unless it expired by `now`
    ///
    /// Used when the catalog is down and the current fingerprint cannot be
    /// computed.
    pub async fn latest_at(&self, now: DateTime<Utc>) -> Option<DecisionCacheEntry> {
        self.peek()
            .await
            .filter(|entry| !entry.is_expired(self.max_age, now))
    }

    /// The stored entry regardless of fingerprint or age
    pub async fn peek(&self) -> Option<DecisionCacheEntry> {
        match state::read_json::<StoredDecision>(&self.path).await {
            Ok(Some(stored)) if stored.version == DECISION_FORMAT_VERSION => Some(stored.entry),
            Ok(Some(stored)) => {
                debug!(
                    "Ignoring decision cache format version {} (expected {})",
                    stored.version, DECISION_FORMAT_VERSION
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Decision cache unreadable, recomputing: {}", e);
                None
            }
        }
    }

    /// Replace the stored entry with `entry` under `fingerprint`
    pub async fn put(&self, fingerprint: &Fingerprint, mut entry: DecisionCacheEntry) -> StateResult<()> {
        entry.fingerprint = *fingerprint;
        let stored = StoredDecision {
            version: DECISION_FORMAT_VERSION,
            entry,
        };
        state::write_json(&self.path, &stored).await?;
        debug!("Stored decision for {} at {}", fingerprint, self.path.display());
        Ok(())
    }

    /// Drop every stored entry
    pub async fn invalidate_all(&self) -> StateResult<()> {
        if state::remove_if_exists(&self.path).await? {
            info!("Decision cache invalidated");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{CatalogUser, MediaId, MediaItem, MediaKind, UserContext};
    use crate::app::selection::{CandidateReason, Lookahead, SelectionSettings};
    use tempfile::TempDir;

    fn settings(on_deck_count: usize) -> SelectionSettings {
        SelectionSettings {
            libraries: vec!["Movies".to_string()],
            lookahead: Lookahead {
                on_deck_count,
                watchlist_count: 1,
                max_age_days: None,
            },
            skip_users: Vec::new(),
        }
    }

    fn fingerprint(on_deck_count: usize) -> Fingerprint {
        let owner = CatalogUser {
            id: "1".to_string(),
            name: "owner".to_string(),
            is_owner: true,
            is_remote: false,
        };
        let users = vec![UserContext::from_catalog(&owner, None)];
        let selection = settings(on_deck_count);
        Fingerprint::compute(&FingerprintInput {
            users: &users,
            selection: &selection,
        })
    }

    fn entry(fp: Fingerprint, computed_at: DateTime<Utc>) -> DecisionCacheEntry {
        let item = MediaItem {
            id: MediaId::new("m1"),
            title: "Film".to_string(),
            kind: MediaKind::Movie,
            path: PathBuf::from("/movies/film.mkv"),
            library: "Movies".to_string(),
            added_at: computed_at,
            size_bytes: Some(10),
            subtitles: Vec::new(),
        };
        let mut candidates = CandidateSet::new();
        candidates.insert(
            item,
            CandidateReason::OnDeck {
                user: "owner".to_string(),
                rank: 1,
                offset: 0,
            },
        );
        DecisionCacheEntry::new(fp, candidates, EvictionSet::new(), computed_at)
    }

    /// Test decision cache round trip
    ///
    /// `put(f, e)` followed by `get(f)` returns `e`; a changed lookahead
    /// produces a different fingerprint and therefore a miss.
    #[tokio::test]
    async fn test_put_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = DecisionCache::in_dir(dir.path(), Duration::from_secs(3600));
        let fp = fingerprint(2);
        let stored = entry(fp, Utc::now());

        cache.put(&fp, stored.clone()).await.unwrap();
        assert_eq!(cache.get(&fp).await, Some(stored));

        let changed = fingerprint(3);
        assert_ne!(changed, fp);
        assert_eq!(cache.get(&changed).await, None);
    }

    /// Test expiry and invalidation
    ///
    /// Entries past their maximum age are misses; `invalidate_all` drops the
    /// entry and is idempotent.
    #[tokio::test]
    async fn test_expiry_and_invalidate() {
        let dir = TempDir::new().unwrap();
        let cache = DecisionCache::in_dir(dir.path(), Duration::from_secs(60));
        let fp = fingerprint(2);
        let computed_at = Utc::now();

        cache.put(&fp, entry(fp, computed_at)).await.unwrap();
        assert!(cache
            .get_at(&fp, computed_at + chrono::Duration::seconds(30))
            .await
            .is_some());
        assert!(cache
            .get_at(&fp, computed_at + chrono::Duration::seconds(61))
            .await
            .is_none());

        cache.invalidate_all().await.unwrap();
        assert!(cache.peek().await.is_none());
        cache.invalidate_all().await.unwrap();
    }

    /// Test latest entry lookup
    ///
    /// Any fingerprint is returned while fresh; an expired entry is not.
    #[tokio::test]
    async fn test_latest_ignores_fingerprint_but_not_age() {
        let dir = TempDir::new().unwrap();
        let cache = DecisionCache::in_dir(dir.path(), Duration::from_secs(60));
        let fp = fingerprint(4);
        let computed_at = Utc::now();

        cache.put(&fp, entry(fp, computed_at)).await.unwrap();
        assert!(cache.get_at(&fingerprint(2), computed_at).await.is_none());
        assert_eq!(
            cache.latest_at(computed_at).await.unwrap().fingerprint,
            fp
        );
        assert!(cache
            .latest_at(computed_at + chrono::Duration::seconds(61))
            .await
            .is_none());
    }

    /// Test corrupt backing store
    ///
    /// A truncated file reads as a miss instead of an error, and the next put
    /// replaces it.
    #[tokio::test]
    async fn test_corrupt_file_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = DecisionCache::in_dir(dir.path(), Duration::from_secs(60));
        let fp = fingerprint(2);

        tokio::fs::write(cache.path(), b"{\"version\": 1, \"entry\": {")
            .await
            .unwrap();
        assert!(cache.get(&fp).await.is_none());

        cache.put(&fp, entry(fp, Utc::now())).await.unwrap();
        assert!(cache.get(&fp).await.is_some());
    }

    #[tokio::test]
    async fn test_put_stamps_fingerprint() {
        let dir = TempDir::new().unwrap();
        let cache = DecisionCache::in_dir(dir.path(), Duration::from_secs(60));
        let stale = entry(fingerprint(9), Utc::now());
        let fp = fingerprint(2);

        cache.put(&fp, stale).await.unwrap();
        assert_eq!(cache.get(&fp).await.unwrap().fingerprint, fp);
    }
}
