//! Catalog client backed by a JSON catalog export
//!
//! A snapshot holds everything the engine asks a media server for: accounts,
//! items, per-user on-deck and watchlist queues, per-user watched sets and the
//! sessions playing at export time. Users listed as `unauthorized` fail every
//! per-user call the way a restricted remote friend does on a real server.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::CatalogClient;
use crate::app::models::{
    CatalogUser, EpisodeState, MediaId, MediaItem, MediaKind, QueueEntry, Session, ShowRef,
    UserContext, WatchState,
};
use crate::errors::{CatalogError, CatalogResult};

/// Watchlist reference inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchlistRef {
    /// A movie or single episode by id
    Item { id: MediaId },
    /// A whole series by show id
    Show { show_id: String },
}

/// Serializable catalog export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Server accounts
    #[serde(default)]
    pub users: Vec<CatalogUser>,
    /// Every known item
    #[serde(default)]
    pub items: Vec<MediaItem>,
    /// On-deck item ids per user id, in priority order
    #[serde(default)]
    pub on_deck: BTreeMap<String, Vec<MediaId>>,
    /// Watchlist entries per user id, in order
    #[serde(default)]
    pub watchlist: BTreeMap<String, Vec<WatchlistRef>>,
    /// Fully watched item ids per user id
    #[serde(default)]
    pub watched: BTreeMap<String, BTreeSet<MediaId>>,
    /// Streams playing at export time
    #[serde(default)]
    pub sessions: Vec<Session>,
    /// User ids whose per-user calls fail with an authorization error
    #[serde(default)]
    pub unauthorized: BTreeSet<String>,
    /// Every call fails with a network error
    #[serde(default)]
    pub offline: bool,
    /// Session listing fails with a network error
    #[serde(default)]
    pub sessions_unavailable: bool,
}

impl CatalogSnapshot {
    /// Add an account
    pub fn with_user(mut self, id: &str, name: &str, is_owner: bool, is_remote: bool) -> Self {
        self.users.push(CatalogUser {
            id: id.to_string(),
            name: name.to_string(),
            is_owner,
            is_remote,
        });
        self
    }

    /// Add an item
    pub fn with_item(mut self, item: MediaItem) -> Self {
        self.items.push(item);
        self
    }

    /// Append an item to a user's on-deck queue
    pub fn with_on_deck(mut self, user: &str, id: &str) -> Self {
        self.on_deck
            .entry(user.to_string())
            .or_default()
            .push(MediaId::new(id));
        self
    }

    /// Append a series to a user's watchlist
    pub fn with_watchlist_show(mut self, user: &str, show_id: &str) -> Self {
        self.watchlist
            .entry(user.to_string())
            .or_default()
            .push(WatchlistRef::Show {
                show_id: show_id.to_string(),
            });
        self
    }

    /// Append a single item to a user's watchlist
    pub fn with_watchlist_item(mut self, user: &str, id: &str) -> Self {
        self.watchlist
            .entry(user.to_string())
            .or_default()
            .push(WatchlistRef::Item { id: MediaId::new(id) });
        self
    }

    /// Mark an item watched by a user
    pub fn with_watched(mut self, user: &str, id: &str) -> Self {
        self.mark_watched(user, id);
        self
    }

    /// Add an active session
    pub fn with_session(mut self, id: &str, user: &str, device: &str) -> Self {
        self.sessions.push(Session {
            media_id: MediaId::new(id),
            user: user.to_string(),
            device: device.to_string(),
        });
        self
    }

    /// Make every per-user call for this user fail as unauthorized
    pub fn with_unauthorized(mut self, user: &str) -> Self {
        self.unauthorized.insert(user.to_string());
        self
    }

    /// Mark an item watched by a user, in place
    pub fn mark_watched(&mut self, user: &str, id: &str) {
        self.watched
            .entry(user.to_string())
            .or_default()
            .insert(MediaId::new(id));
    }

    fn item(&self, id: &MediaId) -> Option<&MediaItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    fn show_ref(&self, show_id: &str) -> Option<ShowRef> {
        self.items.iter().find_map(|item| match &item.kind {
            MediaKind::Episode {
                show_id: id,
                show_title,
                ..
            } if id == show_id => Some(ShowRef {
                show_id: id.clone(),
                title: show_title.clone(),
                library: item.library.clone(),
            }),
            _ => None,
        })
    }

    fn is_watched(&self, user: &str, id: &MediaId) -> bool {
        self.watched
            .get(user)
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }
}

/// [`CatalogClient`] serving a [`CatalogSnapshot`]
#[derive(Debug, Default)]
pub struct SnapshotCatalog {
    snapshot: RwLock<CatalogSnapshot>,
    source: Option<PathBuf>,
}

impl SnapshotCatalog {
    /// Serve an in-memory snapshot
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            source: None,
        }
    }

    /// Load a snapshot from a JSON file
    pub async fn load(path: &Path) -> CatalogResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::Snapshot {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let snapshot: CatalogSnapshot =
            serde_json::from_str(&content).map_err(|e| CatalogError::Snapshot {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(
            "Loaded catalog snapshot from {} ({} users, {} items)",
            path.display(),
            snapshot.users.len(),
            snapshot.items.len()
        );

        Ok(Self {
            snapshot: RwLock::new(snapshot),
            source: Some(path.to_path_buf()),
        })
    }

    /// File the snapshot was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Mutate the served snapshot (e.g. a user finished an episode)
    pub async fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut CatalogSnapshot),
    {
        let mut snapshot = self.snapshot.write().await;
        change(&mut snapshot);
    }

    fn check_reachable(snapshot: &CatalogSnapshot) -> CatalogResult<()> {
        if snapshot.offline {
            return Err(CatalogError::Network {
                reason: "catalog server unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn check_user(snapshot: &CatalogSnapshot, user: &UserContext) -> CatalogResult<()> {
        Self::check_reachable(snapshot)?;
        if snapshot.unauthorized.contains(&user.id) || snapshot.unauthorized.contains(&user.name) {
            debug!("Snapshot rejects user {} as unauthorized", user.name);
            return Err(CatalogError::Unauthorized {
                user: user.name.clone(),
            });
        }
        Ok(())
    }
}

fn in_libraries(library: &str, libraries: &[String]) -> bool {
    libraries.is_empty() || libraries.iter().any(|l| l == library)
}

#[async_trait]
impl CatalogClient for SnapshotCatalog {
    async fn list_users(&self) -> CatalogResult<Vec<CatalogUser>> {
        let snapshot = self.snapshot.read().await;
        Self::check_reachable(&snapshot)?;
        Ok(snapshot.users.clone())
    }

    async fn on_deck(
        &self,
        user: &UserContext,
        libraries: &[String],
    ) -> CatalogResult<Vec<MediaItem>> {
        let snapshot = self.snapshot.read().await;
        Self::check_user(&snapshot, user)?;

        Ok(snapshot
            .on_deck
            .get(&user.id)
            .into_iter()
            .flatten()
            .filter_map(|id| snapshot.item(id))
            .filter(|item| in_libraries(&item.library, libraries))
            .cloned()
            .collect())
    }

    async fn watchlist(
        &self,
        user: &UserContext,
        libraries: &[String],
    ) -> CatalogResult<Vec<QueueEntry>> {
        let snapshot = self.snapshot.read().await;
        Self::check_user(&snapshot, user)?;

        let entries = snapshot
            .watchlist
            .get(&user.id)
            .into_iter()
            .flatten()
            .filter_map(|entry| match entry {
                WatchlistRef::Item { id } => snapshot.item(id).cloned().map(QueueEntry::Item),
                WatchlistRef::Show { show_id } => snapshot.show_ref(show_id).map(QueueEntry::Show),
            })
            .filter(|entry| match entry {
                QueueEntry::Item(item) => in_libraries(&item.library, libraries),
                QueueEntry::Show(show) => in_libraries(&show.library, libraries),
            })
            .collect();

        Ok(entries)
    }

    async fn show_episodes(
        &self,
        user: &UserContext,
        show_id: &str,
    ) -> CatalogResult<Vec<EpisodeState>> {
        let snapshot = self.snapshot.read().await;
        Self::check_user(&snapshot, user)?;

        let mut episodes: Vec<EpisodeState> = snapshot
            .items
            .iter()
            .filter(|item| {
                matches!(&item.kind, MediaKind::Episode { show_id: id, .. } if id == show_id)
            })
            .map(|item| EpisodeState {
                watched: snapshot.is_watched(&user.id, &item.id),
                item: item.clone(),
            })
            .collect();

        if episodes.is_empty() {
            return Err(CatalogError::NotFound {
                kind: "show".to_string(),
                id: show_id.to_string(),
            });
        }

        episodes.sort_by_key(|state| state.item.episode_position());
        Ok(episodes)
    }

    async fn watched_status(
        &self,
        user: &UserContext,
        media_id: &MediaId,
    ) -> CatalogResult<WatchState> {
        let snapshot = self.snapshot.read().await;
        Self::check_user(&snapshot, user)?;

        if snapshot.item(media_id).is_none() {
            return Ok(WatchState::Unknown);
        }
        Ok(if snapshot.is_watched(&user.id, media_id) {
            WatchState::Watched
        } else {
            WatchState::Unwatched
        })
    }

    async fn active_sessions(&self) -> CatalogResult<Vec<Session>> {
        let snapshot = self.snapshot.read().await;
        Self::check_reachable(&snapshot)?;
        if snapshot.sessions_unavailable {
            return Err(CatalogError::Network {
                reason: "session listing unavailable".to_string(),
            });
        }
        Ok(snapshot.sessions.clone())
    }
}
