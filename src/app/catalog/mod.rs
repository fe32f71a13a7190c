//! Catalog collaborator interface
//!
//! The engine never talks to a media server directly. Everything it needs
//! (users, on-deck queues, watchlists, per-user watched state and active
//! sessions) comes through [`CatalogClient`]. Every call may fail per user;
//! callers degrade that user's contribution instead of aborting.
//!
//! - [`snapshot`] - a client backed by a JSON catalog export
//! - [`TimeoutCatalog`] - decorator bounding every call with a timeout

pub mod snapshot;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::app::models::{
    CatalogUser, EpisodeState, MediaId, MediaItem, QueueEntry, Session, UserContext, WatchState,
};
use crate::errors::{CatalogError, CatalogResult};

pub use snapshot::{CatalogSnapshot, SnapshotCatalog};

/// Read-only view of the media server catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Every account known to the server
    async fn list_users(&self) -> CatalogResult<Vec<CatalogUser>>;

    /// The user's continue-watching queue, in catalog priority order
    async fn on_deck(&self, user: &UserContext, libraries: &[String])
        -> CatalogResult<Vec<MediaItem>>;

    /// The user's watchlist, in catalog order
    async fn watchlist(
        &self,
        user: &UserContext,
        libraries: &[String],
    ) -> CatalogResult<Vec<QueueEntry>>;

    /// All episodes of a series in airing order, with this user's watched flags
    async fn show_episodes(
        &self,
        user: &UserContext,
        show_id: &str,
    ) -> CatalogResult<Vec<EpisodeState>>;

    /// Whether the user has fully watched an item
    async fn watched_status(&self, user: &UserContext, media_id: &MediaId)
        -> CatalogResult<WatchState>;

    /// Streams playing right now
    async fn active_sessions(&self) -> CatalogResult<Vec<Session>>;
}

/// Decorator applying a timeout to every call of an inner client
pub struct TimeoutCatalog {
    inner: Arc<dyn CatalogClient>,
    timeout: Duration,
}

impl TimeoutCatalog {
    /// Wrap `inner`, bounding each call by `timeout`
    pub fn new(inner: Arc<dyn CatalogClient>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &str, call: F) -> CatalogResult<T>
    where
        F: Future<Output = CatalogResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Catalog call {} exceeded {:?}, treating as failed",
                    operation, self.timeout
                );
                Err(CatalogError::Timeout {
                    operation: operation.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl CatalogClient for TimeoutCatalog {
    async fn list_users(&self) -> CatalogResult<Vec<CatalogUser>> {
        self.bounded("list_users", self.inner.list_users()).await
    }

    async fn on_deck(
        &self,
        user: &UserContext,
        libraries: &[String],
    ) -> CatalogResult<Vec<MediaItem>> {
        self.bounded("on_deck", self.inner.on_deck(user, libraries))
            .await
    }

    async fn watchlist(
        &self,
        user: &UserContext,
        libraries: &[String],
    ) -> CatalogResult<Vec<QueueEntry>> {
        self.bounded("watchlist", self.inner.watchlist(user, libraries))
            .await
    }

    async fn show_episodes(
        &self,
        user: &UserContext,
        show_id: &str,
    ) -> CatalogResult<Vec<EpisodeState>> {
        self.bounded("show_episodes", self.inner.show_episodes(user, show_id))
            .await
    }

    async fn watched_status(
        &self,
        user: &UserContext,
        media_id: &MediaId,
    ) -> CatalogResult<WatchState> {
        self.bounded("watched_status", self.inner.watched_status(user, media_id))
            .await
    }

    async fn active_sessions(&self) -> CatalogResult<Vec<Session>> {
        self.bounded("active_sessions", self.inner.active_sessions())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowCatalog;

    #[async_trait]
    impl CatalogClient for SlowCatalog {
        async fn list_users(&self) -> CatalogResult<Vec<CatalogUser>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn on_deck(&self, _: &UserContext, _: &[String]) -> CatalogResult<Vec<MediaItem>> {
            Ok(Vec::new())
        }

        async fn watchlist(&self, _: &UserContext, _: &[String]) -> CatalogResult<Vec<QueueEntry>> {
            Ok(Vec::new())
        }

        async fn show_episodes(&self, _: &UserContext, _: &str) -> CatalogResult<Vec<EpisodeState>> {
            Ok(Vec::new())
        }

        async fn watched_status(&self, _: &UserContext, _: &MediaId) -> CatalogResult<WatchState> {
            Ok(WatchState::Unknown)
        }

        async fn active_sessions(&self) -> CatalogResult<Vec<Session>> {
            Ok(Vec::new())
        }
    }

    /// Test timeout decorator
    ///
    /// A call exceeding the timeout becomes `CatalogError::Timeout`; fast calls
    /// pass through unchanged.
    #[tokio::test]
    async fn test_timeout_catalog() {
        let catalog = TimeoutCatalog::new(Arc::new(SlowCatalog), Duration::from_millis(20));

        let slow = catalog.list_users().await;
        assert!(matches!(
            slow,
            Err(CatalogError::Timeout { ref operation, .. }) if operation == "list_users"
        ));

        let fast = catalog.active_sessions().await;
        assert_eq!(fast, Ok(Vec::new()));
    }
}
