//! Candidate selection engine
//!
//! For every participating user the engine walks the on-deck queue and the
//! watchlist in catalog order. Series entries expand into upcoming unwatched
//! episodes, skip lists are applied before expansion and the age filter after
//! it. Contributions are unioned into one [`CandidateSet`].

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::types::{CandidateOutcome, CandidateReason, CandidateSet};
use super::{Lookahead, SelectionSettings};
use crate::app::catalog::CatalogClient;
use crate::app::models::{MediaItem, MediaKind, QueueEntry, UserContext};
use crate::errors::{CatalogError, CatalogFetchError};

/// Compute the candidate set for `users`
///
/// A user on the global skip list, or with both sources disabled, is not
/// attempted. Any catalog failure while processing a user discards that
/// user's whole contribution and is recorded in the outcome.
pub async fn select_candidates(
    catalog: &dyn CatalogClient,
    users: &[UserContext],
    settings: &SelectionSettings,
    now: DateTime<Utc>,
) -> CandidateOutcome {
    let mut outcome = CandidateOutcome::default();
    let mut candidates = CandidateSet::new();

    for user in users {
        if settings.skips_user(user) {
            debug!("Skipping user {} (global skip list)", user.name);
            continue;
        }
        if !user.on_deck && !user.watchlist {
            debug!("Skipping user {} (no sources enabled)", user.name);
            continue;
        }

        outcome.users_attempted += 1;
        match collect_user(catalog, user, settings, now).await {
            Ok(contribution) => {
                debug!(
                    "User {} contributed {} items ({} aged out)",
                    user.name,
                    contribution.items.len(),
                    contribution.aged_out
                );
                outcome.aged_out += contribution.aged_out;
                for (item, reason) in contribution.items {
                    candidates.insert(item, reason);
                }
            }
            Err(failure) => {
                warn!("Discarding contribution of user {}: {}", user.name, failure);
                outcome.users_failed += 1;
                outcome.failures.push(failure);
            }
        }
    }

    candidates.sort_by_priority();
    info!(
        "Selected {} candidates from {} users ({} failed)",
        candidates.len(),
        outcome.users_attempted,
        outcome.users_failed
    );
    outcome.candidates = candidates;
    outcome
}

#[derive(Default)]
struct Contribution {
    items: Vec<(MediaItem, CandidateReason)>,
    aged_out: usize,
}

impl Contribution {
    fn push(&mut self, item: MediaItem, reason: CandidateReason, lookahead: &Lookahead, now: DateTime<Utc>) {
        if let Some(max_age_days) = lookahead.max_age_days {
            if item.is_older_than(max_age_days, now) {
                debug!(
                    "{} is older than {} days, not staging",
                    item.display_name(),
                    max_age_days
                );
                self.aged_out += 1;
                return;
            }
        }
        self.items.push((item, reason));
    }
}

fn fetch_error(user: &UserContext, stage: &str, source: CatalogError) -> CatalogFetchError {
    CatalogFetchError {
        user: user.name.clone(),
        stage: stage.to_string(),
        source,
    }
}

async fn collect_user(
    catalog: &dyn CatalogClient,
    user: &UserContext,
    settings: &SelectionSettings,
    now: DateTime<Utc>,
) -> Result<Contribution, CatalogFetchError> {
    let lookahead = &settings.lookahead;
    let mut contribution = Contribution::default();

    if user.on_deck {
        let queue = catalog
            .on_deck(user, &settings.libraries)
            .await
            .map_err(|e| fetch_error(user, "on-deck", e))?;

        for (index, item) in queue.into_iter().enumerate() {
            if user.skips_title(item.series_title()) {
                debug!("User {} skips {}", user.name, item.series_title());
                continue;
            }

            let rank = index + 1;
            let expanded = expand_on_deck(catalog, user, item, lookahead.on_deck_count).await?;
            for (offset, item) in expanded.into_iter().enumerate() {
                let reason = CandidateReason::OnDeck {
                    user: user.name.clone(),
                    rank,
                    offset,
                };
                contribution.push(item, reason, lookahead, now);
            }
        }
    }

    if user.watchlist {
        let entries = catalog
            .watchlist(user, &settings.libraries)
            .await
            .map_err(|e| fetch_error(user, "watchlist", e))?;

        for (index, entry) in entries.into_iter().enumerate() {
            if user.skips_title(entry.series_title()) {
                debug!("User {} skips {}", user.name, entry.series_title());
                continue;
            }

            let rank = index + 1;
            let expanded = expand_watchlist(catalog, user, entry, lookahead.watchlist_count).await?;
            for (offset, item) in expanded.into_iter().enumerate() {
                let reason = CandidateReason::Watchlist {
                    user: user.name.clone(),
                    rank,
                    offset,
                };
                contribution.push(item, reason, lookahead, now);
            }
        }
    }

    Ok(contribution)
}

/// The on-deck item followed by the next unwatched episodes, `count` in total
async fn expand_on_deck(
    catalog: &dyn CatalogClient,
    user: &UserContext,
    item: MediaItem,
    count: usize,
) -> Result<Vec<MediaItem>, CatalogFetchError> {
    let (show_id, position) = match (&item.kind, item.episode_position()) {
        (MediaKind::Episode { show_id, .. }, Some(position)) => (show_id.clone(), position),
        _ => return Ok(vec![item]),
    };
    if count == 0 {
        return Ok(Vec::new());
    }

    let episodes = catalog
        .show_episodes(user, &show_id)
        .await
        .map_err(|e| fetch_error(user, "episodes", e))?;

    let mut expanded = Vec::with_capacity(count);
    expanded.push(item);
    expanded.extend(
        episodes
            .into_iter()
            .filter(|state| !state.watched)
            .filter(|state| {
                state
                    .item
                    .episode_position()
                    .map(|p| p > position)
                    .unwrap_or(false)
            })
            .map(|state| state.item)
            .take(count - 1),
    );
    Ok(expanded)
}

/// A watchlist entry as concrete items
async fn expand_watchlist(
    catalog: &dyn CatalogClient,
    user: &UserContext,
    entry: QueueEntry,
    count: usize,
) -> Result<Vec<MediaItem>, CatalogFetchError> {
    let show = match entry {
        QueueEntry::Item(item) => return Ok(vec![item]),
        QueueEntry::Show(show) => show,
    };
    if count == 0 {
        return Ok(Vec::new());
    }

    let episodes = catalog
        .show_episodes(user, &show.show_id)
        .await
        .map_err(|e| fetch_error(user, "episodes", e))?;

    Ok(episodes
        .into_iter()
        .filter(|state| !state.watched)
        .map(|state| state.item)
        .take(count)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::{CatalogSnapshot, SnapshotCatalog};
    use crate::app::models::{CatalogUser, MediaId, UserProfile};
    use chrono::Duration;
    use std::path::PathBuf;

    fn episode(n: u32, added_at: DateTime<Utc>) -> MediaItem {
        MediaItem {
            id: MediaId::new(format!("ep{}", n)),
            title: format!("Episode {}", n),
            kind: MediaKind::Episode {
                show_id: "show".to_string(),
                show_title: "Severance".to_string(),
                season: 1,
                episode: n,
            },
            path: PathBuf::from(format!("/tv/Severance/S01E{:02}.mkv", n)),
            library: "TV".to_string(),
            added_at,
            size_bytes: Some(100),
            subtitles: Vec::new(),
        }
    }

    fn movie(id: &str, added_at: DateTime<Utc>) -> MediaItem {
        MediaItem {
            id: MediaId::new(id),
            title: id.to_string(),
            kind: MediaKind::Movie,
            path: PathBuf::from(format!("/movies/{}.mkv", id)),
            library: "Movies".to_string(),
            added_at,
            size_bytes: Some(100),
            subtitles: Vec::new(),
        }
    }

    fn user(id: &str) -> UserContext {
        UserContext::from_catalog(
            &CatalogUser {
                id: id.to_string(),
                name: id.to_string(),
                is_owner: id == "owner",
                is_remote: id != "owner",
            },
            None,
        )
    }

    fn settings(on_deck_count: usize, watchlist_count: usize) -> SelectionSettings {
        SelectionSettings {
            libraries: Vec::new(),
            lookahead: Lookahead {
                on_deck_count,
                watchlist_count,
                max_age_days: Some(30),
            },
            skip_users: Vec::new(),
        }
    }

    fn ids(outcome: &CandidateOutcome) -> Vec<String> {
        outcome
            .candidates
            .iter()
            .map(|c| c.item.id.to_string())
            .collect()
    }

    fn ten_episode_show(now: DateTime<Utc>) -> CatalogSnapshot {
        let mut snapshot = CatalogSnapshot::default().with_user("owner", "owner", true, false);
        for n in 1..=10 {
            snapshot = snapshot.with_item(episode(n, now));
        }
        snapshot
    }

    /// Test on-deck lookahead
    ///
    /// Unwatched episode 4 on deck with a lookahead of 2 stages episodes 4
    /// and 5 only.
    #[tokio::test]
    async fn test_on_deck_expansion() {
        let now = Utc::now();
        let mut snapshot = ten_episode_show(now).with_on_deck("owner", "ep4");
        for n in 1..=3 {
            snapshot.mark_watched("owner", &format!("ep{}", n));
        }
        let catalog = SnapshotCatalog::new(snapshot);

        let outcome =
            select_candidates(&catalog, &[user("owner")], &settings(2, 0), now).await;

        assert_eq!(ids(&outcome), vec!["ep4", "ep5"]);
        assert!(outcome.failures.is_empty());
    }

    /// Test expansion skips watched episodes and stops early
    ///
    /// Already watched upcoming episodes are passed over, and the expansion
    /// stops at the end of the series.
    #[tokio::test]
    async fn test_on_deck_skips_watched_and_stops_early() {
        let now = Utc::now();
        let snapshot = ten_episode_show(now)
            .with_on_deck("owner", "ep8")
            .with_watched("owner", "ep9");
        let catalog = SnapshotCatalog::new(snapshot);

        let outcome =
            select_candidates(&catalog, &[user("owner")], &settings(5, 0), now).await;

        assert_eq!(ids(&outcome), vec!["ep8", "ep10"]);
    }

    /// Test watchlist expansion
    ///
    /// A watchlisted series contributes its first unwatched episodes; a
    /// watchlisted movie contributes itself.
    #[tokio::test]
    async fn test_watchlist_expansion() {
        let now = Utc::now();
        let snapshot = ten_episode_show(now)
            .with_item(movie("film", now))
            .with_watched("owner", "ep1")
            .with_watchlist_show("owner", "show")
            .with_watchlist_item("owner", "film");
        let catalog = SnapshotCatalog::new(snapshot);

        let outcome =
            select_candidates(&catalog, &[user("owner")], &settings(1, 3), now).await;

        assert_eq!(ids(&outcome), vec!["ep2", "ep3", "ep4", "film"]);
    }

    /// Test age filter
    ///
    /// An item added before the cutoff never becomes a candidate, even as the
    /// first on-deck entry.
    #[tokio::test]
    async fn test_age_filter() {
        let now = Utc::now();
        let snapshot = CatalogSnapshot::default()
            .with_user("owner", "owner", true, false)
            .with_item(movie("ancient", now - Duration::days(31)))
            .with_item(movie("recent", now - Duration::days(2)))
            .with_on_deck("owner", "ancient")
            .with_on_deck("owner", "recent");
        let catalog = SnapshotCatalog::new(snapshot);

        let outcome =
            select_candidates(&catalog, &[user("owner")], &settings(1, 1), now).await;

        assert_eq!(ids(&outcome), vec!["recent"]);
        assert_eq!(outcome.aged_out, 1);
    }

    /// Test per-user failure isolation
    ///
    /// An unauthorized remote user contributes nothing and is recorded; the
    /// owner's contribution is unaffected and the pass is not a total failure.
    #[tokio::test]
    async fn test_user_failure_is_isolated() {
        let now = Utc::now();
        let snapshot = CatalogSnapshot::default()
            .with_user("owner", "owner", true, false)
            .with_user("friend", "friend", false, true)
            .with_item(movie("a", now))
            .with_item(movie("b", now))
            .with_on_deck("owner", "a")
            .with_on_deck("friend", "b")
            .with_unauthorized("friend");
        let catalog = SnapshotCatalog::new(snapshot);

        let outcome = select_candidates(
            &catalog,
            &[user("owner"), user("friend")],
            &settings(1, 1),
            now,
        )
        .await;

        assert_eq!(ids(&outcome), vec!["a"]);
        assert_eq!(outcome.users_failed, 1);
        assert_eq!(outcome.failures[0].user, "friend");
        assert!(!outcome.all_users_failed());
    }

    /// Test skip lists
    ///
    /// Globally skipped users are not fetched; per-user skip titles suppress a
    /// series before it expands.
    #[tokio::test]
    async fn test_skip_lists() {
        let now = Utc::now();
        let snapshot = ten_episode_show(now)
            .with_user("guest", "guest", false, true)
            .with_item(movie("film", now))
            .with_on_deck("owner", "ep1")
            .with_on_deck("owner", "film")
            .with_on_deck("guest", "film");
        let catalog = SnapshotCatalog::new(snapshot);

        let mut owner = UserContext::from_catalog(
            &CatalogUser {
                id: "owner".to_string(),
                name: "owner".to_string(),
                is_owner: true,
                is_remote: false,
            },
            Some(&UserProfile {
                skip_titles: vec!["severance".to_string()],
                ..UserProfile::new("owner")
            }),
        );
        owner.watchlist = false;

        let mut selection = settings(3, 0);
        selection.skip_users = vec!["guest".to_string()];

        let outcome = select_candidates(&catalog, &[owner, user("guest")], &selection, now).await;

        assert_eq!(ids(&outcome), vec!["film"]);
        assert_eq!(outcome.users_attempted, 1);
        let reasons = &outcome.candidates.iter().next().unwrap().reasons;
        assert_eq!(reasons.len(), 1);
        assert_eq!(reasons[0].user(), "owner");
    }

    #[tokio::test]
    async fn test_all_users_failed() {
        let now = Utc::now();
        let mut snapshot = CatalogSnapshot::default().with_user("owner", "owner", true, false);
        snapshot.offline = true;
        let catalog = SnapshotCatalog::new(snapshot);

        let outcome =
            select_candidates(&catalog, &[user("owner")], &settings(1, 1), now).await;

        assert!(outcome.all_users_failed());
        assert!(outcome.candidates.is_empty());
    }
}
