//! Eviction selection engine
//!
//! An item currently on the cache tier is evicted only when it is no longer a
//! candidate and every user counted for eviction positively reports it as
//! watched. An unknown status, for whatever reason, keeps the item on cache.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::types::{CandidateSet, EvictionOutcome, UnresolvedEviction};
use crate::app::catalog::CatalogClient;
use crate::app::models::{MediaItem, UserContext, WatchState};
use crate::errors::CatalogFetchError;

/// Compute the eviction set from the cached inventory
///
/// With no users counted for eviction nothing is evicted: there is nobody
/// whose watched status could confirm it.
pub async fn select_evictions(
    catalog: &dyn CatalogClient,
    cached_inventory: &[MediaItem],
    users: &[UserContext],
    candidates: &CandidateSet,
) -> EvictionOutcome {
    let mut outcome = EvictionOutcome::default();

    let counting: Vec<&UserContext> = users.iter().filter(|u| u.count_for_eviction).collect();
    if counting.is_empty() {
        debug!("No users count for eviction, keeping every cached item");
        return outcome;
    }

    let mut failed_users: HashSet<String> = HashSet::new();

    for item in cached_inventory {
        if candidates.contains(&item.id) {
            continue;
        }

        let mut confirmed = true;
        for user in &counting {
            match catalog.watched_status(user, &item.id).await {
                Ok(WatchState::Watched) => {}
                Ok(WatchState::Unwatched) => {
                    debug!("{} not yet watched by {}", item.display_name(), user.name);
                    confirmed = false;
                    break;
                }
                Ok(WatchState::Unknown) => {
                    outcome.unresolved.push(UnresolvedEviction {
                        media_id: item.id.clone(),
                        user: user.name.clone(),
                        reason: "watched status unknown".to_string(),
                    });
                    confirmed = false;
                    break;
                }
                Err(source) => {
                    warn!(
                        "Watched status of {} for {} unavailable: {}",
                        item.display_name(),
                        user.name,
                        source
                    );
                    outcome.unresolved.push(UnresolvedEviction {
                        media_id: item.id.clone(),
                        user: user.name.clone(),
                        reason: source.to_string(),
                    });
                    if failed_users.insert(user.name.clone()) {
                        outcome.failures.push(CatalogFetchError {
                            user: user.name.clone(),
                            stage: "watched status".to_string(),
                            source,
                        });
                    }
                    confirmed = false;
                    break;
                }
            }
        }

        if confirmed {
            debug!("Evicting {}", item.display_name());
            outcome.evictions.insert(item.clone());
        }
    }

    info!(
        "Selected {} evictions ({} unresolved)",
        outcome.evictions.len(),
        outcome.unresolved.len()
    );
    outcome
}
