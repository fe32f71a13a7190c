//! End-to-end selection scenarios
//!
//! Each test runs the full engine against a catalog snapshot and checks where
//! the episode files end up.

mod common;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use plexcache::app::models::{MediaId, UserProfile};
use plexcache::app::mover::{FixedSpace, StopSignal};
use plexcache::app::{DecisionSource, EngineConfig, SyncEngine};
use plexcache::app::catalog::SnapshotCatalog;

use common::{catalog, Tiers};

fn engine(config: EngineConfig, catalog: &Arc<SnapshotCatalog>) -> SyncEngine {
    SyncEngine::new(config, catalog.clone())
        .unwrap()
        .with_probe(Arc::new(FixedSpace(1 << 30)))
}

/// Scenario: on-deck lookahead
///
/// Episode 4 of 10 is on deck with a lookahead of two: episodes 4 and 5 are
/// staged and nothing else.
#[tokio::test]
async fn test_on_deck_lookahead_stages_next_episodes() {
    let tiers = Tiers::new();
    tiers.seed_array(10).await;
    let snapshot = tiers
        .snapshot(10)
        .with_watched("1", "ep1")
        .with_watched("1", "ep2")
        .with_watched("1", "ep3")
        .with_on_deck("1", "ep4");
    let mut config = tiers.config();
    config.selection.lookahead.on_deck_count = 2;

    let summary = engine(config, &catalog(snapshot))
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.decision, DecisionSource::Computed);
    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.succeeded, 2);
    assert!(tiers.cache_path(4).exists());
    assert!(tiers.cache_path(5).exists());
    assert!(!tiers.array_path(4).exists());
    assert!(!tiers.cache_path(6).exists());
    assert!(tiers.array_path(6).exists());
}

/// Scenario: watched episode returns to the array
///
/// Once the only user has watched the cached episode and moved on, it is
/// evicted while the next one is staged.
#[tokio::test]
async fn test_watched_episode_is_evicted() {
    let tiers = Tiers::new();
    tiers.seed_array(6).await;
    let snapshot = tiers.snapshot(6).with_on_deck("1", "ep3");
    let catalog = catalog(snapshot);
    let mut config = tiers.config();
    config.selection.lookahead.on_deck_count = 1;

    engine(config.clone(), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    assert!(tiers.cache_path(3).exists());

    catalog
        .update(|snapshot| {
            snapshot.mark_watched("1", "ep3");
            snapshot
                .on_deck
                .insert("1".to_string(), vec![MediaId::new("ep4")]);
        })
        .await;

    let summary = engine(config.with_force_refresh(true), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.evictions, 1);
    assert!(tiers.array_path(3).exists());
    assert!(!tiers.cache_path(3).exists());
    assert!(tiers.cache_path(4).exists());
}

/// Scenario: active playback
///
/// The episode being played is held back; the rest of the batch proceeds.
#[tokio::test]
async fn test_playing_episode_is_skipped() {
    let tiers = Tiers::new();
    tiers.seed_array(10).await;
    let snapshot = tiers
        .snapshot(10)
        .with_on_deck("1", "ep4")
        .with_session("ep4", "owner", "Living Room");
    let mut config = tiers.config();
    config.selection.lookahead.on_deck_count = 2;

    let summary = engine(config, &catalog(snapshot))
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.skips[0].detail, "playing for owner on Living Room");
    assert!(tiers.array_path(4).exists());
    assert!(!tiers.cache_path(4).exists());
    assert!(tiers.cache_path(5).exists());
}

/// Scenario: unauthorized remote user
///
/// The friend's watched status cannot be read, so the episode stays cached
/// even though the owner has watched it.
#[tokio::test]
async fn test_unknown_watch_status_blocks_eviction() {
    let tiers = Tiers::new();
    tiers.seed_array(6).await;
    let snapshot = tiers
        .snapshot(6)
        .with_user("2", "friend", false, true)
        .with_on_deck("1", "ep3");
    let catalog = catalog(snapshot);
    let mut config = tiers.config();
    config.selection.lookahead.on_deck_count = 1;
    config.users = vec![UserProfile::new("friend")];

    engine(config.clone(), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    assert!(tiers.cache_path(3).exists());

    catalog
        .update(|snapshot| {
            snapshot.mark_watched("1", "ep3");
            snapshot
                .on_deck
                .insert("1".to_string(), vec![MediaId::new("ep4")]);
            snapshot.unauthorized.insert("2".to_string());
        })
        .await;

    let summary = engine(config.with_force_refresh(true), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.evictions, 0);
    assert!(!summary.degradations.is_empty());
    assert!(tiers.cache_path(3).exists());
    assert!(!tiers.array_path(3).exists());
}

/// Test candidates and evictions never overlap
///
/// A watched episode that is still on a watchlist stays on cache.
#[tokio::test]
async fn test_candidate_is_never_evicted() {
    let tiers = Tiers::new();
    tiers.seed_array(3).await;
    let snapshot = tiers.snapshot(3).with_watchlist_item("1", "ep2");
    let catalog = catalog(snapshot);
    let config = tiers.config();

    engine(config.clone(), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    assert!(tiers.cache_path(2).exists());

    catalog
        .update(|snapshot| snapshot.mark_watched("1", "ep2"))
        .await;
    let summary = engine(config.with_force_refresh(true), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.candidates, 1);
    assert_eq!(summary.evictions, 0);
    assert!(tiers.cache_path(2).exists());
}

#[tokio::test]
async fn test_old_items_are_not_staged() {
    let tiers = Tiers::new();
    tiers.seed_array(5).await;
    let mut snapshot = tiers.snapshot(5).with_on_deck("1", "ep4");
    snapshot.items[3].added_at = Utc::now() - ChronoDuration::days(400);
    let mut config = tiers.config();
    config.selection.lookahead.on_deck_count = 2;
    config.selection.lookahead.max_age_days = Some(30);

    let summary = engine(config, &catalog(snapshot))
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.candidates, 1);
    assert!(!tiers.cache_path(4).exists());
    assert!(tiers.cache_path(5).exists());
}
