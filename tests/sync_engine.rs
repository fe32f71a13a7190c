//! Integration tests for the sync engine
//!
//! These tests verify decision reuse, state files, session policies and
//! tier housekeeping across whole runs.

mod common;

use std::sync::Arc;

use plexcache::app::catalog::SnapshotCatalog;
use plexcache::app::inventory::CacheLedger;
use plexcache::app::models::{CatalogUser, MediaId};
use plexcache::app::mover::{FixedSpace, StopSignal};
use plexcache::app::{DecisionSource, EngineConfig, SyncEngine};
use plexcache::AppError;

use common::{catalog, episode_id, write_file, RecordingNotifier, Tiers};

fn engine(config: EngineConfig, catalog: &Arc<SnapshotCatalog>) -> SyncEngine {
    SyncEngine::new(config, catalog.clone())
        .unwrap()
        .with_probe(Arc::new(FixedSpace(1 << 30)))
}

fn on_deck_config(tiers: &Tiers, count: usize) -> EngineConfig {
    let mut config = tiers.config();
    config.selection.lookahead.on_deck_count = count;
    config
}

/// Test a full run updates state
///
/// The ledger records what was staged and the exclude file lists it.
#[tokio::test]
async fn test_run_records_ledger_and_exclude_file() {
    let tiers = Tiers::new();
    tiers.seed_array(6).await;
    let catalog = catalog(tiers.snapshot(6).with_on_deck("1", "ep2"));
    let mut config = on_deck_config(&tiers, 2);
    let exclude = tiers.dir.path().join("exclude.txt");
    config.exclude_file = Some(exclude.clone());

    let notifier = Arc::new(RecordingNotifier::default());
    let summary = engine(config, &catalog)
        .with_notifier(notifier.clone())
        .run(&StopSignal::new())
        .await
        .unwrap();
    assert!(summary.is_clean());
    assert_eq!(notifier.summaries.lock().unwrap().len(), 1);

    let ledger = CacheLedger::load(CacheLedger::path_in(&tiers.state_dir()))
        .await
        .unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.contains(&MediaId::new(episode_id(2))));
    assert!(ledger.contains(&MediaId::new(episode_id(3))));

    let listed = tokio::fs::read_to_string(&exclude).await.unwrap();
    assert_eq!(listed.lines().count(), 2);
    assert!(listed.contains(&tiers.cache_path(2).display().to_string()));
}

/// Test decision reuse
///
/// A second run with unchanged settings reuses the stored decision and finds
/// nothing left to move.
#[tokio::test]
async fn test_second_run_reuses_decision() {
    let tiers = Tiers::new();
    tiers.seed_array(6).await;
    let catalog = catalog(tiers.snapshot(6).with_on_deck("1", "ep1"));
    let config = on_deck_config(&tiers, 3);

    let first = engine(config.clone(), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    assert_eq!(first.decision, DecisionSource::Computed);
    assert_eq!(first.succeeded, 3);

    let second = engine(config, &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    assert_eq!(second.decision, DecisionSource::Cached);
    assert!(second.decision_cache_hit());
    assert_eq!(second.candidates, 3);
    assert_eq!(second.attempted, 0);
}

#[tokio::test]
async fn test_changed_lookahead_recomputes() {
    let tiers = Tiers::new();
    tiers.seed_array(6).await;
    let catalog = catalog(tiers.snapshot(6).with_on_deck("1", "ep1"));

    engine(on_deck_config(&tiers, 1), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    let summary = engine(on_deck_config(&tiers, 2), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.decision, DecisionSource::Computed);
    assert_eq!(summary.candidates, 2);
    assert!(tiers.cache_path(2).exists());
}

/// Test catalog outage with a stored decision
///
/// The earlier decision is reused and the outage is reported.
#[tokio::test]
async fn test_offline_catalog_falls_back_to_stored_decision() {
    let tiers = Tiers::new();
    tiers.seed_array(4).await;
    let catalog = catalog(tiers.snapshot(4).with_on_deck("1", "ep1"));
    let config = on_deck_config(&tiers, 2);

    engine(config.clone(), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    catalog.update(|snapshot| snapshot.offline = true).await;

    let summary = engine(config.with_force_refresh(true), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.decision, DecisionSource::Fallback);
    assert_eq!(summary.candidates, 2);
    assert!(summary
        .degradations
        .iter()
        .any(|d| d.contains("Catalog unavailable")));
}

#[tokio::test]
async fn test_offline_catalog_without_decision_fails() {
    let tiers = Tiers::new();
    tiers.seed_array(2).await;
    let mut snapshot = tiers.snapshot(2).with_on_deck("1", "ep1");
    snapshot.offline = true;

    let result = engine(tiers.config(), &catalog(snapshot))
        .run(&StopSignal::new())
        .await;

    assert!(matches!(result, Err(AppError::CatalogUnavailable { .. })));
    assert!(tiers.array_path(1).exists());
}

/// Test unreadable sessions
///
/// Without the session list no file is safe to move.
#[tokio::test]
async fn test_unavailable_sessions_move_nothing() {
    let tiers = Tiers::new();
    tiers.seed_array(4).await;
    let mut snapshot = tiers.snapshot(4).with_on_deck("1", "ep1");
    snapshot.sessions_unavailable = true;

    let summary = engine(on_deck_config(&tiers, 2), &catalog(snapshot))
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.attempted, 0);
    assert!(!summary.degradations.is_empty());
    assert!(!tiers.cache_path(1).exists());
}

#[tokio::test]
async fn test_active_session_policy_stands_down() {
    let tiers = Tiers::new();
    tiers.seed_array(4).await;
    let snapshot = tiers
        .snapshot(4)
        .with_on_deck("1", "ep1")
        .with_session("ep4", "owner", "Phone");
    let mut config = on_deck_config(&tiers, 2);
    config.exit_if_active_session = true;

    let summary = engine(config, &catalog(snapshot))
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.skipped, 2);
    assert!(summary
        .skips
        .iter()
        .all(|s| s.detail == "a session is active"));
    assert!(tiers.array_path(1).exists());
}

/// Test dry run
///
/// Moves are planned but no media file or ledger is written.
#[tokio::test]
async fn test_dry_run_plans_without_moving() {
    let tiers = Tiers::new();
    tiers.seed_array(4).await;
    let catalog = catalog(tiers.snapshot(4).with_on_deck("1", "ep1"));

    let summary = engine(on_deck_config(&tiers, 2).with_dry_run(true), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.planned, 2);
    assert!(tiers.array_path(1).exists());
    assert!(!tiers.cache_path(1).exists());
    assert!(!CacheLedger::path_in(&tiers.state_dir()).exists());
}

/// Test subtitles and cleanup across a stage and evict cycle
///
/// The subtitle follows its episode both ways and the emptied series
/// directory is removed from the cache tier, while the cache root stays.
#[tokio::test]
async fn test_subtitles_travel_and_empty_dirs_are_removed() {
    let tiers = Tiers::new();
    tiers.seed_array(3).await;
    let array_subtitle = tiers.array_path(3).with_file_name("S01E03.en.srt");
    let cache_subtitle = tiers.cache_path(3).with_file_name("S01E03.en.srt");
    write_file(&array_subtitle, 4).await;

    let catalog = catalog(tiers.snapshot(3).with_on_deck("1", "ep3"));
    let config = on_deck_config(&tiers, 1);

    engine(config.clone(), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    assert!(tiers.cache_path(3).exists());
    assert!(cache_subtitle.exists());

    catalog
        .update(|snapshot| {
            snapshot.mark_watched("1", "ep3");
            snapshot.on_deck.clear();
        })
        .await;
    let summary = engine(config.with_force_refresh(true), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.evictions, 1);
    assert!(tiers.array_path(3).exists());
    assert!(array_subtitle.exists());
    assert!(!tiers.cache_root().join("Severance").exists());
    assert!(tiers.cache_root().exists());
}

/// Test a union share over the cache
///
/// When the array root is a view that already shows cached files (here a
/// symlink onto the cache root), a cached candidate is satisfied and its only
/// copy is never removed.
#[cfg(unix)]
#[tokio::test]
async fn test_union_share_keeps_the_only_copy() {
    let tiers = Tiers::new();
    for n in 1..=3 {
        write_file(&tiers.cache_path(n), common::EPISODE_BYTES).await;
    }
    tokio::fs::create_dir_all(tiers.array_root().parent().unwrap())
        .await
        .unwrap();
    std::os::unix::fs::symlink(tiers.cache_root(), tiers.array_root()).unwrap();

    let catalog = catalog(tiers.snapshot(3).with_on_deck("1", "ep1"));
    let summary = engine(on_deck_config(&tiers, 2), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.attempted, 0);
    for n in 1..=3 {
        assert!(tiers.cache_path(n).exists());
    }
    let ledger = CacheLedger::load(CacheLedger::path_in(&tiers.state_dir()))
        .await
        .unwrap();
    assert_eq!(ledger.len(), 2);
}

/// Test a user joining between runs
///
/// The stored decision covered only the owner; a new catalog account changes
/// the participating users, so the pass is recomputed and the newcomer's
/// on-deck episode is staged.
#[tokio::test]
async fn test_new_catalog_user_invalidates_decision() {
    let tiers = Tiers::new();
    tiers.seed_array(6).await;
    let catalog = catalog(tiers.snapshot(6).with_on_deck("1", "ep1"));
    let mut config = on_deck_config(&tiers, 1);
    config.include_unlisted_users = true;

    let first = engine(config.clone(), &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();
    assert_eq!(first.candidates, 1);

    catalog
        .update(|snapshot| {
            snapshot.users.push(CatalogUser {
                id: "2".to_string(),
                name: "friend".to_string(),
                is_owner: false,
                is_remote: false,
            });
            snapshot
                .on_deck
                .insert("2".to_string(), vec![MediaId::new(episode_id(5))]);
        })
        .await;
    let second = engine(config, &catalog)
        .run(&StopSignal::new())
        .await
        .unwrap();

    assert_eq!(second.decision, DecisionSource::Computed);
    assert_eq!(second.candidates, 2);
    assert!(tiers.cache_path(5).exists());
}
