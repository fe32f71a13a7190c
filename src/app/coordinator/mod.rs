//! Run orchestration
//!
//! [`SyncEngine`] drives one synchronization run from catalog to disk:
//!
//! 1. Load the cache ledger and prune entries whose cache file vanished.
//! 2. Resolve the participating users, then reuse the decision cache entry for
//!    their fingerprint, or compute candidates and evictions and store them.
//! 3. Turn the decision into migration tasks through the path resolver.
//! 4. Hold back tasks whose media is being played.
//! 5. Run the executor, update the ledger, rewrite the exclude file and clean
//!    up emptied directories.
//! 6. Hand the [`RunSummary`] to the notifier.
//!
//! Only total catalog unavailability, with no usable decision to fall back on,
//! aborts a run. Everything else degrades and is reported.
//!
//! - [`config`] - engine configuration and validation
//! - [`signals`] - SIGINT/SIGTERM to cooperative stop
//! - [`summary`] - the run summary

pub mod config;
pub mod signals;
pub mod summary;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::catalog::{CatalogClient, TimeoutCatalog};
use crate::app::decision::{DecisionCache, DecisionCacheEntry, Fingerprint, FingerprintInput};
use crate::app::guard::{GuardOutcome, SessionGuard};
use crate::app::inventory::{remove_empty_dirs, write_exclude_file, CacheLedger};
use crate::app::models::{MediaId, MediaItem, UserContext};
use crate::app::mover::{
    is_same_file, ExecutionReport, FreeSpaceProbe, MigrationExecutor, MigrationOutcome,
    MigrationResult, MigrationTask, MoverProgress, SkipReason, StatvfsProbe, StopSignal,
    SubtitleMove, TransferDirection,
};
use crate::app::notify::{LogNotifier, Notifier};
use crate::app::paths::{sibling_destination, CacheTarget, PathResolver};
use crate::app::selection::{select_candidates, select_evictions, CandidateSet, EvictionSet};
use crate::app::subtitles::SubtitleFinder;
use crate::app::users::resolve_users;
use crate::errors::{AppError, Result};

pub use config::EngineConfig;
pub use signals::{create_shutdown_channel, wait_for_shutdown_signal, SignalHandler};
pub use summary::{DecisionSource, RunSummary, TaskNote};

/// Candidates and evictions for a run, and where they came from
#[derive(Debug, Clone)]
pub struct Decision {
    pub fingerprint: Fingerprint,
    pub source: DecisionSource,
    pub candidates: CandidateSet,
    pub evictions: EvictionSet,
    pub computed_at: DateTime<Utc>,
}

/// A decision turned into filesystem work
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub decision: Decision,
    /// Moves to perform, to-cache tasks in candidate priority order
    pub tasks: Vec<MigrationTask>,
    /// Candidates already on the cache tier
    pub satisfied: Vec<(MediaItem, CacheTarget)>,
    /// Resolved targets of every planned to-cache task
    targets: HashMap<MediaId, (MediaItem, CacheTarget)>,
}

/// Drives synchronization runs
pub struct SyncEngine {
    config: EngineConfig,
    catalog: Arc<dyn CatalogClient>,
    resolver: PathResolver,
    decisions: DecisionCache,
    subtitles: SubtitleFinder,
    probe: Arc<dyn FreeSpaceProbe>,
    notifier: Arc<dyn Notifier>,
    progress_tx: Option<mpsc::Sender<MoverProgress>>,
}

impl SyncEngine {
    /// Engine over `catalog`, each call bounded by the configured timeout
    pub fn new(config: EngineConfig, catalog: Arc<dyn CatalogClient>) -> Result<Self> {
        config.validate()?;

        let catalog: Arc<dyn CatalogClient> =
            Arc::new(TimeoutCatalog::new(catalog, config.catalog_timeout));
        let resolver = PathResolver::new(config.libraries.clone());
        let decisions = DecisionCache::in_dir(&config.state_dir, config.decision_max_age);
        let subtitles = SubtitleFinder::new(&config.subtitle_extensions);

        Ok(Self {
            config,
            catalog,
            resolver,
            decisions,
            subtitles,
            probe: Arc::new(StatvfsProbe),
            notifier: Arc::new(LogNotifier),
            progress_tx: None,
        })
    }

    /// Use a different free-space probe
    pub fn with_probe(mut self, probe: Arc<dyn FreeSpaceProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Deliver summaries to `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Forward mover progress to `tx`
    pub fn with_progress(mut self, tx: mpsc::Sender<MoverProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn decision_cache(&self) -> &DecisionCache {
        &self.decisions
    }

    /// Fingerprint of a selection pass over `users`
    pub fn fingerprint(&self, users: &[UserContext]) -> Fingerprint {
        Fingerprint::compute(&FingerprintInput {
            users,
            selection: &self.config.selection,
        })
    }

    /// Run until done, stopping early on SIGINT or SIGTERM
    pub async fn run_until_signal(&self) -> Result<RunSummary> {
        let (shutdown_tx, _) = create_shutdown_channel();
        let shutdown_rx = shutdown_tx.subscribe();
        let signal_task = SignalHandler::new(shutdown_tx).setup();

        let stop = StopSignal::new();
        let watcher_stop = stop.clone();
        let watcher = tokio::spawn(async move {
            wait_for_shutdown_signal(shutdown_rx).await;
            watcher_stop.request_stop();
        });

        let result = self.run(&stop).await;

        signal_task.abort();
        watcher.abort();
        result
    }

    /// One full run
    pub async fn run(&self, stop: &StopSignal) -> Result<RunSummary> {
        let started = Instant::now();
        let started_at = Utc::now();
        let dry_run = self.config.mover.dry_run;
        let mut degradations = Vec::new();

        info!(
            "Starting {}run over {} libraries",
            if dry_run { "dry " } else { "" },
            self.config.libraries.len()
        );

        let mut ledger = self.load_ledger(&mut degradations).await;
        ledger.prune_missing().await;

        let decision = self.decide(&ledger, started_at, &mut degradations).await?;
        let plan = self.plan(decision, &ledger, &mut degradations).await;

        let guarded = self.guard(plan.tasks.clone(), &mut degradations).await;
        let held_back: Vec<MigrationResult> = guarded
            .skipped
            .into_iter()
            .map(|s| MigrationResult::skipped(s.task, s.reason))
            .collect();

        let mut executor = MigrationExecutor::new(self.mover_config());
        if let Some(tx) = &self.progress_tx {
            executor = executor.with_progress(tx.clone());
        }
        let mut report = executor.execute(guarded.kept, self.probe.as_ref(), stop).await;
        report.results.extend(held_back);

        if !dry_run {
            self.apply_to_ledger(&mut ledger, &plan, &report, &mut degradations)
                .await;
            self.finish_tiers(&ledger, &report, &mut degradations).await;
        }

        let summary = RunSummary::new(
            started_at,
            plan.decision.source,
            plan.decision.candidates.len(),
            plan.decision.evictions.len(),
            &report,
            degradations,
        )
        .finished(started.elapsed());

        self.notifier.notify(&summary);
        Ok(summary)
    }

    /// Candidates and evictions for this run
    pub async fn decide(
        &self,
        ledger: &CacheLedger,
        now: DateTime<Utc>,
        degradations: &mut Vec<String>,
    ) -> Result<Decision> {
        // Fallback for a catalog outage: whatever fresh entry is stored
        let fallback = self.decisions.latest_at(now).await;
        if self.config.force_refresh {
            if let Err(e) = self.decisions.invalidate_all().await {
                degradations.push(format!("Decision cache could not be cleared: {}", e));
            }
        }

        let catalog_users = match self.catalog.list_users().await {
            Ok(users) => users,
            Err(e) => {
                return self.fall_back(
                    fallback,
                    ledger,
                    format!("listing users failed: {}", e),
                    degradations,
                )
            }
        };
        let users = resolve_users(
            &catalog_users,
            &self.config.users,
            self.config.include_unlisted_users,
        );
        debug!("{} users take part", users.len());

        let fingerprint = self.fingerprint(&users);
        if !self.config.force_refresh {
            if let Some(entry) = self.decisions.get_at(&fingerprint, now).await {
                info!("Reusing decision from {}", entry.computed_at);
                return Ok(self.reuse(entry, DecisionSource::Cached, ledger));
            }
        }

        let candidates =
            select_candidates(self.catalog.as_ref(), &users, &self.config.selection, now).await;
        degradations.extend(candidates.failures.iter().map(|f| f.to_string()));
        if candidates.all_users_failed() {
            return self.fall_back(
                fallback,
                ledger,
                format!("all {} users failed", candidates.users_attempted),
                degradations,
            );
        }

        let inventory = ledger.items();
        let evictions = select_evictions(
            self.catalog.as_ref(),
            &inventory,
            &users,
            &candidates.candidates,
        )
        .await;
        degradations.extend(evictions.failures.iter().map(|f| f.to_string()));

        let entry = DecisionCacheEntry::new(
            fingerprint,
            candidates.candidates,
            evictions.evictions,
            now,
        );
        if let Err(e) = self.decisions.put(&fingerprint, entry.clone()).await {
            degradations.push(format!("Decision could not be stored: {}", e));
        }

        Ok(Decision {
            fingerprint,
            source: DecisionSource::Computed,
            candidates: entry.candidates,
            evictions: entry.evictions,
            computed_at: now,
        })
    }

    fn fall_back(
        &self,
        fallback: Option<DecisionCacheEntry>,
        ledger: &CacheLedger,
        reason: String,
        degradations: &mut Vec<String>,
    ) -> Result<Decision> {
        match fallback {
            Some(entry) => {
                warn!("Catalog unavailable ({}), reusing earlier decision", reason);
                degradations.push(format!(
                    "Catalog unavailable ({}); reused decision from {}",
                    reason, entry.computed_at
                ));
                Ok(self.reuse(entry, DecisionSource::Fallback, ledger))
            }
            None => {
                error!("Catalog unavailable: {}", reason);
                Err(AppError::CatalogUnavailable { reason })
            }
        }
    }

    /// A stored decision, with evictions narrowed to what is still cached
    fn reuse(
        &self,
        entry: DecisionCacheEntry,
        source: DecisionSource,
        ledger: &CacheLedger,
    ) -> Decision {
        let candidates = entry.candidates;
        let mut evictions = entry.evictions;
        evictions.retain(|item| ledger.contains(&item.id) && !candidates.contains(&item.id));

        Decision {
            fingerprint: entry.fingerprint,
            source,
            candidates,
            evictions,
            computed_at: entry.computed_at,
        }
    }

    /// Resolve a decision into migration tasks
    pub async fn plan(
        &self,
        decision: Decision,
        ledger: &CacheLedger,
        degradations: &mut Vec<String>,
    ) -> RunPlan {
        let mut tasks = Vec::new();
        let mut satisfied = Vec::new();
        let mut targets = HashMap::new();

        for (priority, candidate) in decision.candidates.iter().enumerate() {
            let item = &candidate.item;
            let target = match self.resolver.target_for(item) {
                Ok(target) => target,
                Err(e) => {
                    warn!("Skipping {}: {}", item.display_name(), e);
                    degradations.push(format!("{}: {}", item.display_name(), e));
                    continue;
                }
            };

            let on_cache = path_exists(&target.cache_path).await;
            let on_array = path_exists(&target.array_path).await;
            // Through a union share the array path shows the cached file itself
            let one_file =
                on_cache && on_array && is_same_file(&target.array_path, &target.cache_path).await;
            if on_cache && (!on_array || one_file) {
                debug!("{} already on cache", item.display_name());
                satisfied.push((item.clone(), target));
                continue;
            }

            let reported: Vec<PathBuf> = item
                .subtitles
                .iter()
                .filter_map(|p| self.resolver.to_array_path(p).ok())
                .collect();
            let subtitles = self
                .subtitles
                .collect(&target.array_path, &reported)
                .await
                .into_iter()
                .filter_map(|source| {
                    let destination = sibling_destination(&target.cache_path, &source)?;
                    Some(SubtitleMove {
                        source,
                        destination,
                    })
                })
                .collect();

            tasks.push(MigrationTask {
                media_id: item.id.clone(),
                title: item.display_name(),
                direction: TransferDirection::ToCache,
                source: target.array_path.clone(),
                destination: target.cache_path.clone(),
                subtitles,
                size_hint: item.size_bytes,
                priority,
            });
            targets.insert(item.id.clone(), (item.clone(), target));
        }

        for (priority, item) in decision.evictions.iter().enumerate() {
            let (target, known_subtitles) = match ledger.get(&item.id) {
                Some(entry) => (
                    entry.target.clone(),
                    entry
                        .subtitles
                        .iter()
                        .map(|(cache, _)| cache.clone())
                        .collect::<Vec<_>>(),
                ),
                None => match self.resolver.target_for(item) {
                    Ok(target) => (target, Vec::new()),
                    Err(e) => {
                        degradations.push(format!("{}: {}", item.display_name(), e));
                        continue;
                    }
                },
            };

            let subtitles = self
                .subtitles
                .collect(&target.cache_path, &known_subtitles)
                .await
                .into_iter()
                .filter_map(|source| {
                    let destination = sibling_destination(&target.array_path, &source)?;
                    Some(SubtitleMove {
                        source,
                        destination,
                    })
                })
                .collect();

            tasks.push(MigrationTask {
                media_id: item.id.clone(),
                title: item.display_name(),
                direction: TransferDirection::ToArray,
                source: target.cache_path.clone(),
                destination: target.array_path.clone(),
                subtitles,
                size_hint: item.size_bytes,
                priority,
            });
        }

        info!(
            "Planned {} moves ({} candidates already cached)",
            tasks.len(),
            satisfied.len()
        );

        RunPlan {
            decision,
            tasks,
            satisfied,
            targets,
        }
    }

    async fn guard(
        &self,
        tasks: Vec<MigrationTask>,
        degradations: &mut Vec<String>,
    ) -> GuardOutcome {
        if tasks.is_empty() {
            return GuardOutcome::default();
        }

        match self.catalog.active_sessions().await {
            Err(e) => {
                warn!("Cannot list active sessions, moving nothing: {}", e);
                degradations.push(format!("Active sessions unavailable: {}", e));
                SessionGuard::skip_all(tasks, SkipReason::SessionsUnavailable)
            }
            Ok(sessions) if self.config.exit_if_active_session && !sessions.is_empty() => {
                info!("{} active sessions, standing down this run", sessions.len());
                SessionGuard::skip_all(tasks, SkipReason::ActiveSessionPolicy)
            }
            Ok(sessions) => SessionGuard::filter(tasks, &sessions),
        }
    }

    fn mover_config(&self) -> crate::app::mover::MoverConfig {
        let mut mover = self.config.mover.clone();
        if mover.space_probe_path.is_none() {
            mover.space_probe_path = self.config.libraries.first().map(|l| l.cache_root.clone());
        }
        mover
    }

    async fn load_ledger(&self, degradations: &mut Vec<String>) -> CacheLedger {
        let path = CacheLedger::path_in(&self.config.state_dir);
        match CacheLedger::load(&path).await {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("Cache ledger unreadable, starting empty: {}", e);
                degradations.push(format!("Cache ledger unreadable: {}", e));
                CacheLedger::new(path)
            }
        }
    }

    async fn apply_to_ledger(
        &self,
        ledger: &mut CacheLedger,
        plan: &RunPlan,
        report: &ExecutionReport,
        degradations: &mut Vec<String>,
    ) {
        let now = Utc::now();

        for (item, target) in &plan.satisfied {
            if !ledger.contains(&item.id) {
                let subtitles = self
                    .subtitles
                    .discover(&target.cache_path)
                    .await
                    .into_iter()
                    .filter_map(|cache| {
                        let array = sibling_destination(&target.array_path, &cache)?;
                        Some((cache, array))
                    })
                    .collect();
                ledger.record_cached(item.clone(), target.clone(), subtitles, now);
            }
        }

        for result in &report.results {
            if !result.outcome.primary_in_place() {
                continue;
            }
            let task = &result.task;
            match task.direction {
                TransferDirection::ToCache => {
                    let Some((item, target)) = plan.targets.get(&task.media_id) else {
                        continue;
                    };
                    let failed: Vec<&PathBuf> = match &result.outcome {
                        MigrationOutcome::PartiallySucceeded {
                            subtitle_errors, ..
                        } => subtitle_errors.iter().map(|e| &e.path).collect(),
                        _ => Vec::new(),
                    };
                    let subtitles = task
                        .subtitles
                        .iter()
                        .filter(|s| !failed.contains(&&s.source))
                        .map(|s| (s.destination.clone(), s.source.clone()))
                        .collect();
                    ledger.record_cached(item.clone(), target.clone(), subtitles, now);
                }
                TransferDirection::ToArray => {
                    ledger.record_evicted(&task.media_id);
                }
            }
        }

        if let Err(e) = ledger.save().await {
            error!("Cache ledger not saved: {}", e);
            degradations.push(format!("Cache ledger not saved: {}", e));
        }
    }

    async fn finish_tiers(
        &self,
        ledger: &CacheLedger,
        report: &ExecutionReport,
        degradations: &mut Vec<String>,
    ) {
        if let Some(path) = &self.config.exclude_file {
            if let Err(e) = write_exclude_file(path, ledger).await {
                degradations.push(format!("Exclude file not written: {}", e));
            }
        }

        if self.config.cleanup_empty_dirs {
            let vacated: Vec<PathBuf> = report
                .results
                .iter()
                .filter(|r| r.task.direction == TransferDirection::ToArray)
                .filter(|r| r.outcome.primary_in_place())
                .flat_map(|r| {
                    std::iter::once(r.task.source.clone())
                        .chain(r.task.subtitles.iter().map(|s| s.source.clone()))
                })
                .collect();
            let roots: Vec<PathBuf> = self
                .config
                .libraries
                .iter()
                .map(|l| l.cache_root.clone())
                .collect();
            remove_empty_dirs(&vacated, &roots).await;
        }
    }
}

async fn path_exists(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::{CatalogSnapshot, SnapshotCatalog};
    use crate::app::models::MediaKind;
    use crate::app::paths::LibraryMapping;
    use tempfile::TempDir;

    fn movie(id: &str, root: &std::path::Path) -> MediaItem {
        MediaItem {
            id: MediaId::new(id),
            title: id.to_string(),
            kind: MediaKind::Movie,
            path: root.join("array/movies").join(format!("{}.mkv", id)),
            library: "Movies".to_string(),
            added_at: Utc::now(),
            size_bytes: Some(4),
            subtitles: Vec::new(),
        }
    }

    fn engine(dir: &TempDir, snapshot: CatalogSnapshot) -> SyncEngine {
        let config = EngineConfig::default()
            .with_libraries(vec![LibraryMapping::new(
                "Movies",
                dir.path().join("array/movies"),
                dir.path().join("cache/movies"),
            )])
            .with_state_dir(dir.path().join("state"));
        SyncEngine::new(config, Arc::new(SnapshotCatalog::new(snapshot))).unwrap()
    }

    /// Test catalog outage without a stored decision
    ///
    /// Nothing to fall back on, so the run aborts before touching files.
    #[tokio::test]
    async fn test_offline_catalog_without_fallback_aborts() {
        let dir = TempDir::new().unwrap();
        let snapshot = CatalogSnapshot {
            offline: true,
            ..CatalogSnapshot::default().with_user("1", "owner", true, false)
        };
        let engine = engine(&dir, snapshot);

        let err = engine.run(&StopSignal::new()).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_plan_treats_cached_copy_as_satisfied() {
        let dir = TempDir::new().unwrap();
        let item = movie("heat", dir.path());
        tokio::fs::create_dir_all(dir.path().join("cache/movies"))
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("cache/movies/heat.mkv"), b"heat")
            .await
            .unwrap();

        let engine = engine(&dir, CatalogSnapshot::default());
        let mut candidates = CandidateSet::new();
        candidates.insert(
            item.clone(),
            crate::app::selection::CandidateReason::OnDeck {
                user: "owner".to_string(),
                rank: 1,
                offset: 0,
            },
        );
        let decision = Decision {
            fingerprint: engine.fingerprint(&[]),
            source: DecisionSource::Computed,
            candidates,
            evictions: EvictionSet::new(),
            computed_at: Utc::now(),
        };

        let mut degradations = Vec::new();
        let ledger = CacheLedger::new(dir.path().join("state/ledger.json"));
        let plan = engine.plan(decision, &ledger, &mut degradations).await;

        assert!(plan.tasks.is_empty());
        assert_eq!(plan.satisfied.len(), 1);
        assert!(degradations.is_empty());
    }

    #[tokio::test]
    async fn test_plan_reports_unmapped_items() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir, CatalogSnapshot::default());
        let mut stray = movie("stray", dir.path());
        stray.path = PathBuf::from("/elsewhere/stray.mkv");

        let mut candidates = CandidateSet::new();
        candidates.insert(
            stray,
            crate::app::selection::CandidateReason::OnDeck {
                user: "owner".to_string(),
                rank: 1,
                offset: 0,
            },
        );
        let decision = Decision {
            fingerprint: engine.fingerprint(&[]),
            source: DecisionSource::Computed,
            candidates,
            evictions: EvictionSet::new(),
            computed_at: Utc::now(),
        };

        let mut degradations = Vec::new();
        let ledger = CacheLedger::new(dir.path().join("state/ledger.json"));
        let plan = engine.plan(decision, &ledger, &mut degradations).await;

        assert!(plan.tasks.is_empty());
        assert_eq!(degradations.len(), 1);
    }
}
