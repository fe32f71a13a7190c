//! Concurrent migration executor
//!
//! Takes a conflict-free batch of [`MigrationTask`]s and moves the files with a
//! bounded worker pool:
//!
//! 1. Tasks sharing a source path are dropped after the first.
//! 2. The batch's to-cache demand is measured and checked against the cache
//!    tier's free space (read once), minus the configured reserve.
//! 3. Admitted tasks run on the pool, to-array tasks first so they free space
//!    before to-cache tasks use it.
//!
//! Every input task comes back as exactly one [`MigrationResult`].
//!
//! - [`config`] - executor settings and the admission policy
//! - [`core`] - idempotent file moves and the worker loop
//! - [`pool`] - worker lifecycle
//! - [`space`] - free-space probes
//! - [`types`] - tasks, outcomes and progress reports

pub mod config;
pub mod core;
pub mod pool;
pub mod space;
pub mod types;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::InsufficientSpaceError;

pub use self::config::{AdmissionPolicy, MoverConfig, MoverConfigBuilder};
pub use self::core::{is_same_file, move_file, StopSignal};
pub use self::pool::{MoverPool, PoolState};
pub use self::space::{format_bytes, FixedSpace, FreeSpaceProbe, StatvfsProbe};
pub use self::types::{
    ExecutionReport, MigrationOutcome, MigrationResult, MigrationTask, MoveDisposition,
    MoverProgress, MoverStatus, SkipReason, SubtitleMove, TransferDirection,
};

/// Runs migration batches
#[derive(Debug)]
pub struct MigrationExecutor {
    config: MoverConfig,
    progress_tx: Option<mpsc::Sender<MoverProgress>>,
}

struct Admission {
    admitted: Vec<MigrationTask>,
    rejected: Vec<(MigrationTask, SkipReason)>,
    insufficient_space: Option<InsufficientSpaceError>,
}

impl MigrationExecutor {
    pub fn new(config: MoverConfig) -> Self {
        Self {
            config,
            progress_tx: None,
        }
    }

    /// Send worker progress reports to `tx`
    pub fn with_progress(mut self, tx: mpsc::Sender<MoverProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &MoverConfig {
        &self.config
    }

    /// Execute a batch
    pub async fn execute(
        &self,
        tasks: Vec<MigrationTask>,
        probe: &dyn FreeSpaceProbe,
        stop: &StopSignal,
    ) -> ExecutionReport {
        let started = Instant::now();
        let mut results = Vec::with_capacity(tasks.len());

        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(tasks.len());
        for task in tasks {
            if seen.insert(task.source.clone()) {
                unique.push(task);
            } else {
                warn!("Dropping duplicate task for {}", task.source.display());
                results.push(MigrationResult::skipped(task, SkipReason::DuplicateSource));
            }
        }

        let (mut to_array, mut to_cache): (Vec<_>, Vec<_>) =
            unique.into_iter().partition(|t| !t.is_to_cache());
        to_array.sort_by_key(|t| t.priority);
        to_cache.sort_by_key(|t| t.priority);

        let admission = self.admit(to_cache, probe).await;
        results.extend(
            admission
                .rejected
                .into_iter()
                .map(|(task, reason)| MigrationResult::skipped(task, reason)),
        );

        let mut queue = to_array;
        queue.extend(admission.admitted);

        if self.config.dry_run {
            info!("Dry run: {} tasks planned, no files touched", queue.len());
            results.extend(queue.into_iter().map(MigrationResult::planned));
        } else if !queue.is_empty() {
            let mut pool = MoverPool::new(self.config.worker_count, queue, stop.clone());
            pool.start(self.progress_tx.clone());
            results.extend(pool.join().await);
        }

        let report = ExecutionReport {
            results,
            insufficient_space: admission.insufficient_space,
            dry_run: self.config.dry_run,
            elapsed: started.elapsed(),
        };
        info!(
            "Batch finished: {} succeeded, {} partial, {} failed, {} skipped, {} planned, {} moved",
            report.succeeded(),
            report.partially_succeeded(),
            report.failed(),
            report.skipped(),
            report.planned(),
            format_bytes(report.bytes_moved())
        );
        report
    }

    /// Apply the space check to priority-ordered to-cache tasks
    async fn admit(&self, to_cache: Vec<MigrationTask>, probe: &dyn FreeSpaceProbe) -> Admission {
        let mut admission = Admission {
            admitted: Vec::new(),
            rejected: Vec::new(),
            insufficient_space: None,
        };
        if to_cache.is_empty() {
            return admission;
        }

        let mut sized = Vec::with_capacity(to_cache.len());
        for task in to_cache {
            let bytes = required_bytes(&task).await;
            sized.push((task, bytes));
        }
        let required: u64 = sized.iter().map(|(_, bytes)| bytes).sum();
        if required == 0 {
            admission.admitted = sized.into_iter().map(|(task, _)| task).collect();
            return admission;
        }

        let probe_path = self.probe_path(&sized[0].0);
        let available = match probe.available_bytes(&probe_path) {
            Ok(bytes) => bytes.saturating_sub(self.config.cache_reserve_bytes),
            Err(e) => {
                error!(
                    "Cannot read free space at {}: {}; no file goes to cache",
                    probe_path.display(),
                    e
                );
                let reason = SkipReason::SpaceProbeFailed {
                    reason: e.to_string(),
                };
                admission.rejected = sized
                    .into_iter()
                    .map(|(task, _)| (task, reason.clone()))
                    .collect();
                return admission;
            }
        };
        debug!(
            "To-cache demand {} against {} available",
            format_bytes(required),
            format_bytes(available)
        );

        if required <= available {
            admission.admitted = sized.into_iter().map(|(task, _)| task).collect();
            return admission;
        }

        let shortfall = InsufficientSpaceError::new(required, available);
        warn!("{}", shortfall);
        admission.insufficient_space = Some(shortfall);

        match self.config.admission {
            AdmissionPolicy::AbortBatch => {
                admission.rejected = sized
                    .into_iter()
                    .map(|(task, _)| (task, SkipReason::InsufficientSpace))
                    .collect();
            }
            AdmissionPolicy::Greedy => {
                let mut budget = available;
                let mut fits = true;
                for (task, bytes) in sized {
                    if fits && bytes <= budget {
                        budget -= bytes;
                        admission.admitted.push(task);
                    } else {
                        fits = false;
                        admission.rejected.push((task, SkipReason::InsufficientSpace));
                    }
                }
                info!(
                    "Greedy admission: {} to-cache tasks admitted, {} held back",
                    admission.admitted.len(),
                    admission.rejected.len()
                );
            }
        }
        admission
    }

    fn probe_path(&self, first: &MigrationTask) -> PathBuf {
        self.config.space_probe_path.clone().unwrap_or_else(|| {
            first
                .destination
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

async fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path).await.ok().map(|m| m.len())
}

/// Cache bytes a to-cache task will consume
///
/// A task whose destination already exists consumes nothing: it is either
/// in place, completed by removing the source, or a conflict.
async fn required_bytes(task: &MigrationTask) -> u64 {
    let mut total = 0;
    if fs::metadata(&task.destination).await.is_err() {
        total += match file_len(&task.source).await {
            Some(len) => len,
            None => task.size_hint.unwrap_or(0),
        };
    }
    for subtitle in &task.subtitles {
        if fs::metadata(&subtitle.destination).await.is_err() {
            total += file_len(&subtitle.source).await.unwrap_or(0);
        }
    }
    total
}
