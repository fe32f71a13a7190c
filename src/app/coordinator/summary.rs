//! Run summary
//!
//! Everything a run did, condensed for the notifier and the CLI.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::mover::{format_bytes, ExecutionReport, MigrationOutcome, TransferDirection};
use crate::errors::InsufficientSpaceError;

/// Where the candidate and eviction sets came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionSource {
    /// Computed from the catalog during this run
    Computed,
    /// Reused from a fresh decision cache entry
    Cached,
    /// Catalog unavailable; an older valid entry was reused
    Fallback,
}

/// A task that failed or was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNote {
    pub title: String,
    pub direction: TransferDirection,
    pub detail: String,
}

/// Outcome of one engine run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub dry_run: bool,
    pub decision: DecisionSource,
    pub candidates: usize,
    pub evictions: usize,
    /// Tasks that reached a worker
    pub attempted: usize,
    pub succeeded: usize,
    pub partially_succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub planned: usize,
    pub bytes_moved: u64,
    /// Failed tasks and subtitle failures of partial successes
    pub failures: Vec<TaskNote>,
    /// Skipped tasks with their reasons
    pub skips: Vec<TaskNote>,
    /// Non-fatal problems: failed users, unmapped paths, state write errors
    pub degradations: Vec<String>,
    pub insufficient_space: Option<InsufficientSpaceError>,
}

impl RunSummary {
    /// Summarize an execution report
    pub fn new(
        started_at: DateTime<Utc>,
        decision: DecisionSource,
        candidates: usize,
        evictions: usize,
        report: &ExecutionReport,
        degradations: Vec<String>,
    ) -> Self {
        let mut failures = Vec::new();
        let mut skips = Vec::new();

        for result in &report.results {
            let note = |detail: String| TaskNote {
                title: result.task.title.clone(),
                direction: result.task.direction,
                detail,
            };
            match &result.outcome {
                MigrationOutcome::Failed(e) => failures.push(note(e.to_string())),
                MigrationOutcome::PartiallySucceeded {
                    subtitle_errors, ..
                } => failures.extend(subtitle_errors.iter().map(|e| note(e.to_string()))),
                MigrationOutcome::Skipped(reason) => skips.push(note(reason.to_string())),
                MigrationOutcome::Succeeded(_) | MigrationOutcome::Planned => {}
            }
        }

        let succeeded = report.succeeded();
        let partially_succeeded = report.partially_succeeded();
        let failed = report.failed();

        Self {
            started_at,
            elapsed: Duration::ZERO,
            dry_run: report.dry_run,
            decision,
            candidates,
            evictions,
            attempted: succeeded + partially_succeeded + failed,
            succeeded,
            partially_succeeded,
            failed,
            skipped: report.skipped(),
            planned: report.planned(),
            bytes_moved: report.bytes_moved(),
            failures,
            skips,
            degradations,
            insufficient_space: report.insufficient_space.clone(),
        }
    }

    /// Set the elapsed time
    pub fn finished(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Whether the decision was reused rather than computed
    pub fn decision_cache_hit(&self) -> bool {
        self.decision != DecisionSource::Computed
    }

    /// No task failed and nothing was held back for space
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.failures.is_empty() && self.insufficient_space.is_none()
    }

    /// One-line summary
    pub fn headline(&self) -> String {
        if self.dry_run {
            return format!(
                "Dry run: {} candidates, {} evictions, {} moves planned, {} skipped",
                self.candidates, self.evictions, self.planned, self.skipped
            );
        }
        format!(
            "{} candidates, {} evictions: {} moved, {} partial, {} failed, {} skipped ({}) in {:.1}s",
            self.candidates,
            self.evictions,
            self.succeeded,
            self.partially_succeeded,
            self.failed,
            self.skipped,
            format_bytes(self.bytes_moved),
            self.elapsed.as_secs_f64()
        )
    }
}
