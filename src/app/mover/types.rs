//! Migration task, outcome and progress types
//!
//! A [`MigrationTask`] moves one media file (plus its subtitles) between tiers.
//! Every task handed to the executor comes back as exactly one
//! [`MigrationResult`], whatever happened to it.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::MediaId;
use crate::errors::{InsufficientSpaceError, MoveError, SubtitleMoveError};

/// Which way a task moves data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferDirection {
    /// Array tier to cache tier
    ToCache,
    /// Cache tier back to array tier
    ToArray,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::ToCache => write!(f, "to-cache"),
            TransferDirection::ToArray => write!(f, "to-array"),
        }
    }
}

/// A subtitle file travelling with its media file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// One file move between tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTask {
    /// Item being moved
    pub media_id: MediaId,
    /// Display name for logs and summaries
    pub title: String,
    /// Direction of the move
    pub direction: TransferDirection,
    /// Current location of the primary file
    pub source: PathBuf,
    /// Target location of the primary file
    pub destination: PathBuf,
    /// Subtitles moved after the primary file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtitles: Vec<SubtitleMove>,
    /// Size reported by the catalog, used when the file cannot be measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<u64>,
    /// Admission priority; lower goes first
    pub priority: usize,
}

impl MigrationTask {
    /// Whether this task consumes cache space
    pub fn is_to_cache(&self) -> bool {
        self.direction == TransferDirection::ToCache
    }
}

/// How a successful primary move was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MoveDisposition {
    /// Same-device rename
    Renamed,
    /// Copied through a partial file, then the source was removed
    Copied,
    /// Destination already present and source gone: nothing to do
    AlreadyInPlace,
    /// Both present with equal size: source removed to finish the move
    Reconciled,
}

impl MoveDisposition {
    /// Whether the filesystem was left exactly as found
    pub fn is_noop(&self) -> bool {
        matches!(self, MoveDisposition::AlreadyInPlace)
    }
}

/// Why a task was not attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The item is being played right now
    ActiveSession { user: String, device: String },
    /// The batch did not fit on the cache tier
    InsufficientSpace,
    /// Free space on the cache tier could not be read
    SpaceProbeFailed { reason: String },
    /// Shutdown was requested before the task started
    Cancelled,
    /// Another task already moves the same source file
    DuplicateSource,
    /// Active sessions could not be listed, so nothing is safe to move
    SessionsUnavailable,
    /// A session is active and the run is configured to stand down
    ActiveSessionPolicy,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ActiveSession { user, device } => {
                write!(f, "playing for {} on {}", user, device)
            }
            SkipReason::InsufficientSpace => write!(f, "insufficient cache space"),
            SkipReason::SpaceProbeFailed { reason } => {
                write!(f, "cache free space unknown: {}", reason)
            }
            SkipReason::Cancelled => write!(f, "cancelled"),
            SkipReason::DuplicateSource => write!(f, "duplicate source path"),
            SkipReason::SessionsUnavailable => write!(f, "active sessions unavailable"),
            SkipReason::ActiveSessionPolicy => write!(f, "a session is active"),
        }
    }
}

/// Terminal state of one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Primary file and every subtitle moved
    Succeeded(MoveDisposition),
    /// Primary file moved, some subtitles did not
    PartiallySucceeded {
        primary: MoveDisposition,
        subtitle_errors: Vec<SubtitleMoveError>,
    },
    /// Primary file not moved
    Failed(MoveError),
    /// Not attempted
    Skipped(SkipReason),
    /// Dry run: would have been attempted
    Planned,
}

impl MigrationOutcome {
    /// Whether the primary file ended up at its destination
    pub fn primary_in_place(&self) -> bool {
        matches!(
            self,
            MigrationOutcome::Succeeded(_) | MigrationOutcome::PartiallySucceeded { .. }
        )
    }

    /// Short label for summaries
    pub fn label(&self) -> &'static str {
        match self {
            MigrationOutcome::Succeeded(_) => "succeeded",
            MigrationOutcome::PartiallySucceeded { .. } => "partially succeeded",
            MigrationOutcome::Failed(_) => "failed",
            MigrationOutcome::Skipped(_) => "skipped",
            MigrationOutcome::Planned => "planned",
        }
    }
}

/// A task together with its outcome
#[derive(Debug, Clone)]
pub struct MigrationResult {
    pub task: MigrationTask,
    pub outcome: MigrationOutcome,
    /// Bytes physically moved (primary plus subtitles)
    pub bytes_moved: u64,
    /// Time spent on the task
    pub elapsed: Duration,
    /// Worker that ran the task, `None` if it never reached one
    pub worker_id: Option<u32>,
}

impl MigrationResult {
    /// A task that was not attempted
    pub fn skipped(task: MigrationTask, reason: SkipReason) -> Self {
        Self {
            task,
            outcome: MigrationOutcome::Skipped(reason),
            bytes_moved: 0,
            elapsed: Duration::ZERO,
            worker_id: None,
        }
    }

    /// A task that a dry run would have attempted
    pub fn planned(task: MigrationTask) -> Self {
        Self {
            task,
            outcome: MigrationOutcome::Planned,
            bytes_moved: 0,
            elapsed: Duration::ZERO,
            worker_id: None,
        }
    }
}

/// Everything the executor did with one batch
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// One result per input task
    pub results: Vec<MigrationResult>,
    /// Set when the to-cache demand exceeded free space
    pub insufficient_space: Option<InsufficientSpaceError>,
    /// No file was touched
    pub dry_run: bool,
    /// Wall time of the batch
    pub elapsed: Duration,
}

impl ExecutionReport {
    fn count(&self, matches: impl Fn(&MigrationOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| matches(&r.outcome)).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Succeeded(_)))
    }

    pub fn partially_succeeded(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::PartiallySucceeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Skipped(_)))
    }

    pub fn planned(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Planned))
    }

    /// Total bytes moved across the batch
    pub fn bytes_moved(&self) -> u64 {
        self.results.iter().map(|r| r.bytes_moved).sum()
    }

    /// Result for the task with the given source path
    pub fn result_for_source(&self, source: &std::path::Path) -> Option<&MigrationResult> {
        self.results.iter().find(|r| r.task.source == source)
    }
}

/// What a mover worker is doing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoverStatus {
    /// Waiting to start
    Idle,
    /// Moving a primary file or its subtitles
    Moving,
    /// Finished a task
    Finished,
    /// A task failed
    Failed,
    /// No more tasks, or stop requested
    Shutdown,
}

/// Progress report from a mover worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoverProgress {
    pub worker_id: u32,
    pub status: MoverStatus,
    /// Task the report is about
    pub task: Option<String>,
    pub direction: Option<TransferDirection>,
    /// Bytes moved by the finished task
    pub bytes_moved: u64,
    pub timestamp: DateTime<Utc>,
}

impl MoverProgress {
    /// A report with no task attached
    pub fn new(worker_id: u32, status: MoverStatus) -> Self {
        Self {
            worker_id,
            status,
            task: None,
            direction: None,
            bytes_moved: 0,
            timestamp: Utc::now(),
        }
    }

    /// Attach the task this report is about
    pub fn with_task(mut self, task: &MigrationTask) -> Self {
        self.task = Some(task.title.clone());
        self.direction = Some(task.direction);
        self
    }

    /// Whether the report marks the end of a task
    pub fn is_task_end(&self) -> bool {
        matches!(self.status, MoverStatus::Finished | MoverStatus::Failed)
    }

    /// Human-readable status line
    pub fn status_description(&self) -> String {
        let task = self.task.as_deref().unwrap_or("file");
        match &self.status {
            MoverStatus::Idle => "Waiting for work".to_string(),
            MoverStatus::Moving => match self.direction {
                Some(direction) => format!("Moving {} ({})", task, direction),
                None => format!("Moving {}", task),
            },
            MoverStatus::Finished => format!("Finished {}", task),
            MoverStatus::Failed => format!("Failed {}", task),
            MoverStatus::Shutdown => "Shutting down".to_string(),
        }
    }
}
