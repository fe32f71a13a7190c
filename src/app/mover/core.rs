//! File moves and the mover worker loop
//!
//! [`move_file`] is idempotent: re-running a finished move is a no-op, and a
//! move interrupted after the copy but before the source was removed is
//! completed on the next run. A [`MoverWorker`] pulls tasks from the shared
//! queue until it is empty or a stop is requested, and runs each task as one
//! unit: the primary file first, then its subtitles.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{
    MigrationOutcome, MigrationResult, MigrationTask, MoveDisposition, MoverProgress, MoverStatus,
};
use crate::constants::mover::PARTIAL_SUFFIX;
use crate::errors::{MoveError, MoveResult, SubtitleMoveError};

/// Cooperative stop flag shared by the coordinator and the workers
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask workers to stop after their current task
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tasks waiting for a worker
pub type TaskQueue = Arc<Mutex<VecDeque<MigrationTask>>>;

/// Append-only results shared by all workers
pub type ResultsCollector = Arc<Mutex<Vec<MigrationResult>>>;

async fn inspect(path: &Path) -> MoveResult<Option<Metadata>> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MoveError::io("inspect", path, e)),
    }
}

/// `<destination>.plexcache-partial`
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Whether two inspected paths are one file on disk
///
/// A union share such as `/mnt/user` shows cache-resident files under the
/// array path too; both names then resolve to the same device and inode.
fn same_file(source: &Metadata, destination: &Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        source.dev() == destination.dev() && source.ino() == destination.ino()
    }
    #[cfg(not(unix))]
    {
        let _ = (source, destination);
        false
    }
}

async fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether `a` and `b` both exist and name the same file
pub async fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a).await, fs::metadata(b).await) {
        (Ok(a_meta), Ok(b_meta)) => same_file(&a_meta, &b_meta) || same_path(a, b).await,
        _ => false,
    }
}

/// Move one file, returning how it was done and the bytes moved
///
/// Two names for one file (a union share over the cache) count as already in
/// place; nothing is removed.
pub async fn move_file(source: &Path, destination: &Path) -> MoveResult<(MoveDisposition, u64)> {
    let source_meta = inspect(source).await?;
    let destination_meta = inspect(destination).await?;

    if let (Some(src), Some(dst)) = (&source_meta, &destination_meta) {
        if same_file(src, dst) || same_path(source, destination).await {
            info!(
                "{} and {} are the same file, leaving it alone",
                source.display(),
                destination.display()
            );
            return Ok((MoveDisposition::AlreadyInPlace, 0));
        }
    }

    match (source_meta, destination_meta) {
        (None, Some(_)) => {
            debug!("{} already in place", destination.display());
            Ok((MoveDisposition::AlreadyInPlace, 0))
        }
        (None, None) => Err(MoveError::SourceMissing {
            path: source.to_path_buf(),
        }),
        (Some(src), Some(dst)) if src.len() == dst.len() => {
            fs::remove_file(source)
                .await
                .map_err(|e| MoveError::io("remove", source, e))?;
            info!(
                "Completed earlier move of {} by removing the source",
                destination.display()
            );
            Ok((MoveDisposition::Reconciled, 0))
        }
        (Some(src), Some(dst)) => Err(MoveError::Conflict {
            destination: destination.to_path_buf(),
            source_size: src.len(),
            destination_size: dst.len(),
        }),
        (Some(src), None) => {
            let disposition = transfer(source, destination).await?;
            Ok((disposition, src.len()))
        }
    }
}

async fn transfer(source: &Path, destination: &Path) -> MoveResult<MoveDisposition> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| MoveError::io("create directory", parent, e))?;
    }

    match fs::rename(source, destination).await {
        Ok(()) => return Ok(MoveDisposition::Renamed),
        Err(e) => debug!(
            "Rename {} -> {} failed ({}), copying instead",
            source.display(),
            destination.display(),
            e
        ),
    }

    let partial = partial_path(destination);
    // fs::copy carries the permission bits over
    if let Err(e) = fs::copy(source, &partial).await {
        let _ = fs::remove_file(&partial).await;
        return Err(MoveError::io("copy", source, e));
    }
    if let Err(e) = fs::rename(&partial, destination).await {
        let _ = fs::remove_file(&partial).await;
        return Err(MoveError::io("rename", &partial, e));
    }
    fs::remove_file(source)
        .await
        .map_err(|e| MoveError::io("remove", source, e))?;

    Ok(MoveDisposition::Copied)
}

/// Run one task: primary file, then subtitles
pub async fn run_task(task: &MigrationTask) -> (MigrationOutcome, u64) {
    let (primary, mut bytes_moved) = match move_file(&task.source, &task.destination).await {
        Ok(moved) => moved,
        Err(e) => {
            warn!("Failed to move {}: {}", task.title, e);
            return (MigrationOutcome::Failed(e), 0);
        }
    };

    let mut subtitle_errors = Vec::new();
    for subtitle in &task.subtitles {
        match move_file(&subtitle.source, &subtitle.destination).await {
            Ok((_, bytes)) => bytes_moved += bytes,
            Err(source) => {
                warn!(
                    "Subtitle {} of {} not moved: {}",
                    subtitle.source.display(),
                    task.title,
                    source
                );
                subtitle_errors.push(SubtitleMoveError {
                    path: subtitle.source.clone(),
                    source,
                });
            }
        }
    }

    let outcome = if subtitle_errors.is_empty() {
        MigrationOutcome::Succeeded(primary)
    } else {
        MigrationOutcome::PartiallySucceeded {
            primary,
            subtitle_errors,
        }
    };
    (outcome, bytes_moved)
}

/// One worker of the mover pool
#[derive(Debug)]
pub struct MoverWorker {
    id: u32,
    queue: TaskQueue,
    results: ResultsCollector,
    stop: StopSignal,
    progress_tx: Option<mpsc::Sender<MoverProgress>>,
}

impl MoverWorker {
    pub fn new(
        id: u32,
        queue: TaskQueue,
        results: ResultsCollector,
        stop: StopSignal,
        progress_tx: Option<mpsc::Sender<MoverProgress>>,
    ) -> Self {
        Self {
            id,
            queue,
            results,
            stop,
            progress_tx,
        }
    }

    /// Process tasks until the queue is empty or a stop is requested
    pub async fn run(self) -> usize {
        debug!("Mover worker {} starting", self.id);
        let mut processed = 0;

        loop {
            if self.stop.is_stopped() {
                info!("Mover worker {} stopping on request", self.id);
                break;
            }

            let Some(task) = self.next_task() else {
                break;
            };

            self.report(MoverProgress::new(self.id, MoverStatus::Moving).with_task(&task))
                .await;

            let started = Instant::now();
            let (outcome, bytes_moved) = run_task(&task).await;
            let status = if matches!(outcome, MigrationOutcome::Failed(_)) {
                MoverStatus::Failed
            } else {
                MoverStatus::Finished
            };

            let mut progress = MoverProgress::new(self.id, status).with_task(&task);
            progress.bytes_moved = bytes_moved;

            self.record(MigrationResult {
                task,
                outcome,
                bytes_moved,
                elapsed: started.elapsed(),
                worker_id: Some(self.id),
            });
            self.report(progress).await;
            processed += 1;
        }

        self.report(MoverProgress::new(self.id, MoverStatus::Shutdown))
            .await;
        debug!("Mover worker {} done after {} tasks", self.id, processed);
        processed
    }

    fn next_task(&self) -> Option<MigrationTask> {
        match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }

    fn record(&self, result: MigrationResult) {
        match self.results.lock() {
            Ok(mut results) => results.push(result),
            Err(poisoned) => poisoned.into_inner().push(result),
        }
    }

    async fn report(&self, progress: MoverProgress) {
        if let Some(tx) = &self.progress_tx {
            // Receiver may be gone already
            let _ = tx.send(progress).await;
        }
    }
}
