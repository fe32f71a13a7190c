//! Mover worker pool
//!
//! Spawns a fixed number of [`MoverWorker`]s over a shared task queue and
//! collects their results. Tasks still queued when the workers stop (because
//! a stop was requested) are reported as cancelled.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::core::{MoverWorker, ResultsCollector, StopSignal, TaskQueue};
use super::types::{MigrationResult, MigrationTask, MoverProgress, SkipReason};

/// Current state of the mover pool
#[derive(Debug, Clone, PartialEq)]
pub enum PoolState {
    /// Pool has been created but not started
    Created,
    /// Workers are processing the queue
    Running,
    /// Waiting for workers to finish
    ShuttingDown,
    /// All workers have finished
    Shutdown,
}

/// Bounded pool of mover workers
#[derive(Debug)]
pub struct MoverPool {
    worker_count: usize,
    queue: TaskQueue,
    results: ResultsCollector,
    stop: StopSignal,
    handles: Vec<JoinHandle<usize>>,
    state: PoolState,
}

impl MoverPool {
    /// Pool over `tasks`, processed in order
    pub fn new(worker_count: usize, tasks: Vec<MigrationTask>, stop: StopSignal) -> Self {
        Self {
            worker_count: worker_count.max(1),
            queue: Arc::new(Mutex::new(VecDeque::from(tasks))),
            results: Arc::new(Mutex::new(Vec::new())),
            stop,
            handles: Vec::new(),
            state: PoolState::Created,
        }
    }

    /// Spawn the workers
    pub fn start(&mut self, progress_tx: Option<mpsc::Sender<MoverProgress>>) {
        if self.state != PoolState::Created {
            warn!("Cannot start mover pool in state {:?}", self.state);
            return;
        }

        let queued = self.queued();
        let workers = self.worker_count.min(queued.max(1));
        info!("Starting {} mover workers for {} tasks", workers, queued);

        for worker_id in 0..workers {
            let worker = MoverWorker::new(
                worker_id as u32,
                self.queue.clone(),
                self.results.clone(),
                self.stop.clone(),
                progress_tx.clone(),
            );
            self.handles.push(tokio::spawn(worker.run()));
        }

        self.state = PoolState::Running;
    }

    /// Wait for every worker and return one result per task
    pub async fn join(mut self) -> Vec<MigrationResult> {
        self.state = PoolState::ShuttingDown;

        let mut panicked = 0;
        for outcome in join_all(self.handles.drain(..)).await {
            match outcome {
                Ok(processed) => debug!("Mover worker finished {} tasks", processed),
                Err(e) => {
                    warn!("Mover worker panicked: {}", e);
                    panicked += 1;
                }
            }
        }
        if panicked > 0 {
            warn!("{} mover workers ended abnormally", panicked);
        }

        let leftover: Vec<MigrationTask> = match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        if !leftover.is_empty() {
            info!("{} tasks not started before stop", leftover.len());
        }

        let mut results = match self.results.lock() {
            Ok(mut results) => std::mem::take(&mut *results),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        results.extend(
            leftover
                .into_iter()
                .map(|task| MigrationResult::skipped(task, SkipReason::Cancelled)),
        );

        self.state = PoolState::Shutdown;
        results
    }

    pub fn state(&self) -> PoolState {
        self.state.clone()
    }

    /// Tasks not yet taken by a worker
    pub fn queued(&self) -> usize {
        match self.queue.lock() {
            Ok(queue) => queue.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
