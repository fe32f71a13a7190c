//! Live progress display for migration runs
//!
//! Consumes the mover's progress channel and drives an indicatif display:
//! one line counting finished moves and bytes, plus a spinner per worker.

use std::collections::HashMap;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::mover::{format_bytes, MoverProgress, MoverStatus};
use crate::errors::{AppError, Result};

/// Totals gathered while the display ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressTotals {
    pub finished: u64,
    pub failed: u64,
    pub bytes_moved: u64,
}

/// Progress display fed from [`MoverProgress`] reports
pub struct ProgressDisplay {
    multi: MultiProgress,
    main: ProgressBar,
    worker_style: ProgressStyle,
}

impl ProgressDisplay {
    /// Display drawing to stderr
    pub fn new() -> Result<Self> {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Display that draws nothing
    pub fn hidden() -> Result<Self> {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Result<Self> {
        let multi = MultiProgress::with_draw_target(target);

        let main = multi.add(ProgressBar::new_spinner());
        main.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} moves {msg}")
                .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
                .progress_chars("##-"),
        );
        main.set_message("starting");

        let worker_style = ProgressStyle::default_spinner()
            .template("  Worker {prefix}: {spinner:.blue} {msg}")
            .map_err(|e| AppError::generic(format!("Worker progress template error: {}", e)))?;

        Ok(Self {
            multi,
            main,
            worker_style,
        })
    }

    /// Consume reports until every sender is dropped
    pub fn spawn(self, mut progress_rx: mpsc::Receiver<MoverProgress>) -> JoinHandle<ProgressTotals> {
        tokio::spawn(async move {
            let mut workers: HashMap<u32, ProgressBar> = HashMap::new();
            let mut totals = ProgressTotals::default();

            while let Some(report) = progress_rx.recv().await {
                let bar = workers.entry(report.worker_id).or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new_spinner());
                    bar.set_style(self.worker_style.clone());
                    bar.set_prefix(report.worker_id.to_string());
                    bar
                });
                bar.set_message(report.status_description());
                bar.tick();

                match report.status {
                    MoverStatus::Finished => {
                        totals.finished += 1;
                        totals.bytes_moved += report.bytes_moved;
                    }
                    MoverStatus::Failed => totals.failed += 1,
                    MoverStatus::Shutdown => bar.finish_and_clear(),
                    MoverStatus::Idle | MoverStatus::Moving => {}
                }

                if report.is_task_end() {
                    self.main.inc(1);
                    self.main.set_message(format!(
                        "({} failed, {} moved)",
                        totals.failed,
                        format_bytes(totals.bytes_moved)
                    ));
                }
            }

            for bar in workers.values() {
                bar.finish_and_clear();
            }
            self.main.finish_and_clear();
            debug!("Progress display finished: {:?}", totals);
            totals
        })
    }
}
