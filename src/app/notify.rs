//! Run summary delivery

use tracing::{info, warn};

use crate::app::coordinator::RunSummary;

/// Receives the summary at the end of every run
pub trait Notifier: Send + Sync {
    fn notify(&self, summary: &RunSummary);
}

/// Writes the summary to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, summary: &RunSummary) {
        info!("{}", summary.headline());

        if let Some(space) = &summary.insufficient_space {
            warn!("{}", space);
        }
        for failure in &summary.failures {
            warn!("{} ({}): {}", failure.title, failure.direction, failure.detail);
        }
        for degradation in &summary.degradations {
            warn!("Degraded: {}", degradation);
        }
    }
}
