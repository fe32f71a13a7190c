//! Migration executor configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::mover;
use crate::errors::{ConfigError, ConfigResult};

/// What to do when the to-cache batch does not fit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionPolicy {
    /// Run no to-cache task at all
    #[default]
    AbortBatch,
    /// Admit to-cache tasks in priority order while they fit
    Greedy,
}

/// Configuration for the migration executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoverConfig {
    /// Number of concurrent move workers
    pub worker_count: usize,
    /// Bytes kept free on the cache tier
    pub cache_reserve_bytes: u64,
    /// Behaviour when the batch does not fit
    pub admission: AdmissionPolicy,
    /// Report tasks as planned without touching any file
    pub dry_run: bool,
    /// Progress channel capacity
    pub progress_buffer_size: usize,
    /// Path whose filesystem is probed for free space; defaults to the
    /// parent of the first to-cache destination
    pub space_probe_path: Option<PathBuf>,
}

/// Default worker count: available parallelism, capped
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(mover::FALLBACK_WORKER_COUNT)
        .min(mover::MAX_WORKER_COUNT)
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            cache_reserve_bytes: mover::DEFAULT_CACHE_RESERVE_BYTES,
            admission: AdmissionPolicy::default(),
            dry_run: false,
            progress_buffer_size: mover::PROGRESS_BUFFER_SIZE,
            space_probe_path: None,
        }
    }
}

impl MoverConfig {
    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mover.worker_count".to_string(),
                value: "0".to_string(),
                reason: "Worker count cannot be zero".to_string(),
            });
        }

        if self.worker_count > mover::MAX_WORKER_COUNT {
            return Err(ConfigError::InvalidValue {
                field: "mover.worker_count".to_string(),
                value: self.worker_count.to_string(),
                reason: format!("Worker count exceeds maximum ({})", mover::MAX_WORKER_COUNT),
            });
        }

        if self.progress_buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mover.progress_buffer_size".to_string(),
                value: "0".to_string(),
                reason: "Progress buffer must hold at least one report".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for MoverConfig
#[derive(Debug, Default)]
pub struct MoverConfigBuilder {
    config: MoverConfig,
}

impl MoverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = count;
        self
    }

    pub fn cache_reserve_bytes(mut self, bytes: u64) -> Self {
        self.config.cache_reserve_bytes = bytes;
        self
    }

    pub fn admission(mut self, policy: AdmissionPolicy) -> Self {
        self.config.admission = policy;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn space_probe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.space_probe_path = Some(path.into());
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<MoverConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation (for testing)
    pub fn build_unchecked(self) -> MoverConfig {
        self.config
    }
}
