//! Configuration management for PlexCache
//!
//! This module provides unified configuration management with automatic
//! first-run initialization, multi-location loading and validation into the
//! runtime [`EngineConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::coordinator::config::default_state_dir;
use crate::app::mover::config::default_worker_count;
use crate::app::{
    AdmissionPolicy, EngineConfig, LibraryMapping, Lookahead, MoverConfig, SelectionSettings,
    UserProfile,
};
use crate::constants::{self, catalog, mover, selection, state};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Lookahead and user filtering
    pub selection: SelectionToml,
    /// Migration executor settings
    pub mover: MoverToml,
    /// Catalog source settings
    pub catalog: CatalogToml,
    /// State file locations and lifetimes
    pub state: StateToml,
    /// Run behaviour
    pub run: RunToml,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Library path mappings (`[[libraries]]`)
    pub libraries: Vec<LibraryMapping>,
    /// Per-user profiles (`[[users]]`)
    pub users: Vec<UserProfile>,
}

/// TOML-friendly selection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionToml {
    /// Library names to consider; empty means all
    pub libraries: Vec<String>,
    /// Episodes staged per on-deck series, the on-deck episode included
    pub on_deck_count: usize,
    /// Unwatched episodes staged per watchlisted series
    pub watchlist_count: usize,
    /// Never stage items added more than this many days ago (0 = no limit)
    pub max_age_days: u32,
    /// Users never fetched, by name or id
    pub skip_users: Vec<String>,
    /// Let catalog users without a `[[users]]` profile take part
    pub include_unlisted_users: bool,
}

impl Default for SelectionToml {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            on_deck_count: selection::DEFAULT_ON_DECK_COUNT,
            watchlist_count: selection::DEFAULT_WATCHLIST_COUNT,
            max_age_days: selection::DEFAULT_MAX_AGE_DAYS,
            skip_users: Vec::new(),
            include_unlisted_users: true,
        }
    }
}

/// TOML-friendly mover configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverToml {
    /// Number of concurrent move workers
    pub worker_count: usize,
    /// Bytes kept free on the cache tier
    pub cache_reserve_bytes: u64,
    /// `abort-batch` or `greedy`
    pub admission: AdmissionPolicy,
    /// Filesystem probed for free space (defaults to the first cache root)
    pub space_probe_path: Option<PathBuf>,
    /// Subtitle extensions moved along with media files
    pub subtitle_extensions: Vec<String>,
    /// Remove directories emptied on the cache tier
    pub cleanup_empty_dirs: bool,
    /// Mover exclude file rewritten after each run
    pub exclude_file: Option<PathBuf>,
}

impl Default for MoverToml {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            cache_reserve_bytes: mover::DEFAULT_CACHE_RESERVE_BYTES,
            admission: AdmissionPolicy::default(),
            space_probe_path: None,
            subtitle_extensions: mover::DEFAULT_SUBTITLE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            cleanup_empty_dirs: true,
            exclude_file: None,
        }
    }
}

/// TOML-friendly catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogToml {
    /// JSON catalog export read by the snapshot catalog
    pub snapshot_path: Option<PathBuf>,
    /// Timeout for each catalog call in seconds
    pub request_timeout_secs: u64,
}

impl Default for CatalogToml {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            request_timeout_secs: catalog::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// TOML-friendly state configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateToml {
    /// State directory (leave unset for the user data directory)
    pub state_dir: Option<PathBuf>,
    /// Hours before a stored decision is recomputed
    pub decision_max_age_hours: u64,
}

impl Default for StateToml {
    fn default() -> Self {
        Self {
            state_dir: None,
            decision_max_age_hours: state::DEFAULT_DECISION_MAX_AGE_HOURS,
        }
    }
}

/// TOML-friendly run behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunToml {
    /// Move nothing while any stream is playing
    pub exit_if_active_session: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Convert to a validated runtime configuration
    pub fn to_runtime_config(&self) -> ConfigResult<EngineConfig> {
        let config = EngineConfig {
            libraries: self.libraries.clone(),
            selection: self.selection.to_runtime_config(),
            users: self.users.clone(),
            include_unlisted_users: self.selection.include_unlisted_users,
            mover: self.mover.to_runtime_config(),
            state_dir: self
                .state
                .state_dir
                .clone()
                .unwrap_or_else(default_state_dir),
            decision_max_age: Duration::from_secs(self.state.decision_max_age_hours * 60 * 60),
            catalog_timeout: Duration::from_secs(self.catalog.request_timeout_secs),
            force_refresh: false,
            exit_if_active_session: self.run.exit_if_active_session,
            exclude_file: self.mover.exclude_file.clone(),
            cleanup_empty_dirs: self.mover.cleanup_empty_dirs,
            subtitle_extensions: self.mover.subtitle_extensions.clone(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file or the standard locations
    ///
    /// Without any file the defaults are returned; an explicit file that does
    /// not exist is an error.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) if path.exists() => Some(path),
            Some(path) => return Err(ConfigError::NotFound { path }),
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => {
                debug!("Loading config from: {}", path.display());
                Self::load_from_file(&path).await
            }
            None => Ok(Self::default()),
        }
    }

    /// Initialize configuration on first run
    ///
    /// Creates a commented default config file if none exists and tells the user
    pub async fn initialize_first_run() -> ConfigResult<PathBuf> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            return Ok(config_path);
        }

        info!("Creating default configuration file...");
        Self::write_default(&config_path).await?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   Add your [[libraries]] before the first run.");
        println!();

        Ok(config_path)
    }

    /// Write the commented default configuration to `path`
    pub async fn write_default(path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::Io {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(constants::config::LOCAL_CONFIG_FILE)];
        if let Ok(user) = Self::default_config_path() {
            search_paths.push(user);
        }
        #[cfg(unix)]
        search_paths.push(PathBuf::from(constants::config::SYSTEM_CONFIG_FILE));

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// The config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_dir".to_string(),
            value: String::new(),
            reason: "Could not determine user config directory".to_string(),
        })?;

        Ok(config_dir
            .join(state::APP_DIR_NAME)
            .join(constants::config::USER_CONFIG_FILE))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# PlexCache Configuration
# Generated on first run. Add at least one [[libraries]] entry.

[selection]
# Library names to consider (empty = all libraries)
libraries = []
# Episodes staged per on-deck series, the on-deck episode included
on_deck_count = {}
# Unwatched episodes staged per watchlisted series
watchlist_count = {}
# Never stage items added more than this many days ago (0 = no limit)
max_age_days = {}
# Users never fetched, by name or id
skip_users = []
# Let catalog users without a [[users]] profile take part
include_unlisted_users = true

[mover]
worker_count = {}
# Bytes kept free on the cache drive
cache_reserve_bytes = 0
# "abort-batch" moves nothing to cache when the batch does not fit,
# "greedy" moves what fits in priority order
admission = "abort-batch"
subtitle_extensions = ["srt", "vtt", "sbv", "sub", "idx"]
cleanup_empty_dirs = true
# exclude_file = "/boot/config/plugins/ca.mover.tuning/plexcache_exclude.txt"

[catalog]
# JSON catalog export
# snapshot_path = "/path/to/catalog.json"
request_timeout_secs = {}

[state]
# state_dir = "/path/to/state"
decision_max_age_hours = {}

[run]
# Move nothing while any stream is playing
exit_if_active_session = false

[logging]
level = "info"  # error, warn, info, debug, trace

# [[libraries]]
# name = "Movies"
# catalog_root = "/data/movies"           # path as the media server sees it
# array_root = "/mnt/user/media/movies"
# array_direct_root = "/mnt/user0/media/movies"
# cache_root = "/mnt/cache/media/movies"

# [[users]]
# name = "alice"
# on_deck = true
# watchlist = true
# count_for_eviction = true
# skip_titles = []
"#,
            selection::DEFAULT_ON_DECK_COUNT,
            selection::DEFAULT_WATCHLIST_COUNT,
            selection::DEFAULT_MAX_AGE_DAYS,
            default_worker_count(),
            catalog::DEFAULT_REQUEST_TIMEOUT_SECS,
            state::DEFAULT_DECISION_MAX_AGE_HOURS,
        )
    }
}

impl SelectionToml {
    /// Convert to runtime SelectionSettings
    pub fn to_runtime_config(&self) -> SelectionSettings {
        SelectionSettings {
            libraries: self.libraries.clone(),
            lookahead: Lookahead {
                on_deck_count: self.on_deck_count,
                watchlist_count: self.watchlist_count,
                max_age_days: (self.max_age_days > 0).then_some(self.max_age_days),
            },
            skip_users: self.skip_users.clone(),
        }
    }
}

impl MoverToml {
    /// Convert to runtime MoverConfig
    pub fn to_runtime_config(&self) -> MoverConfig {
        MoverConfig {
            worker_count: self.worker_count,
            cache_reserve_bytes: self.cache_reserve_bytes,
            admission: self.admission,
            space_probe_path: self.space_probe_path.clone(),
            ..MoverConfig::default()
        }
    }
}
