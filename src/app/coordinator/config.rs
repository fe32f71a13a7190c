//! Configuration structures for the sync engine
//!
//! [`EngineConfig`] is the runtime form of the configuration file: library
//! mappings, selection settings, user profiles, mover settings and state
//! locations, validated as a whole.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::models::UserProfile;
use crate::app::mover::MoverConfig;
use crate::app::paths::LibraryMapping;
use crate::app::selection::SelectionSettings;
use crate::constants::{catalog, mover, state};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for one sync engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Library path mappings
    pub libraries: Vec<LibraryMapping>,
    /// Lookahead, library selection and global skip list
    pub selection: SelectionSettings,
    /// Per-user profiles
    pub users: Vec<UserProfile>,
    /// Let catalog users without a profile take part
    pub include_unlisted_users: bool,
    /// Migration executor settings
    pub mover: MoverConfig,
    /// Directory holding the decision cache and the ledger
    pub state_dir: PathBuf,
    /// Decision cache entries older than this are recomputed
    #[serde(with = "humantime_serde")]
    pub decision_max_age: Duration,
    /// Timeout applied to each catalog call
    #[serde(with = "humantime_serde")]
    pub catalog_timeout: Duration,
    /// Ignore the decision cache for this run
    pub force_refresh: bool,
    /// Move nothing while any session is active
    pub exit_if_active_session: bool,
    /// Mover exclude file rewritten after each run
    pub exclude_file: Option<PathBuf>,
    /// Remove directories emptied on the cache tier
    pub cleanup_empty_dirs: bool,
    /// Subtitle extensions travelling with media files
    pub subtitle_extensions: Vec<String>,
}

/// Default state directory: the user data dir, or `./.plexcache`
pub fn default_state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(state::APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".plexcache"))
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
            selection: SelectionSettings::default(),
            users: Vec::new(),
            include_unlisted_users: false,
            mover: MoverConfig::default(),
            state_dir: default_state_dir(),
            decision_max_age: state::DEFAULT_DECISION_MAX_AGE,
            catalog_timeout: catalog::DEFAULT_REQUEST_TIMEOUT,
            force_refresh: false,
            exit_if_active_session: false,
            exclude_file: None,
            cleanup_empty_dirs: true,
            subtitle_extensions: mover::DEFAULT_SUBTITLE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Replace the library mappings
    pub fn with_libraries(mut self, libraries: Vec<LibraryMapping>) -> Self {
        self.libraries = libraries;
        self
    }

    /// Set the state directory
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Report tasks as planned without touching files
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.mover.dry_run = dry_run;
        self
    }

    /// Ignore the decision cache
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Validate the configuration, collecting every problem
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.libraries.is_empty() {
            errors.push("At least one library mapping is required".to_string());
        }
        for library in &self.libraries {
            if library.array_root == library.cache_root {
                errors.push(format!(
                    "Library '{}' uses the same root for array and cache",
                    library.name
                ));
            }
            if library.cache_root.is_relative() || library.array_root.is_relative() {
                errors.push(format!("Library '{}' roots must be absolute", library.name));
            }
        }
        for (i, a) in self.libraries.iter().enumerate() {
            if self.libraries[i + 1..].iter().any(|b| b.name == a.name) {
                errors.push(format!("Library '{}' is configured twice", a.name));
            }
        }

        if let Err(e) = self.mover.validate() {
            errors.push(e.to_string());
        }
        if self.catalog_timeout.is_zero() {
            errors.push("Catalog timeout cannot be zero".to_string());
        }
        if self.decision_max_age.is_zero() {
            errors.push("Decision max age cannot be zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }
}
