//! Error types for plexcache
//!
//! Every engine stage owns an error enum. Most of them are per-user, per-item or
//! per-task and are recorded in the run summary instead of aborting the run; only
//! [`AppError`] values returned from the top-level entry points stop a run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a catalog (media server) client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The server rejected the credentials of this user (401-class)
    #[error("Catalog rejected credentials for user '{user}'")]
    Unauthorized { user: String },

    /// Transient network or server failure
    #[error("Catalog request failed: {reason}")]
    Network { reason: String },

    /// The request did not complete within the configured timeout
    #[error("Catalog request '{operation}' timed out after {seconds} seconds")]
    Timeout { operation: String, seconds: u64 },

    /// The requested user or item does not exist in the catalog
    #[error("Catalog has no {kind} with id '{id}'")]
    NotFound { kind: String, id: String },

    /// A catalog snapshot file could not be read or parsed
    #[error("Catalog snapshot {path} is unusable: {reason}")]
    Snapshot { path: PathBuf, reason: String },
}

/// A per-user catalog failure recorded during selection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Fetching {stage} for user '{user}' failed: {source}")]
pub struct CatalogFetchError {
    /// User whose contribution was discarded or left unknown
    pub user: String,
    /// Which fetch failed (on-deck, watchlist, episodes, watched status)
    pub stage: String,
    /// Underlying catalog failure
    #[source]
    pub source: CatalogError,
}

/// A catalog path that falls outside every configured library
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathMappingError {
    /// Path is not under any library root
    #[error("Path {path} is not under any configured library root")]
    Unmapped { path: PathBuf },

    /// Path has no file name component
    #[error("Path {path} does not name a file")]
    NotAFile { path: PathBuf },
}

/// Aggregate to-cache demand exceeds what the cache tier can hold
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error(
    "Insufficient cache space: {required} bytes required, {available} bytes available ({deficit} bytes short)"
)]
pub struct InsufficientSpaceError {
    /// Bytes needed by every to-cache task in the batch
    pub required: u64,
    /// Bytes available on the cache tier after the reserve
    pub available: u64,
    /// `required - available`
    pub deficit: u64,
}

impl InsufficientSpaceError {
    /// Build the error from a requirement and an availability reading
    pub fn new(required: u64, available: u64) -> Self {
        Self {
            required,
            available,
            deficit: required.saturating_sub(available),
        }
    }
}

/// Failure to move a primary media file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    /// Neither source nor destination exists
    #[error("Source file missing: {path}")]
    SourceMissing { path: PathBuf },

    /// Both sides exist and disagree on size
    #[error(
        "Destination {destination} already exists with {destination_size} bytes (source has {source_size} bytes)"
    )]
    Conflict {
        destination: PathBuf,
        source_size: u64,
        destination_size: u64,
    },

    /// A filesystem operation failed
    #[error("Failed to {operation} {path}: {reason}")]
    Io {
        operation: String,
        path: PathBuf,
        reason: String,
    },
}

impl MoveError {
    /// Wrap an I/O error with the operation and path that produced it
    pub fn io(operation: &str, path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::Io {
            operation: operation.to_string(),
            path: path.into(),
            reason: error.to_string(),
        }
    }
}

/// Failure to move one subtitle alongside its media file
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Subtitle {path} was not moved: {source}")]
pub struct SubtitleMoveError {
    /// Subtitle source path
    pub path: PathBuf,
    /// Why the move failed
    #[source]
    pub source: MoveError,
}

/// Persistence failures for the decision cache and the cache ledger
#[derive(Error, Debug)]
pub enum StateError {
    /// I/O error on a state file
    #[error("State file I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// State file content could not be encoded or decoded
    #[error("State file {path} could not be encoded")]
    Encoding {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Atomic replace failed
    #[error("Atomic write failed: could not persist temporary file to {path}")]
    AtomicWriteFailed { path: PathBuf },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read or written
    #[error("Configuration file I/O error on {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered as TOML
    #[error("Configuration could not be serialized")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    /// Every catalog user failed and no decision could be reused
    #[error("Catalog unavailable for all users; no migration performed ({reason})")]
    CatalogUnavailable { reason: String },

    /// Catalog error outside of per-user selection
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// State persistence error
    #[error(transparent)]
    State(#[from] StateError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is transient and a later run may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::CatalogUnavailable { .. }
            | AppError::Catalog(CatalogError::Network { .. })
            | AppError::Catalog(CatalogError::Timeout { .. }) => true,

            AppError::Catalog(CatalogError::Unauthorized { .. })
            | AppError::Config(_)
            | AppError::State(StateError::Encoding { .. }) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::CatalogUnavailable { .. } | AppError::Catalog(_) => "catalog",
            AppError::State(_) => "state",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Path mapping result type alias
pub type PathResult<T> = std::result::Result<T, PathMappingError>;

/// Move result type alias
pub type MoveResult<T> = std::result::Result<T, MoveError>;

/// State persistence result type alias
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
