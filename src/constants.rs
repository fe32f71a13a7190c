//! Application constants for plexcache
//!
//! Constants are grouped by the engine stage that uses them.

use std::time::Duration;

/// Lookahead and selection defaults
pub mod selection {
    /// Episodes staged per on-deck series entry (the on-deck episode included)
    pub const DEFAULT_ON_DECK_COUNT: usize = 10;

    /// Unwatched episodes staged per watchlisted series
    pub const DEFAULT_WATCHLIST_COUNT: usize = 5;

    /// Items added longer ago than this are never staged
    pub const DEFAULT_MAX_AGE_DAYS: u32 = 183;
}

/// Catalog collaborator settings
pub mod catalog {
    use super::Duration;

    /// Timeout applied to every catalog call
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Timeout applied to every catalog call, in seconds
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
}

/// Migration executor settings
pub mod mover {
    /// Upper bound on concurrent move workers
    pub const MAX_WORKER_COUNT: usize = 16;

    /// Fallback when the platform cannot report its parallelism
    pub const FALLBACK_WORKER_COUNT: usize = 2;

    /// Progress channel capacity
    pub const PROGRESS_BUFFER_SIZE: usize = 256;

    /// Suffix of the temporary file used for cross-device copies
    pub const PARTIAL_SUFFIX: &str = ".plexcache-partial";

    /// Subtitle extensions moved together with their media file
    pub const DEFAULT_SUBTITLE_EXTENSIONS: &[&str] = &["srt", "vtt", "sbv", "sub", "idx"];

    /// Bytes kept free on the cache tier by default
    pub const DEFAULT_CACHE_RESERVE_BYTES: u64 = 0;
}

/// Persisted state files
pub mod state {
    use super::Duration;

    /// Directory name under the user data directory
    pub const APP_DIR_NAME: &str = "plexcache";

    /// Decision cache file name
    pub const DECISION_FILE: &str = "decisions.json";

    /// Cache ledger file name
    pub const LEDGER_FILE: &str = "cache_ledger.json";

    /// Decision cache format version; entries with another version are misses
    pub const DECISION_FORMAT_VERSION: u32 = 1;

    /// Decision cache entries older than this are treated as misses
    pub const DEFAULT_DECISION_MAX_AGE: Duration = Duration::from_secs(48 * 60 * 60);

    /// Decision cache expiry, in hours
    pub const DEFAULT_DECISION_MAX_AGE_HOURS: u64 = 48;
}

/// Empty directory cleanup
pub mod cleanup {
    /// Directories that are never removed, whatever the library roots say
    pub const PROTECTED_PATHS: &[&str] = &[
        "/",
        "/mnt",
        "/mnt/user",
        "/mnt/user0",
        "/mnt/cache",
        "/mnt/disks",
        "/mnt/remotes",
    ];
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "./plexcache.toml";

    /// Configuration file name inside the user config directory
    pub const USER_CONFIG_FILE: &str = "config.toml";

    /// System-wide configuration file (Unix only)
    #[cfg(unix)]
    pub const SYSTEM_CONFIG_FILE: &str = "/etc/plexcache/config.toml";
}

// Re-export commonly used constants at module level
pub use mover::MAX_WORKER_COUNT;
pub use selection::{DEFAULT_MAX_AGE_DAYS, DEFAULT_ON_DECK_COUNT, DEFAULT_WATCHLIST_COUNT};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        assert_eq!(
            catalog::DEFAULT_REQUEST_TIMEOUT.as_secs(),
            catalog::DEFAULT_REQUEST_TIMEOUT_SECS
        );
        assert_eq!(
            state::DEFAULT_DECISION_MAX_AGE.as_secs(),
            state::DEFAULT_DECISION_MAX_AGE_HOURS * 3600
        );
        assert!(mover::FALLBACK_WORKER_COUNT <= MAX_WORKER_COUNT);
    }

    #[test]
    fn test_partial_suffix_is_not_a_subtitle() {
        let suffix = mover::PARTIAL_SUFFIX.trim_start_matches('.');
        assert!(!mover::DEFAULT_SUBTITLE_EXTENSIONS.contains(&suffix));
    }
}
