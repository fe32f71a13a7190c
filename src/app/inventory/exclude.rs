//! Mover exclude file
//!
//! A plain-text list of cache paths, one per line, that the array's own
//! scheduled mover must leave on the cache tier.

use std::path::Path;

use tracing::info;

use super::CacheLedger;
use crate::app::state;
use crate::errors::StateResult;

/// Rewrite `path` from the ledger's cache paths
pub async fn write_exclude_file(path: &Path, ledger: &CacheLedger) -> StateResult<usize> {
    let paths = ledger.cache_paths();
    let mut content = String::new();
    for cache_path in &paths {
        content.push_str(&cache_path.to_string_lossy());
        content.push('\n');
    }

    state::write_atomic(path, content.into_bytes()).await?;
    info!("Wrote {} paths to exclude file {}", paths.len(), path.display());
    Ok(paths.len())
}
