//! Empty directory cleanup on the cache tier
//!
//! After files leave the cache, their now-empty parent directories are
//! removed, walking upwards but never removing a library cache root or a
//! protected system path.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::constants::cleanup::PROTECTED_PATHS;

fn is_protected(dir: &Path) -> bool {
    PROTECTED_PATHS.iter().any(|p| Path::new(p) == dir)
}

/// Remove empty directories left behind by `vacated` files
///
/// Each file's ancestors are tried up to (excluding) the deepest of `roots`
/// containing it; files outside every root are ignored. Returns the number of
/// directories removed.
pub async fn remove_empty_dirs(vacated: &[PathBuf], roots: &[PathBuf]) -> usize {
    let mut removed = 0;

    for path in vacated {
        let Some(root) = roots
            .iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
        else {
            continue;
        };

        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == root.as_path() || !dir.starts_with(root) || is_protected(dir) {
                break;
            }
            // remove_dir refuses non-empty directories
            match tokio::fs::remove_dir(dir).await {
                Ok(()) => {
                    debug!("Removed empty directory {}", dir.display());
                    removed += 1;
                }
                Err(_) => break,
            }
            current = dir.parent();
        }
    }

    if removed > 0 {
        info!("Removed {} empty directories from the cache tier", removed);
    }
    removed
}
