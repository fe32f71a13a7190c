//! Persisted state file helpers
//!
//! State files are replaced atomically: content goes to a temporary file in
//! the same directory, which is then renamed over the target. Readers see the
//! old file or the new one, never a mix.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::errors::{StateError, StateResult};

/// Create a directory (and parents) if it does not exist yet
pub async fn ensure_directory_exists(dir: &Path) -> StateResult<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| StateError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

/// Replace `path` with `content` atomically
pub async fn write_atomic(path: &Path, content: Vec<u8>) -> StateResult<()> {
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    ensure_directory_exists(&parent).await?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&parent, &target, &content))
        .await
        .map_err(|_| StateError::AtomicWriteFailed {
            path: path.to_path_buf(),
        })??;

    debug!("Atomically replaced {}", path.display());
    Ok(())
}

fn write_atomic_blocking(dir: &Path, target: &Path, content: &[u8]) -> StateResult<()> {
    let io_err = |source| StateError::Io {
        path: target.to_path_buf(),
        source,
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    temp.write_all(content).map_err(io_err)?;
    temp.as_file().sync_all().map_err(io_err)?;
    temp.persist(target)
        .map_err(|_| StateError::AtomicWriteFailed {
            path: target.to_path_buf(),
        })?;
    Ok(())
}

/// Serialize `value` as pretty JSON and replace `path` atomically
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> StateResult<()> {
    let content = serde_json::to_vec_pretty(value).map_err(|source| StateError::Encoding {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, content).await
}

/// Read and decode a JSON state file; `Ok(None)` when it does not exist
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StateResult<Option<T>> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StateError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| StateError::Encoding {
            path: path.to_path_buf(),
            source,
        })
}

/// Remove a state file; a missing file is not an error
pub async fn remove_if_exists(path: &Path) -> StateResult<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StateError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
