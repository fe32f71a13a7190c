//! Cache tier free-space measurement

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Reports the bytes available to unprivileged writers on a filesystem
pub trait FreeSpaceProbe: Send + Sync {
    /// Available bytes on the filesystem holding `path`
    fn available_bytes(&self, path: &Path) -> io::Result<u64>;
}

/// Probe backed by `statvfs(3)`
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl FreeSpaceProbe for StatvfsProbe {
    #[cfg(unix)]
    fn available_bytes(&self, path: &Path) -> io::Result<u64> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let target = existing_ancestor(path);
        let c_path = CString::new(target.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        // SAFETY: c_path is NUL-terminated and stat is a valid out pointer
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        let available = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
        debug!("{} bytes available at {}", available, target.display());
        Ok(available)
    }

    #[cfg(not(unix))]
    fn available_bytes(&self, _path: &Path) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "free space measurement requires a unix platform",
        ))
    }
}

/// Probe reporting a fixed amount, for dry runs against foreign paths and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedSpace(pub u64);

impl FreeSpaceProbe for FixedSpace {
    fn available_bytes(&self, _path: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

/// Deepest existing ancestor of `path` (the path itself if it exists)
pub fn existing_ancestor(path: &Path) -> PathBuf {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
