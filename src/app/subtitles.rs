//! Subtitle discovery
//!
//! External subtitles sit next to their media file and share its file stem,
//! e.g. `Film (2020).mkv` and `Film (2020).en.forced.srt`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Finds subtitle files belonging to a media file
#[derive(Debug, Clone)]
pub struct SubtitleFinder {
    extensions: Vec<String>,
}

impl SubtitleFinder {
    /// Create a finder for the given extensions (with or without a leading dot)
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// Whether `path` has one of the configured subtitle extensions
    pub fn is_subtitle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    /// Subtitle files next to `media` whose name starts with its stem
    ///
    /// An unreadable directory yields no subtitles.
    pub async fn discover(&self, media: &Path) -> Vec<PathBuf> {
        let (Some(dir), Some(stem)) = (media.parent(), media.file_stem().and_then(|s| s.to_str()))
        else {
            return Vec::new();
        };

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot scan {} for subtitles: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut found = BTreeSet::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path == media || !self.is_subtitle(&path) {
                continue;
            }
            let matches_stem = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(stem))
                .unwrap_or(false);
            if matches_stem {
                found.insert(path);
            }
        }

        found.into_iter().collect()
    }

    /// Discovered subtitles merged with catalog-reported ones, deduplicated
    pub async fn collect(&self, media: &Path, reported: &[PathBuf]) -> Vec<PathBuf> {
        let mut all: BTreeSet<PathBuf> = self.discover(media).await.into_iter().collect();
        all.extend(reported.iter().filter(|p| self.is_subtitle(p)).cloned());
        all.into_iter().collect()
    }
}

impl Default for SubtitleFinder {
    fn default() -> Self {
        Self::new(crate::constants::mover::DEFAULT_SUBTITLE_EXTENSIONS.iter().copied())
    }
}
