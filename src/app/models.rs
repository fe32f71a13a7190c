//! Data models for plexcache
//!
//! Core data structures shared by the catalog client, the selection engines and
//! the migration executor. Everything here is immutable within a run.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// Stable catalog identifier of a playable item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Create a media identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MediaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What kind of playable unit an item is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaKind {
    /// A feature film
    Movie,
    /// A single episode of a series
    Episode {
        /// Catalog identifier of the series
        show_id: String,
        /// Series title, used for skip lists
        show_title: String,
        /// Season number
        season: u32,
        /// Episode number within the season
        episode: u32,
    },
}

/// One playable unit (a movie or a single episode)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable catalog identifier
    pub id: MediaId,
    /// Display title
    pub title: String,
    /// Movie or episode
    #[serde(flatten)]
    pub kind: MediaKind,
    /// File path as reported by the catalog
    pub path: PathBuf,
    /// Library the item belongs to
    pub library: String,
    /// When the item was added to (or aired in) the catalog
    pub added_at: DateTime<Utc>,
    /// File size reported by the catalog, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// External subtitle files reported by the catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtitles: Vec<PathBuf>,
}

impl MediaItem {
    /// Title used for skip-list matching: the series title for episodes
    pub fn series_title(&self) -> &str {
        match &self.kind {
            MediaKind::Episode { show_title, .. } => show_title,
            MediaKind::Movie => &self.title,
        }
    }

    /// Airing position of an episode, `None` for movies
    pub fn episode_position(&self) -> Option<(u32, u32)> {
        match &self.kind {
            MediaKind::Episode {
                season, episode, ..
            } => Some((*season, *episode)),
            MediaKind::Movie => None,
        }
    }

    /// Whether the item was added more than `max_age_days` before `now`
    pub fn is_older_than(&self, max_age_days: u32, now: DateTime<Utc>) -> bool {
        self.added_at < now - ChronoDuration::days(i64::from(max_age_days))
    }

    /// Human readable name for logs and summaries
    pub fn display_name(&self) -> String {
        match &self.kind {
            MediaKind::Episode {
                show_title,
                season,
                episode,
                ..
            } => format!("{} S{:02}E{:02} - {}", show_title, season, episode, self.title),
            MediaKind::Movie => self.title.clone(),
        }
    }
}

/// Reference to a whole series on a watchlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowRef {
    /// Catalog identifier of the series
    pub show_id: String,
    /// Series title
    pub title: String,
    /// Library the series belongs to
    pub library: String,
}

/// One watchlist entry: a concrete item, or a series to expand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum QueueEntry {
    /// A movie or a single episode
    Item(MediaItem),
    /// A whole series
    Show(ShowRef),
}

impl QueueEntry {
    /// Title used for skip-list matching
    pub fn series_title(&self) -> &str {
        match self {
            QueueEntry::Item(item) => item.series_title(),
            QueueEntry::Show(show) => &show.title,
        }
    }
}

/// An episode together with one user's watched flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeState {
    /// The episode
    pub item: MediaItem,
    /// Whether the requesting user has watched it
    pub watched: bool,
}

/// Watched status of an item for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    /// Positively confirmed as fully watched
    Watched,
    /// Confirmed as not (fully) watched
    Unwatched,
    /// The catalog could not say
    Unknown,
}

/// A currently playing stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Item being played
    pub media_id: MediaId,
    /// User playing it
    pub user: String,
    /// Device or player name
    pub device: String,
}

/// A user account as listed by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogUser {
    /// Catalog user identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Server owner account
    #[serde(default)]
    pub is_owner: bool,
    /// Shared or remote friend account
    #[serde(default)]
    pub is_remote: bool,
}

/// Per-user selection settings as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Catalog user identifier or display name
    pub name: String,
    /// Fetch this user's on-deck queue
    #[serde(default = "default_true")]
    pub on_deck: bool,
    /// Fetch this user's watchlist
    #[serde(default = "default_true")]
    pub watchlist: bool,
    /// This user's watched status gates evictions
    #[serde(default = "default_true")]
    pub count_for_eviction: bool,
    /// Movie or series titles never staged for this user
    #[serde(default)]
    pub skip_titles: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl UserProfile {
    /// Profile with every source enabled and no skip list
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_deck: true,
            watchlist: true,
            count_for_eviction: true,
            skip_titles: Vec::new(),
        }
    }
}

/// One household member taking part in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    /// Catalog user identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Server owner account
    pub is_owner: bool,
    /// Shared or remote friend account
    pub is_remote: bool,
    /// Fetch on-deck queue
    pub on_deck: bool,
    /// Fetch watchlist
    pub watchlist: bool,
    /// Watched status gates evictions
    pub count_for_eviction: bool,
    /// Titles never staged for this user
    pub skip_titles: Vec<String>,
}

impl UserContext {
    /// Build a context from a catalog account and an optional profile
    pub fn from_catalog(user: &CatalogUser, profile: Option<&UserProfile>) -> Self {
        let defaults = UserProfile::new(user.name.clone());
        let profile = profile.unwrap_or(&defaults);
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            is_owner: user.is_owner,
            is_remote: user.is_remote,
            on_deck: profile.on_deck,
            watchlist: profile.watchlist,
            count_for_eviction: profile.count_for_eviction,
            skip_titles: profile.skip_titles.clone(),
        }
    }

    /// Whether `title` is on this user's skip list (case-insensitive)
    pub fn skips_title(&self, title: &str) -> bool {
        self.skip_titles
            .iter()
            .any(|skip| skip.eq_ignore_ascii_case(title))
    }

    /// Whether this user matches a configured name or identifier
    pub fn matches(&self, name_or_id: &str) -> bool {
        self.id == name_or_id || self.name.eq_ignore_ascii_case(name_or_id)
    }
}
