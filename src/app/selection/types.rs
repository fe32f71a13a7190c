//! Candidate and eviction set types
//!
//! A [`CandidateSet`] is an insertion-ordered set of media items keyed by
//! [`MediaId`] where every member carries the union of the reasons it was
//! selected for. Its iteration order is its priority order once
//! [`CandidateSet::sort_by_priority`] has run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::app::models::{MediaId, MediaItem};
use crate::errors::CatalogFetchError;

/// Why an item should be on the cache tier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CandidateReason {
    /// Entry `rank` (1-based) of a user's on-deck queue, `offset` episodes ahead
    OnDeck {
        user: String,
        rank: usize,
        offset: usize,
    },
    /// Entry `rank` (1-based) of a user's watchlist, `offset` episodes into the series
    Watchlist {
        user: String,
        rank: usize,
        offset: usize,
    },
}

impl CandidateReason {
    /// Ordering key; lower sorts first
    ///
    /// On-deck beats watchlist, then lower rank, then nearer episodes.
    pub fn priority_key(&self) -> (u8, usize, usize) {
        match self {
            CandidateReason::OnDeck { rank, offset, .. } => (0, *rank, *offset),
            CandidateReason::Watchlist { rank, offset, .. } => (1, *rank, *offset),
        }
    }

    /// User this reason came from
    pub fn user(&self) -> &str {
        match self {
            CandidateReason::OnDeck { user, .. } | CandidateReason::Watchlist { user, .. } => user,
        }
    }
}

/// One member of a candidate set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// The item to stage
    pub item: MediaItem,
    /// Every reason it was selected for, deduplicated
    pub reasons: Vec<CandidateReason>,
}

impl Candidate {
    /// Best (lowest) priority key across all reasons
    pub fn priority_key(&self) -> (u8, usize, usize) {
        self.reasons
            .iter()
            .map(CandidateReason::priority_key)
            .min()
            .unwrap_or((u8::MAX, usize::MAX, usize::MAX))
    }
}

/// Deduplicated, ordered set of items that belong on the cache tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Candidate>", into = "Vec<Candidate>")]
pub struct CandidateSet {
    entries: Vec<Candidate>,
    index: HashMap<MediaId, usize>,
}

impl CandidateSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, unioning the reason into an existing member
    ///
    /// Returns `true` when the item was not yet a member.
    pub fn insert(&mut self, item: MediaItem, reason: CandidateReason) -> bool {
        if let Some(&position) = self.index.get(&item.id) {
            let reasons = &mut self.entries[position].reasons;
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
            return false;
        }

        self.index.insert(item.id.clone(), self.entries.len());
        self.entries.push(Candidate {
            item,
            reasons: vec![reason],
        });
        true
    }

    /// Reorder members by their best reason; ties keep insertion order
    pub fn sort_by_priority(&mut self) {
        self.entries.sort_by_key(Candidate::priority_key);
        self.reindex();
    }

    /// Whether an item is a member
    pub fn contains(&self, id: &MediaId) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a member
    pub fn get(&self, id: &MediaId) -> Option<&Candidate> {
        self.index.get(id).map(|&position| &self.entries[position])
    }

    /// Members in priority order
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.entries.iter()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, candidate)| (candidate.item.id.clone(), position))
            .collect();
    }
}

impl From<Vec<Candidate>> for CandidateSet {
    fn from(candidates: Vec<Candidate>) -> Self {
        let mut set = CandidateSet::new();
        for candidate in candidates {
            let Candidate { item, reasons } = candidate;
            for reason in reasons {
                set.insert(item.clone(), reason);
            }
        }
        set
    }
}

impl From<CandidateSet> for Vec<Candidate> {
    fn from(set: CandidateSet) -> Self {
        set.entries
    }
}

/// Cached items that must return to the array tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvictionSet {
    items: Vec<MediaItem>,
}

impl EvictionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item unless already present
    pub fn insert(&mut self, item: MediaItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Whether an item is a member
    pub fn contains(&self, id: &MediaId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    /// Keep only members matching `keep`
    pub fn retain<F>(&mut self, keep: F)
    where
        F: FnMut(&MediaItem) -> bool,
    {
        self.items.retain(keep);
    }

    /// Members
    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter()
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of a candidate selection pass
#[derive(Debug, Clone, Default)]
pub struct CandidateOutcome {
    /// Items that belong on the cache tier
    pub candidates: CandidateSet,
    /// Per-user failures; those users contributed nothing
    pub failures: Vec<CatalogFetchError>,
    /// Users whose fetches were attempted
    pub users_attempted: usize,
    /// Users whose contribution was discarded
    pub users_failed: usize,
    /// Items dropped by the age filter
    pub aged_out: usize,
}

impl CandidateOutcome {
    /// Every attempted user failed: the catalog is unusable for this pass
    pub fn all_users_failed(&self) -> bool {
        self.users_attempted > 0 && self.users_failed == self.users_attempted
    }
}

/// Item whose eviction could not be confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEviction {
    /// Item that stays on cache
    pub media_id: MediaId,
    /// User whose status was unknown
    pub user: String,
    /// Why it could not be resolved
    pub reason: String,
}

/// Result of an eviction selection pass
#[derive(Debug, Clone, Default)]
pub struct EvictionOutcome {
    /// Items to return to the array tier
    pub evictions: EvictionSet,
    /// Items kept because some counting user's status was unknown
    pub unresolved: Vec<UnresolvedEviction>,
    /// Per-user fetch failures behind `unresolved`
    pub failures: Vec<CatalogFetchError>,
}
