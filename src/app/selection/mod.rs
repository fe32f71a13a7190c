//! Candidate and eviction selection
//!
//! - [`candidates`] - what should be on the cache tier
//! - [`evictions`] - what should return to the array tier
//! - [`types`] - the resulting sets and per-pass outcomes
//!
//! Both engines fetch per user and degrade on failure: a user whose fetch
//! fails contributes nothing (candidates) or "unknown" (evictions), and the
//! pass continues for everyone else.

pub mod candidates;
pub mod evictions;
pub mod types;

use serde::{Deserialize, Serialize};

use crate::app::models::UserContext;
use crate::constants::selection::{
    DEFAULT_MAX_AGE_DAYS, DEFAULT_ON_DECK_COUNT, DEFAULT_WATCHLIST_COUNT,
};

pub use candidates::select_candidates;
pub use evictions::select_evictions;
pub use types::{
    Candidate, CandidateOutcome, CandidateReason, CandidateSet, EvictionOutcome, EvictionSet,
    UnresolvedEviction,
};

/// How far ahead to stage media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lookahead {
    /// Episodes per on-deck series entry, the on-deck episode included
    pub on_deck_count: usize,
    /// Unwatched episodes per watchlisted series
    pub watchlist_count: usize,
    /// Items added longer ago than this many days are never staged
    pub max_age_days: Option<u32>,
}

impl Default for Lookahead {
    fn default() -> Self {
        Self {
            on_deck_count: DEFAULT_ON_DECK_COUNT,
            watchlist_count: DEFAULT_WATCHLIST_COUNT,
            max_age_days: Some(DEFAULT_MAX_AGE_DAYS),
        }
    }
}

/// Inputs of a selection pass besides the users themselves
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSettings {
    /// Library names to consider; empty means every library
    pub libraries: Vec<String>,
    /// Lookahead parameters
    pub lookahead: Lookahead,
    /// Users (name or id) never fetched
    pub skip_users: Vec<String>,
}

impl SelectionSettings {
    /// Whether `user` is on the global skip list
    pub fn skips_user(&self, user: &UserContext) -> bool {
        self.skip_users.iter().any(|skip| user.matches(skip))
    }
}
