//! PlexCache Library
//!
//! Keeps the media a household is about to watch on the fast cache tier of a
//! tiered storage server, and moves watched media back to the array. Selection
//! is driven by each user's on-deck queue and watchlist; moves are bounded by
//! free space and never touch files that are being played.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
