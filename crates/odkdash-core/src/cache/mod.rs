//! In-memory freshness cache for the submissions table.
//!
//! `DataLoader` keeps the last parsed table for a configurable window
//! (30 minutes by default) before fetching again.

pub mod loader;
pub mod memo;

pub use loader::{DataLoader, LoadOutcome, DEFAULT_TTL_MINUTES};
pub use memo::{age_display, CachedData};
