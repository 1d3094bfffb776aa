// src/models/mod.rs

//! Domain models for the scraper.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod listing;
mod record;
mod summary;

// Re-export all public types
pub use config::{
    ClientConfig, Config, DatasetConfig, EnrichmentConfig, MIN_REQUEST_DELAY_MS, RunConfig,
};
pub use listing::{ListingPage, MAX_PAGE_SIZE, PageRequest, RawPost, SortMode, SourceId, Timeframe};
pub use record::{IdentityKey, NormalizedRecord};
pub use summary::RunSummary;
