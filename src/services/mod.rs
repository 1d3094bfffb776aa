//! Service layer for the scraper.
//!
//! This module contains the business logic for:
//! - Fetching one listing page (`ListingSource`, `RedditClient`)
//! - Paging through sources (`Paginator`)
//! - Mapping raw posts to records (`Normalizer`)
//! - Image text extraction (`Enricher`)

mod enricher;
mod normalizer;
mod paginator;
mod source;

pub use enricher::{
    EnrichOutcome, Enricher, HttpMediaFetcher, ImageFormat, MediaFetcher, TesseractExtractor,
    TextExtractor,
};
pub use normalizer::{NormalizeOutcome, Normalizer};
pub use paginator::{
    CollectOutcome, CollectRequest, Paginator, PaginatorConfig, SourceReport, SourceStatus,
};
pub use source::{ListingSource, RedditClient, parse_listing};
