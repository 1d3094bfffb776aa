// src/models/listing.rs

//! Listing request/response types for the source endpoint.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Maximum page size accepted by the listing endpoint.
pub const MAX_PAGE_SIZE: u32 = 100;

static SOURCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://[^/]+)?/?(?:r/)?([A-Za-z0-9_]{1,64})/?(?:\.json)?$")
        .expect("source pattern is a valid regex")
});

/// Stable identifier of one listing feed (a subreddit name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    /// Parse a source from a bare name, `r/name`, or a full listing URL.
    ///
    /// ```
    /// use meme_scraper::models::SourceId;
    ///
    /// let id = SourceId::parse("https://www.reddit.com/r/memes/").unwrap();
    /// assert_eq!(id.as_str(), "memes");
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        SOURCE_PATTERN
            .captures(raw.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| AppError::validation(format!("Invalid source identifier '{raw}'")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SourceId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

impl FromStr for SourceId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
    Best,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Best => "best",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window applied to `top` listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
    All,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Hour => "hour",
            Timeframe::Day => "day",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
            Timeframe::Year => "year",
            Timeframe::All => "all",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a single page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub source_id: SourceId,
    pub sort_mode: SortMode,
    pub page_size: u32,
    pub cursor: Option<String>,
    pub timeframe: Timeframe,
}

impl PageRequest {
    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// A source-native post, kept as the raw listing child (`{"kind": .., "data": {..}}`).
#[derive(Debug, Clone, PartialEq)]
pub struct RawPost {
    /// Source this post was listed under
    pub source_id: SourceId,

    /// Raw listing child; its shape is not under our control
    pub value: serde_json::Value,
}

impl RawPost {
    pub fn new(source_id: SourceId, value: serde_json::Value) -> Self {
        Self { source_id, value }
    }

    /// The nested `data` object, if present.
    pub fn data(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.value.get("data").and_then(|d| d.as_object())
    }
}

/// One page of one source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub posts: Vec<RawPost>,

    /// Continuation cursor; `None` marks the end of the listing
    pub after: Option<String>,
}
