//! Application configuration structures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::listing::{MAX_PAGE_SIZE, SortMode, SourceId, Timeframe};

/// Minimum delay between two page requests for the same source.
pub const MIN_REQUEST_DELAY_MS: u64 = 1000;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP settings for the listing endpoint
    #[serde(default)]
    pub client: ClientConfig,

    /// Which sources to page through and how far
    #[serde(default)]
    pub run: RunConfig,

    /// Optional text extraction from post images
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Dataset location
    #[serde(default)]
    pub dataset: DatasetConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration, or the defaults if the file does not exist.
    ///
    /// A file that exists but cannot be read or parsed is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(&path) {
            Err(AppError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!("No config at {:?}. Using defaults.", path.as_ref());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.client.user_agent.trim().is_empty() {
            return Err(AppError::validation("client.user_agent is empty"));
        }
        if self.client.timeout_secs == 0 {
            return Err(AppError::validation("client.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.client.base_url)?;

        if self.run.source_ids.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.run.page_size) {
            return Err(AppError::validation(format!(
                "run.page_size must be within 1..={MAX_PAGE_SIZE}"
            )));
        }
        if self.run.max_pages == 0 {
            return Err(AppError::validation("run.max_pages must be >= 1"));
        }
        if self.run.request_delay_ms < MIN_REQUEST_DELAY_MS {
            return Err(AppError::validation(format!(
                "run.request_delay_ms must be >= {MIN_REQUEST_DELAY_MS}"
            )));
        }

        if self.enrichment.timeout_secs == 0 {
            return Err(AppError::validation("enrichment.timeout_secs must be > 0"));
        }
        if self.enrichment.max_concurrent == 0 {
            return Err(AppError::validation(
                "enrichment.max_concurrent must be > 0",
            ));
        }
        if self.enrichment.enabled && self.enrichment.command.trim().is_empty() {
            return Err(AppError::validation("enrichment.command is empty"));
        }

        if self.dataset.path.as_os_str().is_empty() {
            return Err(AppError::validation("dataset.path is empty"));
        }
        Ok(())
    }

    /// Sources with duplicates removed, in configured order.
    pub fn unique_sources(&self) -> Vec<SourceId> {
        let mut seen = std::collections::HashSet::new();
        self.run
            .source_ids
            .iter()
            .filter(|id| seen.insert(id.as_str().to_ascii_lowercase()))
            .cloned()
            .collect()
    }
}

/// HTTP client settings for the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Listing host, without trailing path
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Run parameters for pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Subreddits to collect (bare name, `r/name`, or listing URL)
    #[serde(default = "defaults::source_ids")]
    pub source_ids: Vec<SourceId>,

    #[serde(default)]
    pub sort_mode: SortMode,

    /// Posts per page (1-100)
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Page budget per source
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    #[serde(default)]
    pub timeframe: Timeframe,

    /// Delay between page requests for one source, in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Extra attempts for a page after a transport failure
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Wait before retrying a failed page, in milliseconds
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_ids: defaults::source_ids(),
            sort_mode: SortMode::default(),
            page_size: defaults::page_size(),
            max_pages: defaults::max_pages(),
            timeframe: Timeframe::default(),
            request_delay_ms: defaults::request_delay(),
            max_retries: defaults::max_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
        }
    }
}

/// Image text extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Hard limit for fetch + decode + extract of one image
    #[serde(default = "defaults::enrich_timeout")]
    pub timeout_secs: u64,

    /// Images processed at once
    #[serde(default = "defaults::enrich_concurrency")]
    pub max_concurrent: usize,

    /// OCR executable; reads image bytes on stdin, writes text to stdout
    #[serde(default = "defaults::ocr_command")]
    pub command: String,

    #[serde(default = "defaults::ocr_args")]
    pub args: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: defaults::enrich_timeout(),
            max_concurrent: defaults::enrich_concurrency(),
            command: defaults::ocr_command(),
            args: defaults::ocr_args(),
        }
    }
}

/// Dataset file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Parquet file merged into on every run
    #[serde(default = "defaults::dataset_path")]
    pub path: PathBuf,

    /// If set, each run's batch is also written here as its own file
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: defaults::dataset_path(),
            snapshot_dir: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::models::listing::SourceId;

    // Client defaults
    pub fn base_url() -> String {
        "https://www.reddit.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; meme-scraper/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Run defaults
    pub fn source_ids() -> Vec<SourceId> {
        ["dankmemes", "memes", "Memes_Of_The_Dank"]
            .into_iter()
            .filter_map(|s| SourceId::parse(s).ok())
            .collect()
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn max_pages() -> usize {
        1
    }
    pub fn request_delay() -> u64 {
        super::MIN_REQUEST_DELAY_MS
    }
    pub fn max_retries() -> u32 {
        2
    }
    pub fn retry_backoff() -> u64 {
        2000
    }

    // Enrichment defaults
    pub fn enrich_timeout() -> u64 {
        5
    }
    pub fn enrich_concurrency() -> usize {
        4
    }
    pub fn ocr_command() -> String {
        "tesseract".into()
    }
    pub fn ocr_args() -> Vec<String> {
        vec!["stdin".into(), "stdout".into()]
    }

    // Dataset defaults
    pub fn dataset_path() -> PathBuf {
        PathBuf::from("data/base.parquet")
    }
}
