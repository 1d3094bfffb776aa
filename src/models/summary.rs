// src/models/summary.rs

use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Counts reported at the end of a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sources_attempted: usize,
    pub sources_skipped: usize,
    pub pages_fetched: usize,
    pub posts_fetched: usize,
    pub posts_dropped: usize,
    pub records_enriched: usize,
    pub enrichment_failures: usize,
    pub dataset_rows: usize,
    pub dataset_path: PathBuf,
    pub snapshot_path: Option<PathBuf>,
}

impl RunSummary {
    /// Wall-clock duration of the run in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
