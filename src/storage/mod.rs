//! Storage abstractions for the record dataset.
//!
//! The dataset is a single columnar file holding every record ever merged,
//! deduplicated on `(title, image_url)`. It is the only state that outlives
//! a run.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── base.parquet                          # Merged dataset
//! └── runs/                                 # Optional per-run snapshots
//!     └── reddit_data_2026_01_31_120000.parquet
//! ```

pub mod local;
pub mod schema;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::NormalizedRecord;

// Re-export for convenience
pub use local::{ParquetStorage, merge_records, snapshot_file_name, write_snapshot};
pub use schema::dataset_schema;

/// Contents of the dataset after a load or merge.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub path: PathBuf,
    pub records: Vec<NormalizedRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trait for dataset storage backends.
#[async_trait]
pub trait DatasetStorage: Send + Sync {
    /// Load the full dataset, or `None` if it has never been written.
    async fn load(&self) -> Result<Option<Dataset>>;

    /// Append `new_records`, deduplicate (last write wins), and replace the
    /// stored dataset atomically.
    ///
    /// Fails with `SchemaMismatch` without touching the stored file if it
    /// was written with a different schema.
    async fn merge_and_persist(&self, new_records: &[NormalizedRecord]) -> Result<Dataset>;
}
