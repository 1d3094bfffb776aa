// src/pipeline/inspect.rs

//! Read-only view of the stored dataset.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::storage::{DatasetStorage, ParquetStorage, dataset_schema};

/// What is currently on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub rows: usize,
    pub columns: Vec<String>,
    /// Row count per source, sorted by source name
    pub rows_per_source: BTreeMap<String, usize>,
    pub newest_post: Option<DateTime<Utc>>,
    pub with_text: usize,
}

/// Load the dataset and describe it. A missing file is not an error.
pub async fn inspect_dataset(storage: &ParquetStorage) -> Result<DatasetInfo> {
    let columns = dataset_schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();

    let Some(dataset) = storage.load().await? else {
        return Ok(DatasetInfo {
            path: storage.path().to_path_buf(),
            exists: false,
            rows: 0,
            columns,
            rows_per_source: BTreeMap::new(),
            newest_post: None,
            with_text: 0,
        });
    };

    let mut rows_per_source = BTreeMap::new();
    for record in &dataset.records {
        *rows_per_source.entry(record.source_id.clone()).or_insert(0) += 1;
    }

    Ok(DatasetInfo {
        path: dataset.path.clone(),
        exists: true,
        rows: dataset.len(),
        columns,
        rows_per_source,
        newest_post: dataset.records.iter().filter_map(|r| r.created_at).max(),
        with_text: dataset
            .records
            .iter()
            .filter(|r| r.meme_text.is_some())
            .count(),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::NormalizedRecord;

    #[tokio::test]
    async fn test_missing_dataset() {
        let dir = TempDir::new().unwrap();
        let storage = ParquetStorage::new(dir.path().join("base.parquet"));

        let info = inspect_dataset(&storage).await.unwrap();

        assert!(!info.exists);
        assert_eq!(info.rows, 0);
        assert_eq!(info.columns.len(), 13);
    }

    #[tokio::test]
    async fn test_counts_per_source() {
        let dir = TempDir::new().unwrap();
        let storage = ParquetStorage::new(dir.path().join("base.parquet"));

        let mut records = Vec::new();
        for (i, source) in ["memes", "memes", "dankmemes"].iter().enumerate() {
            let mut record = NormalizedRecord::new(*source);
            record.title = Some(format!("post {i}"));
            record.created_at = DateTime::<Utc>::from_timestamp(1_700_000_000 + i as i64, 0);
            records.push(record);
        }
        records[0].meme_text = Some("top text".into());
        storage.merge_and_persist(&records).await.unwrap();

        let info = inspect_dataset(&storage).await.unwrap();

        assert!(info.exists);
        assert_eq!(info.rows, 3);
        assert_eq!(info.rows_per_source["memes"], 2);
        assert_eq!(info.rows_per_source["dankmemes"], 1);
        assert_eq!(info.newest_post, DateTime::<Utc>::from_timestamp(1_700_000_002, 0));
        assert_eq!(info.with_text, 1);
    }
}
