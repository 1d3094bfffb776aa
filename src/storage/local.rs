// src/storage/local.rs

//! Parquet-backed dataset.
//!
//! ## Merge
//!
//! ```text
//! existing rows ++ new rows  ->  dedup on (title, image_url), last write wins
//!                            ->  write {name}.tmp  ->  rename over {name}
//! ```
//!
//! A surviving row keeps the position of the first row with its key and the
//! values of the last one, so a re-fetched post refreshes its engagement
//! numbers in place.
//!
//! Single writer only: callers must not merge into the same path from two
//! processes at once. Nothing here locks the file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{IdentityKey, NormalizedRecord};
use crate::storage::schema::{batch_to_records, check_schema, records_to_batch};
use crate::storage::{Dataset, DatasetStorage};

/// Local Parquet file storage backend.
#[derive(Debug, Clone)]
pub struct ParquetStorage {
    path: PathBuf,
}

impl ParquetStorage {
    /// Create storage for the dataset file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::persistence(path, e))?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        Self::ensure_dir(path).await?;

        let tmp = temp_path(path);
        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::persistence(path, e));
        }
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Decode a dataset file, rejecting any schema other than the fixed one.
    fn decode(path: &Path, bytes: Vec<u8>) -> Result<Vec<NormalizedRecord>> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))?;
        check_schema(builder.schema(), path)?;

        let mut records = Vec::new();
        for batch in builder.build()? {
            records.extend(batch_to_records(&batch?)?);
        }
        Ok(records)
    }

    /// Encode records as a single-row-group Parquet file.
    fn encode(records: &[NormalizedRecord]) -> Result<Vec<u8>> {
        let batch = records_to_batch(records)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut buffer = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(buffer)
    }
}

/// Sibling `{file_name}.tmp`; never equal to `path` itself.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl DatasetStorage for ParquetStorage {
    async fn load(&self) -> Result<Option<Dataset>> {
        match self.read_bytes().await? {
            Some(bytes) => Ok(Some(Dataset {
                path: self.path.clone(),
                records: Self::decode(&self.path, bytes)?,
            })),
            None => Ok(None),
        }
    }

    async fn merge_and_persist(&self, new_records: &[NormalizedRecord]) -> Result<Dataset> {
        let existing = match self.load().await? {
            Some(dataset) if !dataset.is_empty() => {
                log::info!(
                    "Merging into existing dataset with {} rows",
                    dataset.records.len()
                );
                dataset.records
            }
            Some(dataset) => {
                log::info!("Dataset at {} has no rows", dataset.path.display());
                Vec::new()
            }
            None => {
                log::info!("No dataset at {}, creating it", self.path.display());
                Vec::new()
            }
        };

        let existing_rows = existing.len();
        let (records, replaced) = merge_records(existing, new_records.to_vec());
        let bytes = Self::encode(&records)?;
        Self::write_bytes(&self.path, &bytes).await?;

        log::info!(
            "Dataset {}: {} rows ({} existing, {} incoming, {} replaced, {} new)",
            self.path.display(),
            records.len(),
            existing_rows,
            new_records.len(),
            replaced,
            records.len().saturating_sub(existing_rows)
        );

        Ok(Dataset {
            path: self.path.clone(),
            records,
        })
    }
}

/// Concatenate and deduplicate on the identity key, last write wins.
///
/// Returns the merged rows and how many rows were overwritten by a later one.
pub fn merge_records(
    existing: Vec<NormalizedRecord>,
    incoming: Vec<NormalizedRecord>,
) -> (Vec<NormalizedRecord>, usize) {
    let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
    let mut merged: Vec<NormalizedRecord> = Vec::with_capacity(existing.len() + incoming.len());
    let mut replaced = 0;

    for record in existing.into_iter().chain(incoming) {
        let key = record.identity_key();
        match positions.get(&key) {
            Some(&index) => {
                merged[index] = record;
                replaced += 1;
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(record);
            }
        }
    }
    (merged, replaced)
}

/// File name for a per-run snapshot taken at `at`.
pub fn snapshot_file_name(at: DateTime<Utc>) -> String {
    format!("reddit_data_{}.parquet", at.format("%Y_%m_%d_%H%M%S"))
}

/// Write one run's batch as its own Parquet file under `dir`.
pub async fn write_snapshot(
    dir: &Path,
    records: &[NormalizedRecord],
    at: DateTime<Utc>,
) -> Result<PathBuf> {
    let path = dir.join(snapshot_file_name(at));
    let bytes = ParquetStorage::encode(records)?;
    ParquetStorage::write_bytes(&path, &bytes).await?;
    Ok(path)
}
