// src/storage/schema.rs

//! Fixed Arrow schema of the dataset and record <-> batch conversion.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::NormalizedRecord;

const UTC: &str = "UTC";

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into()))
}

/// The dataset schema. Column order and types never vary between batches.
pub fn dataset_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("created_at", timestamp_type(), true),
        Field::new("title", DataType::Utf8, true),
        Field::new("score", DataType::Int64, true),
        Field::new("upvotes", DataType::Int64, true),
        Field::new("num_comments", DataType::Int64, true),
        Field::new("upvote_ratio", DataType::Float64, true),
        Field::new("is_ad", DataType::Boolean, true),
        Field::new("total_awards", DataType::Int64, true),
        Field::new("num_reports", DataType::Int64, true),
        Field::new("image_url", DataType::Utf8, true),
        Field::new("is_video", DataType::Boolean, true),
        Field::new("source_id", DataType::Utf8, false),
        Field::new("meme_text", DataType::Utf8, true),
    ]))
}

/// Verify that a schema read from `path` carries every dataset column with
/// the expected type and nothing else.
pub fn check_schema(found: &Schema, path: &Path) -> Result<()> {
    let expected = dataset_schema();

    if found.fields().len() != expected.fields().len() {
        return Err(AppError::schema_mismatch(
            path,
            format!(
                "expected {} columns, found {}",
                expected.fields().len(),
                found.fields().len()
            ),
        ));
    }

    for field in expected.fields() {
        let actual = found
            .field_with_name(field.name())
            .map_err(|_| AppError::schema_mismatch(path, format!("missing column '{}'", field.name())))?;
        if actual.data_type() != field.data_type() {
            return Err(AppError::schema_mismatch(
                path,
                format!(
                    "column '{}' is {}, expected {}",
                    field.name(),
                    actual.data_type(),
                    field.data_type()
                ),
            ));
        }
    }
    Ok(())
}

/// Convert records into a single batch with the dataset schema.
pub fn records_to_batch(records: &[NormalizedRecord]) -> Result<RecordBatch> {
    let timestamps = TimestampMicrosecondArray::from(
        records
            .iter()
            .map(|r| r.created_at.map(|t| t.timestamp_micros()))
            .collect::<Vec<_>>(),
    )
    .with_timezone(UTC);

    let text = |f: fn(&NormalizedRecord) -> Option<&str>| -> ArrayRef {
        Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<_>>()))
    };
    let int = |f: fn(&NormalizedRecord) -> Option<i64>| -> ArrayRef {
        Arc::new(Int64Array::from(records.iter().map(f).collect::<Vec<_>>()))
    };
    let flag = |f: fn(&NormalizedRecord) -> Option<bool>| -> ArrayRef {
        Arc::new(BooleanArray::from(records.iter().map(f).collect::<Vec<_>>()))
    };

    let columns: Vec<ArrayRef> = vec![
        Arc::new(timestamps),
        text(|r| r.title.as_deref()),
        int(|r| r.score),
        int(|r| r.upvotes),
        int(|r| r.num_comments),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.upvote_ratio).collect::<Vec<_>>(),
        )),
        flag(|r| r.is_ad),
        int(|r| r.total_awards),
        int(|r| r.num_reports),
        text(|r| r.image_url.as_deref()),
        flag(|r| r.is_video),
        Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| r.source_id.as_str())
                .collect::<Vec<_>>(),
        )),
        text(|r| r.meme_text.as_deref()),
    ];

    Ok(RecordBatch::try_new(dataset_schema(), columns)?)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| AppError::validation(format!("column '{name}' is missing or mistyped")))
}

fn strings(batch: &RecordBatch, name: &str) -> Result<Vec<Option<String>>> {
    Ok(column::<StringArray>(batch, name)?
        .iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn ints(batch: &RecordBatch, name: &str) -> Result<Vec<Option<i64>>> {
    Ok(column::<Int64Array>(batch, name)?.iter().collect())
}

fn flags(batch: &RecordBatch, name: &str) -> Result<Vec<Option<bool>>> {
    Ok(column::<BooleanArray>(batch, name)?.iter().collect())
}

/// Convert a batch with the dataset schema back into records.
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<NormalizedRecord>> {
    let created_at: Vec<_> = column::<TimestampMicrosecondArray>(batch, "created_at")?
        .iter()
        .map(|v| v.and_then(DateTime::<Utc>::from_timestamp_micros))
        .collect();
    let title = strings(batch, "title")?;
    let score = ints(batch, "score")?;
    let upvotes = ints(batch, "upvotes")?;
    let num_comments = ints(batch, "num_comments")?;
    let upvote_ratio: Vec<Option<f64>> =
        column::<Float64Array>(batch, "upvote_ratio")?.iter().collect();
    let is_ad = flags(batch, "is_ad")?;
    let total_awards = ints(batch, "total_awards")?;
    let num_reports = ints(batch, "num_reports")?;
    let image_url = strings(batch, "image_url")?;
    let is_video = flags(batch, "is_video")?;
    let source_id = strings(batch, "source_id")?;
    let meme_text = strings(batch, "meme_text")?;

    Ok((0..batch.num_rows())
        .map(|i| NormalizedRecord {
            created_at: created_at[i],
            title: title[i].clone(),
            score: score[i],
            upvotes: upvotes[i],
            num_comments: num_comments[i],
            upvote_ratio: upvote_ratio[i],
            is_ad: is_ad[i],
            total_awards: total_awards[i],
            num_reports: num_reports[i],
            image_url: image_url[i].clone(),
            is_video: is_video[i],
            source_id: source_id[i].clone().unwrap_or_default(),
            meme_text: meme_text[i].clone(),
        })
        .collect())
}
