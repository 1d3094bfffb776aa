// src/models/record.rs

//! Fixed-schema record produced by normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listing post reduced to the dataset's fixed columns.
///
/// Every field except `source_id` is nullable: a field missing or mistyped in
/// the source becomes `None`. `meme_text` is only ever set by the enricher.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub created_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub score: Option<i64>,
    pub upvotes: Option<i64>,
    pub num_comments: Option<i64>,
    pub upvote_ratio: Option<f64>,
    pub is_ad: Option<bool>,
    pub total_awards: Option<i64>,
    pub num_reports: Option<i64>,
    pub image_url: Option<String>,
    pub is_video: Option<bool>,
    pub source_id: String,
    pub meme_text: Option<String>,
}

impl NormalizedRecord {
    /// Create an otherwise empty record for a source.
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    /// Composite key used to deduplicate the dataset.
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            title: self.title.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

/// `(title, image_url)` identity of a record. Nulls compare equal to nulls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub title: Option<String>,
    pub image_url: Option<String>,
}
