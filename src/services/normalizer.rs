// src/services/normalizer.rs

//! Raw post to fixed-schema record mapping.
//!
//! Extraction never fails on a missing or mistyped field: the column simply
//! becomes null. Only a post without a `data` object is dropped.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{NormalizedRecord, RawPost};

/// Number of records echoed at debug level after each batch.
const SAMPLE_SIZE: usize = 5;

/// Result of normalizing a batch.
#[derive(Debug, Default)]
pub struct NormalizeOutcome {
    /// Records in input order; duplicates are kept
    pub records: Vec<NormalizedRecord>,

    /// Posts dropped for lacking a `data` object
    pub dropped: usize,
}

/// Maps source-native posts onto [`NormalizedRecord`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a batch of posts, preserving order.
    pub fn normalize(&self, posts: &[RawPost]) -> NormalizeOutcome {
        let mut outcome = NormalizeOutcome {
            records: Vec::with_capacity(posts.len()),
            dropped: 0,
        };

        for post in posts {
            match self.normalize_post(post) {
                Ok(record) => outcome.records.push(record),
                Err(error) => {
                    outcome.dropped += 1;
                    log::debug!("Dropping post from {}: {}", post.source_id, error);
                }
            }
        }

        if outcome.dropped > 0 {
            log::warn!("Dropped {} malformed posts", outcome.dropped);
        }
        log::info!("Extracted {} memes", outcome.records.len());
        for record in outcome.records.iter().take(SAMPLE_SIZE) {
            log::debug!("Sample record: {:?}", record);
        }

        outcome
    }

    /// Normalize one post; fails only when the `data` wrapper is absent.
    pub fn normalize_post(&self, post: &RawPost) -> Result<NormalizedRecord> {
        let data = post
            .data()
            .ok_or_else(|| AppError::malformed("post has no \"data\" object"))?;

        Ok(NormalizedRecord {
            created_at: field(data, "created_utc").and_then(as_timestamp),
            title: field(data, "title").and_then(as_text),
            score: field(data, "score").and_then(as_i64),
            upvotes: field(data, "ups").and_then(as_i64),
            num_comments: field(data, "num_comments").and_then(as_i64),
            upvote_ratio: field(data, "upvote_ratio")
                .and_then(as_f64)
                .filter(|ratio| (0.0..=1.0).contains(ratio)),
            is_ad: field(data, "is_created_from_ads_ui").and_then(Value::as_bool),
            total_awards: field(data, "total_awards_received").and_then(as_i64),
            num_reports: field(data, "num_reports").and_then(as_i64),
            image_url: field(data, "url_overridden_by_dest")
                .and_then(as_text)
                .filter(|url| !url.trim().is_empty()),
            is_video: field(data, "is_video").and_then(Value::as_bool),
            source_id: post.source_id.to_string(),
            meme_text: None,
        })
    }
}

fn field<'a>(data: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    data.get(key).filter(|value| !value.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Null-safe integer cast. Floats truncate toward zero, numeric strings parse,
/// anything else is null.
fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().and_then(float_to_i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
        }
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn float_to_i64(f: f64) -> Option<i64> {
    let truncated = f.trunc();
    (truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64)
        .then_some(truncated as i64)
}

/// Epoch seconds (integer or float) to a UTC timestamp.
fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    as_i64(value).and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::SourceId;

    fn post(value: Value) -> RawPost {
        RawPost::new(SourceId::parse("dankmemes").unwrap(), value)
    }

    fn full_post() -> RawPost {
        post(json!({
            "kind": "t3",
            "data": {
                "created_utc": 1700000000.0,
                "title": "When the build passes",
                "score": 1520,
                "ups": 1520,
                "num_comments": 48,
                "upvote_ratio": 0.97,
                "is_created_from_ads_ui": false,
                "total_awards_received": 2,
                "num_reports": null,
                "url_overridden_by_dest": "https://i.redd.it/abc.jpeg",
                "is_video": false,
                "subreddit": "dankmemes"
            }
        }))
    }

    #[test]
    fn test_normalize_full_post() {
        let record = Normalizer::new().normalize_post(&full_post()).unwrap();

        assert_eq!(
            record.created_at.unwrap().to_rfc3339(),
            "2023-11-14T22:13:20+00:00"
        );
        assert_eq!(record.title.as_deref(), Some("When the build passes"));
        assert_eq!(record.score, Some(1520));
        assert_eq!(record.upvotes, Some(1520));
        assert_eq!(record.num_comments, Some(48));
        assert_eq!(record.upvote_ratio, Some(0.97));
        assert_eq!(record.is_ad, Some(false));
        assert_eq!(record.total_awards, Some(2));
        assert_eq!(record.num_reports, None);
        assert_eq!(record.image_url.as_deref(), Some("https://i.redd.it/abc.jpeg"));
        assert_eq!(record.is_video, Some(false));
        assert_eq!(record.source_id, "dankmemes");
        assert_eq!(record.meme_text, None);
    }

    #[test]
    fn test_missing_fields_become_null() {
        let record = Normalizer::new()
            .normalize_post(&post(json!({"data": {}})))
            .unwrap();

        assert_eq!(record, NormalizedRecord::new("dankmemes"));
    }

    #[test]
    fn test_each_missing_field_is_null() {
        let full = full_post();
        let data = full.data().unwrap().clone();

        for key in data.keys() {
            let mut partial = data.clone();
            partial.remove(key);
            let record = Normalizer::new()
                .normalize_post(&post(json!({ "data": partial })))
                .unwrap();

            match key.as_str() {
                "created_utc" => assert!(record.created_at.is_none()),
                "title" => assert!(record.title.is_none()),
                "score" => assert!(record.score.is_none()),
                "ups" => assert!(record.upvotes.is_none()),
                "num_comments" => assert!(record.num_comments.is_none()),
                "upvote_ratio" => assert!(record.upvote_ratio.is_none()),
                "is_created_from_ads_ui" => assert!(record.is_ad.is_none()),
                "total_awards_received" => assert!(record.total_awards.is_none()),
                "url_overridden_by_dest" => assert!(record.image_url.is_none()),
                "is_video" => assert!(record.is_video.is_none()),
                _ => {}
            }
        }
    }

    #[test]
    fn test_coercion_is_null_safe() {
        let record = Normalizer::new()
            .normalize_post(&post(json!({"data": {
                "score": "not a number",
                "ups": "17",
                "num_comments": 12.9,
                "upvote_ratio": "0.5",
                "total_awards_received": true,
                "num_reports": [1],
                "is_video": "yes",
                "title": 42,
                "created_utc": "1700000000",
                "url_overridden_by_dest": "   "
            }})))
            .unwrap();

        assert_eq!(record.score, None);
        assert_eq!(record.upvotes, Some(17));
        assert_eq!(record.num_comments, Some(12));
        assert_eq!(record.upvote_ratio, Some(0.5));
        assert_eq!(record.total_awards, None);
        assert_eq!(record.num_reports, None);
        assert_eq!(record.is_video, None);
        assert_eq!(record.title, None);
        assert_eq!(record.created_at.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(record.image_url, None);
    }

    #[test]
    fn test_upvote_ratio_out_of_range_is_null() {
        let record = Normalizer::new()
            .normalize_post(&post(json!({"data": {"upvote_ratio": 1.5}})))
            .unwrap();
        assert_eq!(record.upvote_ratio, None);
    }

    #[test]
    fn test_posts_without_data_are_dropped() {
        let posts = vec![
            full_post(),
            post(json!({"kind": "more"})),
            post(json!({"data": "string"})),
            full_post(),
        ];

        let outcome = Normalizer::new().normalize(&posts);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.dropped, 2);
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        let a = post(json!({"data": {"title": "a"}}));
        let b = post(json!({"data": {"title": "b"}}));
        let posts = vec![a.clone(), b, a];

        let outcome = Normalizer::new().normalize(&posts);

        let titles: Vec<_> = outcome
            .records
            .iter()
            .map(|r| r.title.as_deref().unwrap())
            .collect();
        assert_eq!(titles, vec!["a", "b", "a"]);
        assert_eq!(outcome.dropped, 0);
    }
}
