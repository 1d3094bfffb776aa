// src/services/source.rs

//! Listing source client.
//!
//! One call to [`ListingSource::fetch_page`] is exactly one network request.
//! Retries belong to the paginator.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{ClientConfig, ListingPage, PageRequest, RawPost, SourceId};
use crate::utils::{http, listing_url};

/// Capability to fetch one page of one source.
///
/// Transport choice (plain HTTP, a browser, a fixture) is an implementation
/// of this trait, not a separate pipeline.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch a single page.
    ///
    /// Fails with `Transport` on network failure or non-success status, and
    /// with `EmptyResponse` when the body is empty or not a listing.
    async fn fetch_page(&self, request: &PageRequest) -> Result<ListingPage>;
}

/// Listing client for the public subreddit JSON endpoint.
pub struct RedditClient {
    client: reqwest::Client,
    base_url: String,
}

impl RedditClient {
    /// Create a client from HTTP settings.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            base_url: config.base_url.clone(),
        })
    }
}

#[async_trait]
impl ListingSource for RedditClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<ListingPage> {
        let source = request.source_id.as_str();
        let url = listing_url(&self.base_url, request)?;
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::transport(source, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::transport(
                source,
                format!("status {} from {}", status, url),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::transport(source, e))?;

        parse_listing(&request.source_id, &body)
    }
}

#[derive(Debug, Deserialize)]
struct ListingEnvelope {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<serde_json::Value>,
    #[serde(default)]
    after: Option<String>,
}

/// Parse a listing body of the shape
/// `{"data": {"children": [{"data": {..}}, ..], "after": string|null}}`.
pub fn parse_listing(source_id: &SourceId, body: &[u8]) -> Result<ListingPage> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::empty_response(
            source_id.as_str(),
            "response body is empty",
        ));
    }

    let envelope: ListingEnvelope = serde_json::from_slice(body)
        .map_err(|e| AppError::empty_response(source_id.as_str(), e))?;

    let posts = envelope
        .data
        .children
        .into_iter()
        .map(|child| RawPost::new(source_id.clone(), child))
        .collect();

    Ok(ListingPage {
        posts,
        after: envelope.data.after.filter(|cursor| !cursor.is_empty()),
    })
}
