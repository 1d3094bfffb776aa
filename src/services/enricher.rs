// src/services/enricher.rs

//! Optional image text extraction.
//!
//! Each record with an `image_url` gets one fetch, a format check, and one
//! OCR call, all under a single per-record deadline. Any failure leaves
//! `meme_text` null; nothing here can fail the batch.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::{ClientConfig, EnrichmentConfig, NormalizedRecord};
use crate::utils::{get_domain, http};

/// Capability to download referenced media.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Capability to read text out of an image.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &[u8]) -> Result<Option<String>>;
}

/// Image container formats accepted for text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// Detect the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x89, b'P', b'N', b'G', ..] => Some(Self::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [b'G', b'I', b'F', b'8', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            [b'B', b'M', ..] => Some(Self::Bmp),
            _ => None,
        }
    }
}

/// Downloads media over HTTP.
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_media_client(config)?,
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::enrichment(url, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::enrichment(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Runs an OCR executable that reads an image on stdin and prints its text.
pub struct TesseractExtractor {
    command: String,
    args: Vec<String>,
}

impl TesseractExtractor {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }
}

#[async_trait]
impl TextExtractor for TesseractExtractor {
    async fn extract_text(&self, image: &[u8]) -> Result<Option<String>> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(AppError::enrichment(
                self.command.as_str(),
                format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        Ok(clean_text(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn clean_text(raw: &str) -> Option<String> {
    let text = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

/// Result of enriching a batch.
#[derive(Debug, Default)]
pub struct EnrichOutcome {
    /// Same length and order as the input
    pub records: Vec<NormalizedRecord>,

    /// Records that received text
    pub enriched: usize,

    /// Records whose fetch, decode, or extraction failed
    pub failures: usize,
}

/// Attaches extracted image text to records.
pub struct Enricher {
    fetcher: Arc<dyn MediaFetcher>,
    extractor: Arc<dyn TextExtractor>,
    timeout: Duration,
    concurrency: usize,
}

impl Enricher {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        extractor: Arc<dyn TextExtractor>,
        timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Build the HTTP + OCR enricher from configuration.
    pub fn from_config(client: &ClientConfig, config: &EnrichmentConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(HttpMediaFetcher::new(client)?),
            Arc::new(TesseractExtractor::from_config(config)),
            Duration::from_secs(config.timeout_secs),
            config.max_concurrent,
        ))
    }

    /// Enrich every record; output has the same length and order as input.
    pub async fn enrich(&self, records: Vec<NormalizedRecord>) -> EnrichOutcome {
        let results: Vec<(NormalizedRecord, Option<Result<Option<String>>>)> =
            stream::iter(records)
                .map(|mut record| async move {
                    let Some(url) = record.image_url.clone() else {
                        record.meme_text = None;
                        return (record, None);
                    };
                    let result = self.extract_for(&url).await;
                    (record, Some(result))
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut outcome = EnrichOutcome {
            records: Vec::with_capacity(results.len()),
            ..EnrichOutcome::default()
        };
        for (mut record, result) in results {
            record.meme_text = match result {
                Some(Ok(text)) => {
                    if text.is_some() {
                        outcome.enriched += 1;
                    }
                    text
                }
                Some(Err(error)) => {
                    outcome.failures += 1;
                    log::debug!("{}", error);
                    None
                }
                None => None,
            };
            outcome.records.push(record);
        }

        if outcome.failures > 0 {
            log::warn!(
                "Text extraction failed for {} of {} records",
                outcome.failures,
                outcome.records.len()
            );
        }
        log::info!("Extracted text from {} images", outcome.enriched);
        outcome
    }

    /// Fetch, check, and extract under one deadline; dropping the future on
    /// timeout cancels the in-flight request or OCR process.
    async fn extract_for(&self, url: &str) -> Result<Option<String>> {
        match tokio::time::timeout(self.timeout, self.fetch_and_extract(url)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::enrichment(
                url,
                format!(
                    "timed out after {:?} (host {})",
                    self.timeout,
                    get_domain(url).unwrap_or_else(|| "unknown".to_string())
                ),
            )),
        }
    }

    async fn fetch_and_extract(&self, url: &str) -> Result<Option<String>> {
        let bytes = self.fetcher.fetch(url).await.map_err(|e| into_enrichment(url, e))?;

        let format = ImageFormat::sniff(&bytes)
            .ok_or_else(|| AppError::enrichment(url, "not a supported image format"))?;
        log::trace!("{} is {:?}, {} bytes", url, format, bytes.len());

        self.extractor
            .extract_text(&bytes)
            .await
            .map(|text| text.and_then(|t| clean_text(&t)))
            .map_err(|e| into_enrichment(url, e))
    }
}

fn into_enrichment(url: &str, error: AppError) -> AppError {
    match error {
        AppError::Enrichment { .. } => error,
        other => AppError::enrichment(url, other),
    }
}
