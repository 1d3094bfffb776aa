// src/pipeline/run.rs

//! Ingestion run: collect, normalize, enrich, merge.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{Config, NormalizedRecord, RunSummary};
use crate::services::{
    CollectRequest, Enricher, ListingSource, Normalizer, Paginator, PaginatorConfig, RedditClient,
};
use crate::storage::{DatasetStorage, ParquetStorage, write_snapshot};
use crate::utils::log;

const TOTAL_STEPS: usize = 4;

/// Run the pipeline against the live listing endpoint and the configured
/// dataset file.
///
/// The configuration is validated first, so the minimum request delay holds
/// for every caller.
pub async fn run_from_config(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    let source: Arc<dyn ListingSource> = Arc::new(RedditClient::new(&config.client)?);
    let enricher = if config.enrichment.enabled {
        Some(Enricher::from_config(&config.client, &config.enrichment)?)
    } else {
        None
    };
    let storage = ParquetStorage::new(&config.dataset.path);

    run_pipeline(config, source, enricher.as_ref(), &storage).await
}

/// Run the pipeline with explicit collaborators.
///
/// Per-source and per-record failures are logged and counted. The run fails
/// only if every source failed, or if the dataset cannot be read or written.
/// The caller must not run two merges against the same dataset concurrently.
pub async fn run_pipeline(
    config: &Config,
    source: Arc<dyn ListingSource>,
    enricher: Option<&Enricher>,
    storage: &dyn DatasetStorage,
) -> Result<RunSummary> {
    let start_time = Utc::now();
    log::header("Meme scraper starting");

    // Step 1: Collect
    log::step(1, TOTAL_STEPS, "Collect - Fetching listing pages");
    let request = CollectRequest::from_config(config);
    log::sub_item(&format!(
        "{} sources, sort={}, t={}, page_size={}, max_pages={}",
        request.source_ids().len(),
        request.sort_mode,
        request.timeframe,
        request.page_size,
        request.max_pages
    ));
    let paginator = Paginator::new(source, PaginatorConfig::from(&config.run));
    let collected = paginator.collect(&request).await;

    if collected.all_failed() {
        ::log::error!("Every source failed; leaving the dataset untouched");
        return Err(AppError::AllSourcesFailed {
            attempted: collected.sources_attempted(),
        });
    }

    // Step 2: Normalize
    log::step(2, TOTAL_STEPS, "Normalize - Extracting records");
    let normalized = Normalizer::new().normalize(&collected.posts);

    // Step 3: Enrich
    log::step(3, TOTAL_STEPS, "Enrich - Extracting image text");
    let (records, records_enriched, enrichment_failures) = match enricher {
        Some(enricher) => {
            let outcome = enricher.enrich(normalized.records).await;
            (outcome.records, outcome.enriched, outcome.failures)
        }
        None => {
            log::sub_item("Enrichment disabled");
            (normalized.records, 0, 0)
        }
    };

    // Step 4: Merge
    log::step(4, TOTAL_STEPS, "Merge - Persisting dataset");
    let (dataset_rows, snapshot_path) = if records.is_empty() {
        ::log::warn!("No records collected; dataset left unchanged");
        let rows = storage.load().await?.map_or(0, |dataset| dataset.len());
        (rows, None)
    } else {
        let dataset = storage.merge_and_persist(&records).await?;
        let snapshot_path = snapshot(config, &records, start_time).await;
        (dataset.len(), snapshot_path)
    };

    let summary = RunSummary {
        start_time,
        end_time: Utc::now(),
        sources_attempted: collected.sources_attempted(),
        sources_skipped: collected.sources_skipped(),
        pages_fetched: collected.pages_fetched(),
        posts_fetched: collected.posts.len(),
        posts_dropped: normalized.dropped,
        records_enriched,
        enrichment_failures,
        dataset_rows,
        dataset_path: config.dataset.path.clone(),
        snapshot_path,
    };

    report(&summary);
    Ok(summary)
}

/// Write the per-run snapshot if configured. The merged dataset is already
/// durable at this point, so a failure here is only logged.
async fn snapshot(
    config: &Config,
    records: &[NormalizedRecord],
    at: DateTime<Utc>,
) -> Option<PathBuf> {
    let dir = config.dataset.snapshot_dir.as_ref()?;
    match write_snapshot(dir, records, at).await {
        Ok(path) => {
            log::sub_item(&format!("Snapshot written to {}", path.display()));
            Some(path)
        }
        Err(e) => {
            ::log::warn!("Snapshot not written: {}", e);
            None
        }
    }
}

fn report(summary: &RunSummary) {
    log::separator();
    log::summary(
        "Run",
        &[
            ("sources attempted", summary.sources_attempted.to_string()),
            ("sources skipped", summary.sources_skipped.to_string()),
            ("pages fetched", summary.pages_fetched.to_string()),
            ("posts fetched", summary.posts_fetched.to_string()),
            ("posts dropped", summary.posts_dropped.to_string()),
            ("images with text", summary.records_enriched.to_string()),
            ("dataset rows", summary.dataset_rows.to_string()),
            ("elapsed", format!("{:.1}s", summary.elapsed_secs())),
        ],
    );
    log::success(&format!(
        "Dataset saved to {}",
        summary.dataset_path.display()
    ));
}
