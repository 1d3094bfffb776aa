// src/services/paginator.rs

//! Multi-source pagination.
//!
//! Sources are paged concurrently (one in-flight request per source at most),
//! while pages of one source are strictly sequential because page N+1 needs
//! the cursor from page N. A failure in one source never affects another.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{
    Config, ListingPage, PageRequest, RawPost, RunConfig, SortMode, SourceId, Timeframe,
};
use crate::services::ListingSource;

/// Timing and retry policy for the paginator.
#[derive(Debug, Clone)]
pub struct PaginatorConfig {
    /// Wait between two page requests of the same source
    pub request_delay: Duration,

    /// Extra attempts after a transport failure
    pub max_retries: u32,

    /// Wait before each retry
    pub retry_backoff: Duration,
}

impl From<&RunConfig> for PaginatorConfig {
    fn from(run: &RunConfig) -> Self {
        Self {
            request_delay: Duration::from_millis(run.request_delay_ms),
            max_retries: run.max_retries,
            retry_backoff: Duration::from_millis(run.retry_backoff_ms),
        }
    }
}

/// What to collect in one run.
#[derive(Debug, Clone)]
pub struct CollectRequest {
    source_ids: Vec<SourceId>,
    pub sort_mode: SortMode,
    pub page_size: u32,
    pub max_pages: usize,
    pub timeframe: Timeframe,
}

impl CollectRequest {
    /// Build a request; duplicate sources are collapsed, first occurrence wins.
    pub fn new(
        source_ids: impl IntoIterator<Item = SourceId>,
        sort_mode: SortMode,
        page_size: u32,
        max_pages: usize,
        timeframe: Timeframe,
    ) -> Self {
        let mut seen = HashSet::new();
        let source_ids = source_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Self {
            source_ids,
            sort_mode,
            page_size,
            max_pages: max_pages.max(1),
            timeframe,
        }
    }

    /// Build a request from run configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.unique_sources(),
            config.run.sort_mode,
            config.run.page_size,
            config.run.max_pages,
            config.run.timeframe,
        )
    }

    pub fn source_ids(&self) -> &[SourceId] {
        &self.source_ids
    }

    fn page(&self, source_id: &SourceId, cursor: Option<String>) -> PageRequest {
        PageRequest {
            source_id: source_id.clone(),
            sort_mode: self.sort_mode,
            page_size: self.page_size,
            cursor,
            timeframe: self.timeframe,
        }
    }
}

/// How pagination of one source ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    /// Listing ended (no cursor, or an empty page)
    Exhausted,
    /// `max_pages` pages were consumed
    PageBudgetReached,
    /// First page failed; the source contributed nothing
    Skipped { reason: String },
    /// A later page failed; posts from earlier pages are kept
    Truncated { reason: String },
}

/// Per-source pagination result.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source_id: SourceId,
    pub pages: usize,
    pub posts: usize,
    pub status: SourceStatus,
}

impl SourceReport {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, SourceStatus::Skipped { .. })
    }
}

/// Result of collecting all sources.
#[derive(Debug, Default)]
pub struct CollectOutcome {
    /// Raw posts, grouped by source in request order, page order within a source
    pub posts: Vec<RawPost>,
    pub reports: Vec<SourceReport>,
}

impl CollectOutcome {
    pub fn sources_attempted(&self) -> usize {
        self.reports.len()
    }

    pub fn sources_skipped(&self) -> usize {
        self.reports.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn pages_fetched(&self) -> usize {
        self.reports.iter().map(|r| r.pages).sum()
    }

    /// Whether every attempted source failed outright.
    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty() && self.sources_skipped() == self.reports.len()
    }
}

/// Drives a [`ListingSource`] across sources and pages.
pub struct Paginator {
    source: Arc<dyn ListingSource>,
    config: PaginatorConfig,
}

impl Paginator {
    pub fn new(source: Arc<dyn ListingSource>, config: PaginatorConfig) -> Self {
        Self { source, config }
    }

    /// Collect posts from every source in `request`.
    ///
    /// Not restartable: every call fetches from the first page again.
    pub async fn collect(&self, request: &CollectRequest) -> CollectOutcome {
        let concurrency = request.source_ids.len().max(1);

        let results: Vec<(Vec<RawPost>, SourceReport)> = stream::iter(&request.source_ids)
            .map(|source_id| self.collect_source(source_id, request))
            .buffered(concurrency)
            .collect()
            .await;

        let mut outcome = CollectOutcome::default();
        for (posts, report) in results {
            outcome.posts.extend(posts);
            outcome.reports.push(report);
        }
        outcome
    }

    /// Page through a single source until the listing ends, the page budget
    /// is spent, or a request fails.
    async fn collect_source(
        &self,
        source_id: &SourceId,
        request: &CollectRequest,
    ) -> (Vec<RawPost>, SourceReport) {
        let mut posts = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        let status = loop {
            if pages > 0 && !self.config.request_delay.is_zero() {
                tokio::time::sleep(self.config.request_delay).await;
            }

            let page_request = request.page(source_id, cursor.take());
            let page = match self.fetch_with_retry(&page_request).await {
                Ok(page) => page,
                Err(error) if pages == 0 => {
                    log::warn!("Skipping source {}: {}", source_id, error);
                    break SourceStatus::Skipped {
                        reason: error.to_string(),
                    };
                }
                Err(AppError::EmptyResponse { message, .. }) => {
                    log::debug!(
                        "Source {} ended at page {} with an empty response: {}",
                        source_id,
                        pages + 1,
                        message
                    );
                    break SourceStatus::Exhausted;
                }
                Err(error) => {
                    log::warn!(
                        "Source {} stopped after {} pages: {}",
                        source_id,
                        pages,
                        error
                    );
                    break SourceStatus::Truncated {
                        reason: error.to_string(),
                    };
                }
            };
            pages += 1;

            let ListingPage {
                posts: page_posts,
                after,
            } = page;

            if page_posts.is_empty() {
                if pages == 1 {
                    log::warn!("Empty listing encountered for {}", source_id);
                }
                break SourceStatus::Exhausted;
            }

            log::debug!(
                "Source {} page {}: {} posts",
                source_id,
                pages,
                page_posts.len()
            );
            posts.extend(page_posts);

            match after {
                None => break SourceStatus::Exhausted,
                Some(_) if pages >= request.max_pages => break SourceStatus::PageBudgetReached,
                Some(next) => cursor = Some(next),
            }
        };

        log::info!(
            "Collected {} posts from {} in {} pages",
            posts.len(),
            source_id,
            pages
        );

        let report = SourceReport {
            source_id: source_id.clone(),
            pages,
            posts: posts.len(),
            status,
        };
        (posts, report)
    }

    async fn fetch_with_retry(&self, request: &PageRequest) -> Result<ListingPage> {
        let mut attempt = 0;
        loop {
            match self.source.fetch_page(request).await {
                Err(error @ AppError::Transport { .. }) if attempt < self.config.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "{} (retry {}/{})",
                        error,
                        attempt,
                        self.config.max_retries
                    );
                    if !self.config.retry_backoff.is_zero() {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Clone)]
    enum Reply {
        Page { titles: Vec<&'static str>, after: Option<&'static str> },
        Transport,
        Empty,
    }

    /// Replies keyed by `(source, cursor)`; unknown keys are transport errors.
    #[derive(Default)]
    struct ScriptedSource {
        replies: Mutex<HashMap<(String, Option<String>), Vec<Reply>>>,
        calls: Mutex<Vec<(String, Option<String>, Instant)>>,
        endless: HashSet<String>,
    }

    impl ScriptedSource {
        fn reply(self, source: &str, cursor: Option<&str>, reply: Reply) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry((source.to_string(), cursor.map(String::from)))
                .or_default()
                .push(reply);
            self
        }

        fn endless(mut self, source: &str) -> Self {
            self.endless.insert(source.to_string());
            self
        }

        fn calls_for(&self, source: &str) -> Vec<(Option<String>, Instant)> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _, _)| s == source)
                .map(|(_, c, t)| (c.clone(), *t))
                .collect()
        }
    }

    fn page(source: &SourceId, titles: &[&str], after: Option<String>) -> ListingPage {
        ListingPage {
            posts: titles
                .iter()
                .map(|t| RawPost::new(source.clone(), json!({"data": {"title": t}})))
                .collect(),
            after,
        }
    }

    #[async_trait]
    impl ListingSource for ScriptedSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<ListingPage> {
            let source = request.source_id.as_str().to_string();
            self.calls
                .lock()
                .unwrap()
                .push((source.clone(), request.cursor.clone(), Instant::now()));

            if self.endless.contains(&source) {
                let n = request
                    .cursor
                    .as_deref()
                    .and_then(|c| c.strip_prefix("c"))
                    .and_then(|c| c.parse::<usize>().ok())
                    .unwrap_or(0);
                return Ok(page(
                    &request.source_id,
                    &["post"],
                    Some(format!("c{}", n + 1)),
                ));
            }

            let reply = {
                let mut replies = self.replies.lock().unwrap();
                replies
                    .get_mut(&(source.clone(), request.cursor.clone()))
                    .and_then(|queue| (!queue.is_empty()).then(|| queue.remove(0)))
            };
            match reply {
                Some(Reply::Page { titles, after }) => {
                    Ok(page(&request.source_id, &titles, after.map(String::from)))
                }
                Some(Reply::Empty) => Err(AppError::empty_response(source, "empty body")),
                Some(Reply::Transport) | None => Err(AppError::transport(source, "refused")),
            }
        }
    }

    fn fast_config() -> PaginatorConfig {
        PaginatorConfig {
            request_delay: Duration::from_millis(1),
            max_retries: 0,
            retry_backoff: Duration::ZERO,
        }
    }

    fn request(sources: &[&str], max_pages: usize) -> CollectRequest {
        CollectRequest::new(
            sources.iter().map(|s| SourceId::parse(s).unwrap()),
            SortMode::Hot,
            100,
            max_pages,
            Timeframe::Day,
        )
    }

    fn titles(outcome: &CollectOutcome) -> Vec<String> {
        outcome
            .posts
            .iter()
            .map(|p| p.data().unwrap()["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_follows_cursor_until_end() {
        let source = ScriptedSource::default()
            .reply(
                "memes",
                None,
                Reply::Page { titles: vec!["a", "b"], after: Some("t3_b") },
            )
            .reply(
                "memes",
                Some("t3_b"),
                Reply::Page { titles: vec!["c"], after: None },
            );
        let paginator = Paginator::new(Arc::new(source), fast_config());

        let outcome = paginator.collect(&request(&["memes"], 10)).await;

        assert_eq!(titles(&outcome), vec!["a", "b", "c"]);
        assert_eq!(outcome.pages_fetched(), 2);
        assert_eq!(outcome.reports[0].status, SourceStatus::Exhausted);
    }

    #[tokio::test]
    async fn test_stops_at_page_budget_with_endless_cursor() {
        let source = Arc::new(ScriptedSource::default().endless("memes"));
        let paginator = Paginator::new(source.clone(), fast_config());

        let outcome = paginator.collect(&request(&["memes"], 3)).await;

        assert_eq!(outcome.posts.len(), 3);
        assert_eq!(outcome.reports[0].status, SourceStatus::PageBudgetReached);
        assert_eq!(source.calls_for("memes").len(), 3);
    }

    #[tokio::test]
    async fn test_waits_between_pages_of_one_source() {
        let source = Arc::new(ScriptedSource::default().endless("memes"));
        let config = PaginatorConfig {
            request_delay: Duration::from_millis(30),
            ..fast_config()
        };
        let paginator = Paginator::new(source.clone(), config);

        paginator.collect(&request(&["memes"], 3)).await;

        let calls = source.calls_for("memes");
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1].1.duration_since(pair[0].1) >= Duration::from_millis(30));
        }
        assert_eq!(calls[1].0.as_deref(), Some("c1"));
        assert_eq!(calls[2].0.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let source = ScriptedSource::default()
            .reply("broken", None, Reply::Transport)
            .reply(
                "memes",
                None,
                Reply::Page { titles: vec!["a"], after: None },
            )
            .reply("blank", None, Reply::Empty);
        let paginator = Paginator::new(Arc::new(source), fast_config());

        let outcome = paginator
            .collect(&request(&["broken", "memes", "blank"], 5))
            .await;

        assert_eq!(titles(&outcome), vec!["a"]);
        assert_eq!(outcome.sources_attempted(), 3);
        assert_eq!(outcome.sources_skipped(), 2);
        assert!(!outcome.all_failed());
        assert!(outcome.reports[0].is_skipped());
        assert!(outcome.reports[2].is_skipped());
    }

    #[tokio::test]
    async fn test_empty_first_page_contributes_nothing() {
        let source = ScriptedSource::default()
            .reply(
                "quiet",
                None,
                Reply::Page { titles: vec![], after: Some("t3_x") },
            )
            .reply(
                "memes",
                None,
                Reply::Page { titles: vec!["a"], after: None },
            );
        let paginator = Paginator::new(Arc::new(source), fast_config());

        let outcome = paginator.collect(&request(&["quiet", "memes"], 5)).await;

        assert_eq!(outcome.reports[0].posts, 0);
        assert_eq!(outcome.reports[0].status, SourceStatus::Exhausted);
        assert!(!outcome.reports[0].is_skipped());
        assert_eq!(titles(&outcome), vec!["a"]);
    }

    #[tokio::test]
    async fn test_later_failure_keeps_earlier_pages() {
        let source = ScriptedSource::default()
            .reply(
                "memes",
                None,
                Reply::Page { titles: vec!["a"], after: Some("t3_a") },
            )
            .reply("memes", Some("t3_a"), Reply::Transport);
        let paginator = Paginator::new(Arc::new(source), fast_config());

        let outcome = paginator.collect(&request(&["memes"], 5)).await;

        assert_eq!(titles(&outcome), vec!["a"]);
        assert!(matches!(
            outcome.reports[0].status,
            SourceStatus::Truncated { .. }
        ));
        assert_eq!(outcome.sources_skipped(), 0);
    }

    #[tokio::test]
    async fn test_later_empty_response_ends_source() {
        let source = ScriptedSource::default()
            .reply(
                "memes",
                None,
                Reply::Page { titles: vec!["a"], after: Some("t3_a") },
            )
            .reply("memes", Some("t3_a"), Reply::Empty);
        let paginator = Paginator::new(Arc::new(source), fast_config());

        let outcome = paginator.collect(&request(&["memes"], 5)).await;

        assert_eq!(outcome.reports[0].status, SourceStatus::Exhausted);
        assert_eq!(outcome.posts.len(), 1);
    }

    #[tokio::test]
    async fn test_retries_transport_errors() {
        let source = Arc::new(
            ScriptedSource::default()
                .reply("memes", None, Reply::Transport)
                .reply(
                    "memes",
                    None,
                    Reply::Page { titles: vec!["a"], after: None },
                ),
        );
        let config = PaginatorConfig {
            max_retries: 1,
            ..fast_config()
        };
        let paginator = Paginator::new(source.clone(), config);

        let outcome = paginator.collect(&request(&["memes"], 5)).await;

        assert_eq!(titles(&outcome), vec!["a"]);
        assert_eq!(source.calls_for("memes").len(), 2);
    }

    #[tokio::test]
    async fn test_all_sources_failed() {
        let paginator = Paginator::new(Arc::new(ScriptedSource::default()), fast_config());

        let outcome = paginator.collect(&request(&["a1", "b2"], 5)).await;

        assert!(outcome.all_failed());
        assert!(outcome.posts.is_empty());
    }

    #[test]
    fn test_collect_request_dedupes_sources() {
        let request = request(&["memes", "r/memes", "dankmemes"], 0);
        assert_eq!(request.source_ids().len(), 2);
        assert_eq!(request.max_pages, 1);
    }
}
