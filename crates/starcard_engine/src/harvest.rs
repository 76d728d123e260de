use std::collections::HashSet;
use std::sync::Arc;

use engine_logging::{engine_info, engine_warn, RunLogger};
use starcard_core::RetryPolicy;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::coordinator::{Coordinator, CoordinatorSettings};
use crate::extract::MetaTagExtractor;
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher};
use crate::normalize::{ImageNormalizer, NormalizeSettings};
use crate::persist::{PersistError, RecordSink, SinkSummary};
use crate::progress::ProgressSink;
use crate::search::{poll_until_complete, GithubSearchSource, SearchSource, GITHUB_SEARCH_ENDPOINT};
use crate::worker::ItemWorker;
use crate::{FailureKind, FetchError, FetchOutcome};

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub search_endpoint: Url,
    /// Accept the first search page even if the index reports it incomplete.
    pub no_incomplete_check: bool,
    pub retry: RetryPolicy,
    pub fetch: FetchSettings,
    pub normalize: NormalizeSettings,
    pub coordinator: CoordinatorSettings,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            search_endpoint: Url::parse(GITHUB_SEARCH_ENDPOINT).expect("valid search endpoint"),
            no_incomplete_check: false,
            retry: RetryPolicy::default(),
            fetch: FetchSettings::default(),
            normalize: NormalizeSettings::default(),
            coordinator: CoordinatorSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub candidates: usize,
    pub stored: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub sink: SinkSummary,
}

/// Failures that abort the whole run; nothing is persisted when one occurs.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("http client setup failed: {0}")]
    Client(FetchError),
    #[error("search failed: {0}")]
    Search(FetchError),
    #[error("run cancelled")]
    Cancelled,
    #[error("storing records failed: {0}")]
    Persist(#[from] PersistError),
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One complete run: search, fan out, collect, replace stored records.
pub struct Harvester {
    source: Arc<dyn SearchSource>,
    coordinator: Coordinator,
    sink: Arc<dyn RecordSink>,
    retry: RetryPolicy,
    no_incomplete_check: bool,
    logger: RunLogger,
}

impl Harvester {
    /// Wire the production components: one shared HTTP client, the search
    /// API source, the meta-tag extractor and the JPEG normalizer.
    pub fn new(
        settings: HarvestSettings,
        sink: Arc<dyn RecordSink>,
        progress: Arc<dyn ProgressSink>,
        logger: RunLogger,
    ) -> Result<Self, HarvestError> {
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(ReqwestFetcher::new(settings.fetch).map_err(HarvestError::Client)?);
        let source = Arc::new(GithubSearchSource::new(
            settings.search_endpoint,
            fetcher.clone(),
            logger.scoped("search"),
        ));
        let worker = ItemWorker::new(
            fetcher,
            Arc::new(MetaTagExtractor),
            ImageNormalizer::new(settings.normalize, logger.scoped("normalize")),
            progress,
            logger.scoped("worker"),
        );
        let coordinator = Coordinator::new(
            worker,
            settings.coordinator,
            logger.scoped("coordinator"),
        );
        Ok(Self::from_parts(
            source,
            coordinator,
            sink,
            settings.retry,
            settings.no_incomplete_check,
            logger,
        ))
    }

    pub fn from_parts(
        source: Arc<dyn SearchSource>,
        coordinator: Coordinator,
        sink: Arc<dyn RecordSink>,
        retry: RetryPolicy,
        no_incomplete_check: bool,
        logger: RunLogger,
    ) -> Self {
        Self {
            source,
            coordinator,
            sink,
            retry,
            no_incomplete_check,
            logger,
        }
    }

    pub async fn run(
        &self,
        cancel: &CancellationToken,
        generated_utc: &str,
    ) -> Result<HarvestSummary, HarvestError> {
        let page = poll_until_complete(
            self.source.as_ref(),
            self.retry,
            self.no_incomplete_check,
            cancel,
            &self.logger,
        )
        .await
        .map_err(|err| match err.kind {
            FailureKind::Cancelled => HarvestError::Cancelled,
            _ => HarvestError::Search(err),
        })?;

        let candidates = page.items.len();
        engine_info!(
            self.logger,
            "Search returned {} candidates (total_count={})",
            candidates,
            page.total_count
        );

        let mut outcomes = self.coordinator.run(page.items);
        let mut records = Vec::with_capacity(candidates);
        let mut seen = HashSet::with_capacity(candidates);
        let mut failed = 0;
        let mut duplicates = 0;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                outcome = outcomes.next_outcome() => outcome,
            };
            match outcome {
                None => break,
                Some(FetchOutcome::Success(record)) => {
                    if seen.insert(record.url().clone()) {
                        records.push(record);
                    } else {
                        engine_warn!(self.logger, "Dropping duplicate record repo_url={}", record.url());
                        duplicates += 1;
                    }
                }
                Some(FetchOutcome::Failure { .. }) => failed += 1,
            }
        }

        let stored = records.len();
        let sink = self.sink.clone();
        let generated_utc = generated_utc.to_string();
        let summary =
            tokio::task::spawn_blocking(move || sink.replace_all(&records, &generated_utc)).await??;

        engine_info!(
            self.logger,
            "Saved OG images successfully: {} stored, {} failed, {} duplicates",
            stored,
            failed,
            duplicates
        );
        Ok(HarvestSummary {
            candidates,
            stored,
            failed,
            duplicates,
            sink: summary,
        })
    }
}
