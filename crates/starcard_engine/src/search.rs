use std::sync::Arc;

use engine_logging::{engine_info, engine_warn, RunLogger};
use starcard_core::RetryPolicy;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::{ContentKind, Fetcher};
use crate::{FailureKind, FetchError, SearchPage};

pub const GITHUB_SEARCH_ENDPOINT: &str = "https://api.github.com/search/repositories";

/// Largest page the search API serves.
pub const SEARCH_PAGE_SIZE: u32 = 100;

#[async_trait::async_trait]
pub trait SearchSource: Send + Sync {
    async fn fetch(&self) -> Result<SearchPage, FetchError>;
}

/// Top repositories by stars, one page, most starred first.
pub struct GithubSearchSource {
    endpoint: Url,
    fetcher: Arc<dyn Fetcher>,
    logger: RunLogger,
}

impl GithubSearchSource {
    pub fn new(endpoint: Url, fetcher: Arc<dyn Fetcher>, logger: RunLogger) -> Self {
        Self {
            endpoint,
            fetcher,
            logger,
        }
    }

    pub fn query_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", "stars:>0")
            .append_pair("sort", "stars")
            .append_pair("order", "desc")
            .append_pair("per_page", &SEARCH_PAGE_SIZE.to_string());
        url
    }
}

#[async_trait::async_trait]
impl SearchSource for GithubSearchSource {
    async fn fetch(&self) -> Result<SearchPage, FetchError> {
        engine_info!(
            self.logger,
            "Fetching top {} repositories by stars",
            SEARCH_PAGE_SIZE
        );
        let output = self
            .fetcher
            .fetch(&self.query_url(), ContentKind::Json)
            .await?;
        serde_json::from_slice(&output.bytes)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
    }
}

/// Re-query while the search index reports incomplete results.
///
/// Returns the first complete page, or any page when `no_check` is set. Once
/// `policy` runs out of attempts the last incomplete page is returned with a
/// warning. Fetch errors are returned immediately. Cancelling `cancel` during
/// a wait yields `FailureKind::Cancelled`.
pub async fn poll_until_complete(
    source: &dyn SearchSource,
    policy: RetryPolicy,
    no_check: bool,
    cancel: &CancellationToken,
    logger: &RunLogger,
) -> Result<SearchPage, FetchError> {
    let mut attempt = 1;
    loop {
        let page = source.fetch().await?;
        if no_check || !page.incomplete {
            return Ok(page);
        }

        attempt += 1;
        let Some(delay) = policy.delay_before(attempt) else {
            engine_warn!(
                logger,
                "Results still incomplete after {} attempts, continuing with {} items",
                attempt - 1,
                page.items.len()
            );
            return Ok(page);
        };

        engine_warn!(
            logger,
            "Incomplete results, retrying in {}s...",
            delay.as_secs_f32()
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(FetchError::new(FailureKind::Cancelled, "search polling cancelled"));
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
