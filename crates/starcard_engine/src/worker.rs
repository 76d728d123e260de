use std::sync::Arc;

use engine_logging::{engine_debug, engine_warn, RunLogger};

use crate::decode::decode_html;
use crate::extract::PreviewExtractor;
use crate::fetch::{ContentKind, Fetcher};
use crate::normalize::ImageNormalizer;
use crate::progress::ProgressSink;
use crate::{CandidateItem, FetchError, FetchOutcome, ItemProgress, RepoRecord, Stage};

/// Turns one search item into one outcome: page → preview URL → image → record.
pub struct ItemWorker {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PreviewExtractor>,
    normalizer: ImageNormalizer,
    progress: Arc<dyn ProgressSink>,
    logger: RunLogger,
}

impl ItemWorker {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn PreviewExtractor>,
        normalizer: ImageNormalizer,
        progress: Arc<dyn ProgressSink>,
        logger: RunLogger,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            normalizer,
            progress,
            logger,
        }
    }

    /// Never fails: any error is folded into `FetchOutcome::Failure` with the
    /// item's page URL as context. No retries.
    pub async fn run(&self, index: usize, item: CandidateItem) -> FetchOutcome {
        let context = item.context();
        match self.process(index, &item, &context).await {
            Ok(record) => {
                self.emit(index, &context, Stage::Done);
                FetchOutcome::Success(record)
            }
            Err(error) => {
                engine_warn!(
                    self.logger,
                    "Skipping repo because of error repo_url={} error={}",
                    context,
                    error
                );
                FetchOutcome::Failure { error, context }
            }
        }
    }

    async fn process(
        &self,
        index: usize,
        item: &CandidateItem,
        context: &str,
    ) -> Result<RepoRecord, FetchError> {
        let page_url = item.page_url()?;

        self.emit(index, context, Stage::FetchingPage);
        engine_debug!(self.logger, "Getting OG image url repo_url={}", page_url);
        let page = self.fetcher.fetch(&page_url, ContentKind::Html).await?;

        self.emit(index, context, Stage::ExtractingPreview);
        let decoded = decode_html(&page.bytes, page.metadata.content_type.as_deref());
        if decoded.had_errors {
            engine_debug!(
                self.logger,
                "Page had malformed {} sequences repo_url={}",
                decoded.encoding_label,
                page_url
            );
        }
        let image_url = self
            .extractor
            .extract(&decoded.html, Some(&page.metadata.final_url))?;

        self.emit(index, context, Stage::FetchingImage);
        engine_debug!(self.logger, "Downloading OG image img_url={}", image_url);
        let image = self.fetcher.fetch(&image_url, ContentKind::Image).await?;

        self.emit(index, context, Stage::Normalizing);
        let normalized = self
            .normalizer
            .normalize_offloaded(image.bytes, image_url)
            .await?;

        RepoRecord::new(
            page_url,
            item.full_name(),
            item.description(),
            item.stargazers_count(),
            normalized,
        )
    }

    pub(crate) fn mark_queued(&self, index: usize, context: &str) {
        self.emit(index, context, Stage::Queued);
    }

    fn emit(&self, index: usize, context: &str, stage: Stage) {
        self.progress.emit(ItemProgress {
            index,
            context: context.to_string(),
            stage,
        });
    }
}
