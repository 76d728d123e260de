#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine_logging::RunLogger;
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::json;
use starcard_engine::{
    CandidateItem, ContentKind, Coordinator, CoordinatorSettings, FailureKind, FetchError,
    FetchMetadata, FetchOutput, Fetcher, ImageNormalizer, ItemProgress, ItemWorker,
    MetaTagExtractor, NormalizeSettings, PreviewExtractor, ProgressSink,
};
use url::Url;

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| Rgb([(x % 255) as u8, 90, 160]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn repo_page(image_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head>
        <meta property="og:site_name" content="GitHub">
        <meta property="og:image" content="{image_url}">
        </head><body><h1>repo</h1></body></html>"#
    )
}

pub fn item(n: usize) -> CandidateItem {
    serde_json::from_value(json!({
        "html_url": format!("https://github.com/owner/repo{n}"),
        "full_name": format!("owner/repo{n}"),
        "description": format!("Repository number {n}"),
        "stargazers_count": 1000 - n,
    }))
    .unwrap()
}

#[derive(Clone)]
struct StubResponse {
    result: Result<(Option<String>, Vec<u8>), FetchError>,
    delay: Duration,
}

/// In-memory fetcher keyed by absolute URL; records concurrency.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, StubResponse>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, content_type: &str, body: Vec<u8>) -> &Self {
        self.serve_delayed(url, content_type, body, Duration::ZERO)
    }

    pub fn serve_delayed(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
        delay: Duration,
    ) -> &Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            StubResponse {
                result: Ok((Some(content_type.to_string()), body)),
                delay,
            },
        );
        self
    }

    pub fn fail(&self, url: &str, kind: FailureKind) -> &Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            StubResponse {
                result: Err(FetchError::new(kind, "stubbed failure")),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Serves item `n`'s page and a small image from a third-party host.
    pub fn serve_repo(&self, n: usize) -> &Self {
        self.serve_repo_delayed(n, Duration::ZERO)
    }

    pub fn serve_repo_delayed(&self, n: usize, page_delay: Duration) -> &Self {
        let image_url = format!("https://img.example/{n}.png");
        self.serve_delayed(
            &format!("https://github.com/owner/repo{n}"),
            "text/html; charset=utf-8",
            repo_page(&image_url).into_bytes(),
            page_delay,
        );
        self.serve(&image_url, "image/png", png(120, 80))
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url, _kind: ContentKind) -> Result<FetchOutput, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.responses.lock().unwrap().get(url.as_str()).cloned();
        let Some(response) = response else {
            return Err(FetchError::new(FailureKind::HttpStatus(404), "not stubbed"));
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (content_type, bytes) = response.result?;
        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.clone(),
                final_url: url.clone(),
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ItemProgress>>,
}

impl RecordingProgress {
    pub fn take(&self) -> Vec<ItemProgress> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, progress: ItemProgress) {
        self.events.lock().unwrap().push(progress);
    }
}

/// Panics on pages containing `marker`, otherwise reads og:image normally.
pub struct PanicOnMarker(pub &'static str);

impl PreviewExtractor for PanicOnMarker {
    fn extract(&self, html: &str, base: Option<&Url>) -> Result<Url, FetchError> {
        if html.contains(self.0) {
            panic!("extractor blew up");
        }
        MetaTagExtractor.extract(html, base)
    }
}

pub fn worker_with(
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PreviewExtractor>,
    progress: Arc<dyn ProgressSink>,
) -> ItemWorker {
    let logger = RunLogger::new(1);
    ItemWorker::new(
        fetcher,
        extractor,
        ImageNormalizer::new(NormalizeSettings::default(), logger.scoped("normalize")),
        progress,
        logger.scoped("worker"),
    )
}

pub fn coordinator_with(
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn PreviewExtractor>,
    max_concurrency: usize,
) -> Coordinator {
    let worker = worker_with(
        fetcher,
        extractor,
        Arc::new(starcard_engine::NoopProgressSink),
    );
    Coordinator::new(
        worker,
        CoordinatorSettings {
            max_concurrency,
            ..CoordinatorSettings::default()
        },
        RunLogger::new(1).scoped("coordinator"),
    )
}
