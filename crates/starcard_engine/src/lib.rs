//! Starcard engine: search, per-repository fetch pipeline, fan-in and storage.
mod coordinator;
mod decode;
mod extract;
mod fetch;
mod filename;
mod harvest;
mod normalize;
mod persist;
mod progress;
mod search;
mod types;
mod worker;

pub use coordinator::{Coordinator, CoordinatorSettings, OutcomeStream};
pub use decode::{decode_html, DecodedHtml};
pub use extract::{MarkerScanExtractor, MetaTagExtractor, PreviewExtractor, OG_IMAGE_PROPERTY};
pub use fetch::{ContentKind, FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::deterministic_filename;
pub use harvest::{HarvestError, HarvestSettings, HarvestSummary, Harvester};
pub use normalize::{ImageNormalizer, NormalizeSettings, OG_IMAGE_HEIGHT, OG_IMAGE_HOST};
pub use persist::{
    ensure_output_dir, read_manifest, AtomicFileWriter, DirectorySink, Manifest, ManifestEntry,
    PersistError, RecordSink, SinkSummary, MANIFEST_FILENAME,
};
pub use progress::{NoopProgressSink, ProgressSink};
pub use search::{
    poll_until_complete, GithubSearchSource, SearchSource, GITHUB_SEARCH_ENDPOINT,
    SEARCH_PAGE_SIZE,
};
pub use types::{
    CandidateItem, FailureKind, FetchError, FetchMetadata, FetchOutcome, FetchOutput,
    ItemProgress, RepoRecord, SearchPage, Stage, MISSING_URL_CONTEXT,
};
pub use worker::ItemWorker;
