use std::fmt;

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

/// Placeholder diagnostic context for items that carry no page URL.
pub const MISSING_URL_CONTEXT: &str = "<missing html_url>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    FetchingPage,
    ExtractingPreview,
    FetchingImage,
    Normalizing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemProgress {
    /// Position of the item in the search page.
    pub index: usize,
    pub context: String,
    pub stage: Stage,
}

/// One entry of the search API `items` array.
///
/// The upstream schema is not ours, so the raw object is kept as-is and the
/// handful of consumed fields are read defensively.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct CandidateItem(Map<String, Value>);

impl CandidateItem {
    pub fn html_url(&self) -> Option<&str> {
        self.str_field("html_url").filter(|url| !url.is_empty())
    }

    pub fn full_name(&self) -> &str {
        self.str_field("full_name").unwrap_or_default()
    }

    /// `null` (no description set) reads as empty.
    pub fn description(&self) -> &str {
        self.str_field("description").unwrap_or_default()
    }

    /// Negative, fractional-negative and non-numeric counts read as 0.
    pub fn stargazers_count(&self) -> u64 {
        match self.0.get("stargazers_count") {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && *f > 0.0)
                        .map(|f| f as u64)
                })
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn page_url(&self) -> Result<Url, FetchError> {
        let raw = self
            .html_url()
            .ok_or_else(|| FetchError::new(FailureKind::UrlParse, "item has no html_url"))?;
        Url::parse(raw).map_err(|err| FetchError::new(FailureKind::UrlParse, err.to_string()))
    }

    /// Identifies the item in diagnostics and failure outcomes.
    pub fn context(&self) -> String {
        self.html_url().unwrap_or(MISSING_URL_CONTEXT).to_string()
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for CandidateItem {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One response of the repository search endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchPage {
    pub total_count: u64,
    /// The search index had not caught up when the query ran.
    #[serde(rename = "incomplete_results")]
    pub incomplete: bool,
    pub items: Vec<CandidateItem>,
}

/// A repository with its normalized preview image, ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRecord {
    url: Url,
    name: String,
    description: String,
    stars: u64,
    image: Bytes,
}

impl RepoRecord {
    /// Fails when `image` is empty; a stored record always has an image.
    pub fn new(
        url: Url,
        name: impl Into<String>,
        description: impl Into<String>,
        stars: u64,
        image: Bytes,
    ) -> Result<Self, FetchError> {
        if image.is_empty() {
            return Err(FetchError::new(
                FailureKind::Encode,
                "normalized image is empty",
            ));
        }
        Ok(Self {
            url,
            name: name.into(),
            description: description.into(),
            stars,
            image,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn stars(&self) -> u64 {
        self.stars
    }

    pub fn image(&self) -> &Bytes {
        &self.image
    }
}

/// Unit flowing through the fan-in stream: exactly one per submitted item.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(RepoRecord),
    Failure { error: FetchError, context: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn record(&self) -> Option<&RepoRecord> {
        match self {
            FetchOutcome::Success(record) => Some(record),
            FetchOutcome::Failure { .. } => None,
        }
    }

    /// The page URL of the item this outcome belongs to.
    pub fn context(&self) -> &str {
        match self {
            FetchOutcome::Success(record) => record.url().as_str(),
            FetchOutcome::Failure { context, .. } => context,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: Url,
    pub final_url: Url,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport failure reaching the remote host.
    Network,
    Timeout,
    RedirectLimitExceeded,
    HttpStatus(u16),
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    /// Structured data or image bytes could not be decoded.
    Decode,
    Encode,
    /// The page declares no usable preview image.
    Extraction,
    UrlParse,
    /// Crop precondition violated.
    Transform,
    /// The worker task died before producing an outcome.
    TaskFailed,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "decode error"),
            FailureKind::Encode => write!(f, "encode error"),
            FailureKind::Extraction => write!(f, "extraction error"),
            FailureKind::UrlParse => write!(f, "url parse error"),
            FailureKind::Transform => write!(f, "transform error"),
            FailureKind::TaskFailed => write!(f, "worker task failed"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}
