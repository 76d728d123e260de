use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use log::LevelFilter;
use serde::Deserialize;
use starcard_core::RetryPolicy;
use starcard_engine::{
    CoordinatorSettings, FetchSettings, HarvestSettings, NormalizeSettings, GITHUB_SEARCH_ENDPOINT,
};
use url::Url;

use super::logging::LogDestination;

const DEFAULT_CONFIG_FILE: &str = "starcard.ron";
const CONFIG_PATH_VAR: &str = "STARCARD_CONFIG";

/// Binary configuration: optional `starcard.ron`, then environment overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub search_endpoint: String,
    pub no_incomplete_check: bool,
    pub max_concurrency: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub max_response_bytes: u64,
    pub jpeg_quality: u8,
    pub log_to: LogDestination,
    pub verbose: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let fetch = FetchSettings::default();
        Self {
            output_dir: PathBuf::from("output"),
            search_endpoint: GITHUB_SEARCH_ENDPOINT.to_string(),
            no_incomplete_check: false,
            max_concurrency: CoordinatorSettings::default().max_concurrency,
            retry_max_attempts: retry.max_attempts,
            retry_base_delay_secs: retry.base_delay.as_secs(),
            retry_max_delay_secs: retry.max_delay.as_secs(),
            request_timeout_secs: fetch.request_timeout.as_secs(),
            max_response_bytes: fetch.max_bytes,
            jpeg_quality: NormalizeSettings::default().jpeg_quality,
            log_to: LogDestination::default(),
            verbose: false,
        }
    }
}

impl AppConfig {
    /// Reads the process environment once.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// `lookup` stands in for the environment.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let path = lookup(CONFIG_PATH_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let mut config = match &path {
            Some(path) => Self::from_file(path)?,
            None => Self::from_optional_file(Path::new(DEFAULT_CONFIG_FILE))?,
        };
        config.apply_env_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        ron::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// The default file is optional; an explicitly named one is not.
    fn from_optional_file(path: &Path) -> anyhow::Result<Self> {
        match fs::metadata(path) {
            Ok(_) => Self::from_file(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err).with_context(|| format!("reading config {}", path.display())),
        }
    }

    fn apply_env_overrides(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(dir) = lookup("OUTPUT_DIR").filter(|v| !v.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        // Any non-empty value switches the completeness check off.
        if lookup("NO_INCOMPLETE_CHECK").is_some_and(|v| !v.is_empty()) {
            self.no_incomplete_check = true;
        }
        if let Some(raw) = lookup("MAX_CONCURRENCY").filter(|v| !v.is_empty()) {
            self.max_concurrency = raw
                .trim()
                .parse()
                .with_context(|| format!("MAX_CONCURRENCY must be a positive integer, got {raw:?}"))?;
        }
        if let Some(endpoint) = lookup("SEARCH_ENDPOINT").filter(|v| !v.is_empty()) {
            self.search_endpoint = endpoint;
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrency == 0 {
            bail!("max_concurrency must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        if self.max_response_bytes == 0 {
            bail!("max_response_bytes must be at least 1");
        }
        if self.retry_max_attempts == 0 {
            bail!("retry_max_attempts must be at least 1");
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("jpeg_quality must be between 1 and 100, got {}", self.jpeg_quality);
        }
        if self.output_dir.as_os_str().is_empty() {
            bail!("output_dir must not be empty");
        }
        Url::parse(&self.search_endpoint)
            .with_context(|| format!("invalid search_endpoint {:?}", self.search_endpoint))?;
        Ok(())
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    pub fn harvest_settings(&self) -> anyhow::Result<HarvestSettings> {
        let search_endpoint = Url::parse(&self.search_endpoint)
            .with_context(|| format!("invalid search_endpoint {:?}", self.search_endpoint))?;
        Ok(HarvestSettings {
            search_endpoint,
            no_incomplete_check: self.no_incomplete_check,
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay: Duration::from_secs(self.retry_base_delay_secs),
                max_delay: Duration::from_secs(self.retry_max_delay_secs),
            },
            fetch: FetchSettings {
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                max_bytes: self.max_response_bytes,
                ..FetchSettings::default()
            },
            normalize: NormalizeSettings {
                jpeg_quality: self.jpeg_quality,
                ..NormalizeSettings::default()
            },
            coordinator: CoordinatorSettings {
                max_concurrency: self.max_concurrency,
                ..CoordinatorSettings::default()
            },
        })
    }
}
