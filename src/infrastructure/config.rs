//! Configuration infrastructure
//!
//! Crawler configuration is layered with the `config` crate:
//! 1. Built-in defaults (every section is `#[serde(default)]`)
//! 2. Optional configuration file (JSON or TOML)
//! 3. Environment variables prefixed `PHISHTANK_STATS`, sections separated by `__`
//!    (e.g. `PHISHTANK_STATS__WORKERS__MAX_CONCURRENT=8`)
//!
//! The loaded value is passed explicitly into the orchestrator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::url_enumerator::{MONTH_PLACEHOLDER, YEAR_PLACEHOLDER};
use crate::domain::{TimeCoordinate, UrlEnumerator, YearRange};

pub const ENV_PREFIX: &str = "PHISHTANK_STATS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete crawler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Which pages to visit
    pub source: SourceConfig,

    /// Network worker settings
    pub workers: WorkerConfig,

    /// Retry policy for transient fetch failures
    pub retry: RetryConfig,

    /// Markup selectors used by the metric extractor
    pub extraction: ExtractionConfig,

    /// Output file and checkpointing
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Report archive location and year range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL template with `{year}` and `{month}` placeholders
    pub url_template: String,

    /// First year to fetch (inclusive)
    pub first_year: u16,

    /// Last year to fetch (inclusive)
    pub last_year: u16,
}

/// Worker configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Maximum fetches in flight at once
    pub max_concurrent: usize,

    /// Request timeout in seconds
    pub request_timeout_seconds: u64,

    /// User agent string
    pub user_agent: String,
}

/// Retry configuration for transient fetch failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per page, 1 disables retry
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound on a single retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Multiplier applied per additional attempt
    pub exponential_factor: f64,

    /// Spread delays by up to ±25%
    pub jitter_enabled: bool,
}

/// CSS selectors for the report page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Heading elements carrying `Label: <b>value</b>`
    pub heading_selector: String,

    /// Emphasised value node inside a heading
    pub value_selector: String,

    /// Optional container restricting where headings are searched
    pub scope_selector: Option<String>,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Aggregate output file
    pub path: PathBuf,

    /// Save after every N merged pages, 0 saves only at the end
    pub checkpoint_every: usize,

    /// Seed the run from an existing output file and skip known coordinates
    pub resume: bool,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files, defaults to `logs/` next to the working directory
    pub log_dir: Option<PathBuf>,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url_template: defaults::URL_TEMPLATE.to_string(),
            first_year: defaults::FIRST_YEAR,
            last_year: defaults::LAST_YEAR,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::MAX_CONCURRENT,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ATTEMPTS,
            base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            max_delay_ms: defaults::RETRY_MAX_DELAY_MS,
            exponential_factor: defaults::RETRY_EXPONENTIAL_FACTOR,
            jitter_enabled: false,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            heading_selector: defaults::HEADING_SELECTOR.to_string(),
            value_selector: defaults::VALUE_SELECTOR.to_string(),
            scope_selector: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::OUTPUT_PATH),
            checkpoint_every: 0,
            resume: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            module_filters: HashMap::new(),
        }
    }
}

impl WorkerConfig {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl CrawlerConfig {
    /// Loads defaults, then `path` if given, then the environment, and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Same layering as `load` without validation, for callers that apply
    /// further overrides and call `validate` themselves.
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Default configuration file location in the user config directory
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("phishtank-stats").join("config.toml"))
    }

    /// Validated year range of the source section
    pub fn year_range(&self) -> Result<YearRange, ConfigError> {
        YearRange::new(self.source.first_year, self.source.last_year)
            .map_err(|e| ConfigError::validation(format!("source year range: {e}")))
    }

    pub fn url_enumerator(&self) -> Result<UrlEnumerator, ConfigError> {
        Ok(UrlEnumerator::new(self.source.url_template.clone(), self.year_range()?))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let years = self.year_range()?;

        let template = &self.source.url_template;
        if !template.contains(YEAR_PLACEHOLDER) || !template.contains(MONTH_PLACEHOLDER) {
            return Err(ConfigError::validation(format!(
                "url_template must contain {YEAR_PLACEHOLDER} and {MONTH_PLACEHOLDER}: {template}"
            )));
        }
        let sample = TimeCoordinate::new(years.first(), 1)
            .map_err(|e| ConfigError::validation(e.to_string()))?;
        let rendered = UrlEnumerator::render(template, sample);
        url::Url::parse(&rendered)
            .map_err(|e| ConfigError::validation(format!("url_template renders an invalid URL {rendered}: {e}")))?;

        if self.workers.max_concurrent == 0 {
            return Err(ConfigError::validation("workers.max_concurrent must be at least 1"));
        }
        if self.workers.request_timeout_seconds == 0 {
            return Err(ConfigError::validation("workers.request_timeout_seconds must be greater than 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::validation("retry.max_attempts must be at least 1"));
        }
        if self.retry.exponential_factor < 1.0 {
            return Err(ConfigError::validation("retry.exponential_factor must be at least 1.0"));
        }
        if self.extraction.heading_selector.trim().is_empty()
            || self.extraction.value_selector.trim().is_empty()
        {
            return Err(ConfigError::validation("extraction selectors must not be empty"));
        }
        if self.output.path.as_os_str().is_empty() {
            return Err(ConfigError::validation("output.path must not be empty"));
        }
        Ok(())
    }
}

/// Default crawling configuration values
pub mod defaults {
    /// Monthly statistics page of the archive
    pub const URL_TEMPLATE: &str = "https://phishtank.org/stats/{year}/{month}/";

    /// First year the archive publishes monthly statistics for
    pub const FIRST_YEAR: u16 = 2009;

    /// Last complete year of statistics
    pub const LAST_YEAR: u16 = 2024;

    /// Default maximum concurrent fetches
    pub const MAX_CONCURRENT: usize = 4;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const USER_AGENT: &str = concat!("phishtank-stats/", env!("CARGO_PKG_VERSION"));

    /// Single attempt, no retry
    pub const MAX_ATTEMPTS: u32 = 1;

    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
    pub const RETRY_MAX_DELAY_MS: u64 = 30_000;
    pub const RETRY_EXPONENTIAL_FACTOR: f64 = 2.0;

    pub const HEADING_SELECTOR: &str = "h3";
    pub const VALUE_SELECTOR: &str = "b, strong";

    pub const OUTPUT_PATH: &str = "datasets/phishtank_stats.json";

    pub const LOG_LEVEL: &str = "info";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = CrawlerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.url_enumerator().unwrap().len(), 12 * 16);
    }

    #[test]
    fn test_rejects_template_without_placeholders() {
        let mut config = CrawlerConfig::default();
        config.source.url_template = "https://phishtank.org/stats/{year}/".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_rejects_invalid_ranges_and_limits() {
        let mut config = CrawlerConfig::default();
        config.source.first_year = 2020;
        config.source.last_year = 2019;
        assert!(config.validate().is_err());

        let mut config = CrawlerConfig::default();
        config.source.first_year = 2005;
        assert!(config.validate().is_err());

        let mut config = CrawlerConfig::default();
        config.workers.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = CrawlerConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{ "source": {{ "first_year": 2015, "last_year": 2016 }}, "workers": {{ "max_concurrent": 8 }} }}"#
        )
        .unwrap();

        let config = CrawlerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.source.first_year, 2015);
        assert_eq!(config.source.last_year, 2016);
        assert_eq!(config.source.url_template, defaults::URL_TEMPLATE);
        assert_eq!(config.workers.max_concurrent, 8);
        assert_eq!(config.workers.request_timeout_seconds, defaults::REQUEST_TIMEOUT_SECONDS);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_unvalidated_load_defers_validation_to_caller() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "source": {{ "first_year": 2020, "last_year": 2012 }} }}"#).unwrap();

        assert!(matches!(
            CrawlerConfig::load(Some(file.path())),
            Err(ConfigError::Validation { .. })
        ));

        let mut config = CrawlerConfig::load_unvalidated(Some(file.path())).unwrap();
        assert!(config.validate().is_err());
        config.source.first_year = 2010;
        assert!(config.validate().is_ok());
    }
}
