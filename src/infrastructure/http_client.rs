//! HTTP page fetcher
//!
//! One request per call, bounded by a timeout. Transport errors and non-2xx
//! statuses both come back as `FetchResult::Failure`; nothing is raised out of
//! `fetch`. Retry is the orchestrator's concern.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::infrastructure::config::WorkerConfig;

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Server answered with a non-success status
    Status(u16),
    /// Request exceeded the configured timeout
    Timeout,
    /// Connection could not be established
    Connect(String),
    /// Any other request-level error
    Request(String),
    /// Response body could not be read or decoded
    Body(String),
}

impl FailureReason {
    /// Deterministic classification: timeouts, connect errors, 408, 429 and
    /// 5xx are transient, everything else is permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status(code) => {
                let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                status.is_server_error()
                    || matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS)
            }
            Self::Request(_) | Self::Body(_) => false,
        }
    }

    fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::Connect(error.to_string())
        } else if error.is_body() || error.is_decode() {
            Self::Body(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Request(error.to_string())
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(code) => write!(f, "HTTP status {code}"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Connect(detail) => write!(f, "connection failed: {detail}"),
            Self::Request(detail) => write!(f, "request failed: {detail}"),
            Self::Body(detail) => write!(f, "failed to read response body: {detail}"),
        }
    }
}

/// A failed fetch, tagged with its URL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} ({url})")]
pub struct FetchFailure {
    pub url: String,
    pub reason: FailureReason,
}

impl FetchFailure {
    pub fn new(url: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            url: url.into(),
            reason,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.reason.is_retryable()
    }
}

/// Outcome of a single fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success { url: String, content: String },
    Failure(FetchFailure),
}

impl FetchResult {
    pub fn success(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Success {
            url: url.into(),
            content: content.into(),
        }
    }

    pub fn failure(url: impl Into<String>, reason: FailureReason) -> Self {
        Self::Failure(FetchFailure::new(url, reason))
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Converts into a `Result` for `?`-style handling
    pub fn into_result(self) -> Result<String, FetchFailure> {
        match self {
            Self::Success { content, .. } => Ok(content),
            Self::Failure(failure) => Err(failure),
        }
    }
}

/// Source of raw report pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Performs one request for `url`. Never panics or raises on network errors.
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
    /// Whether to follow redirects
    pub follow_redirects: bool,
}

impl HttpClientConfig {
    /// Create HttpClientConfig from WorkerConfig
    #[must_use]
    pub fn from_worker_config(worker_config: &WorkerConfig) -> Self {
        Self {
            timeout: worker_config.request_timeout(),
            user_agent: worker_config.user_agent.clone(),
            follow_redirects: true,
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from_worker_config(&WorkerConfig::default())
    }
}

/// reqwest-backed fetcher. The inner client pools connections and is shared
/// by every task; it carries no per-task state.
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: Client,
    config: HttpClientConfig,
}

impl HttpPageFetcher {
    /// Create a new HTTP fetcher from WorkerConfig
    pub fn from_worker_config(worker_config: &WorkerConfig) -> reqwest::Result<Self> {
        Self::with_config(HttpClientConfig::from_worker_config(worker_config))
    }

    /// Create a new HTTP fetcher with custom configuration
    pub fn with_config(config: HttpClientConfig) -> reqwest::Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .brotli(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()?;

        Ok(Self { client, config })
    }

    #[must_use]
    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        debug!("🌐 HTTP GET: {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = FailureReason::from_reqwest(&e);
                warn!("⚠️ Network error for {}: {}", url, reason);
                return FetchResult::failure(url, reason);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("❌ HTTP error {}: {}", status, url);
            return FetchResult::failure(url, FailureReason::Status(status.as_u16()));
        }

        match response.text().await {
            Ok(content) => {
                info!("✅ Fetched {} ({} bytes)", url, content.len());
                FetchResult::success(url, content)
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    FailureReason::Timeout
                } else {
                    FailureReason::Body(e.to_string())
                };
                warn!("⚠️ Failed to read body of {}: {}", url, reason);
                FetchResult::failure(url, reason)
            }
        }
    }
}
