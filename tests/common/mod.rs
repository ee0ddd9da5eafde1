//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use phishtank_stats_lib::infrastructure::config::CrawlerConfig;
use phishtank_stats_lib::infrastructure::http_client::{FailureReason, FetchResult, PageFetcher};

pub const TEMPLATE: &str = "http://archive.test/stats/{year}/{month}/";

pub fn url(year: u16, month: u8) -> String {
    format!("http://archive.test/stats/{year}/{month:02}/")
}

/// Report page markup with one heading per `(label, value)`; `None` renders
/// the heading without a value node
pub fn report_page(headings: &[(&str, Option<&str>)]) -> String {
    let body: String = headings
        .iter()
        .map(|(label, value)| match value {
            Some(value) => format!("<h3>{label}: <b>{value}</b></h3>\n"),
            None => format!("<h3>{label}:</h3>\n"),
        })
        .collect();
    format!("<html><body><div class=\"padded\">\n{body}</div></body></html>")
}

/// In-memory fetcher serving canned results per URL. A URL with several
/// results serves them in order and then repeats the last one; unknown URLs
/// answer 404.
#[derive(Default)]
pub struct CannedFetcher {
    responses: HashMap<String, Vec<FetchResult>>,
    calls: Mutex<HashMap<String, usize>>,
    jitter: bool,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        let result = FetchResult::success(url.clone(), body);
        self.responses.insert(url, vec![result]);
        self
    }

    pub fn failing(mut self, url: impl Into<String>, reason: FailureReason) -> Self {
        let url = url.into();
        let result = FetchResult::failure(url.clone(), reason);
        self.responses.insert(url, vec![result]);
        self
    }

    pub fn sequence(mut self, url: impl Into<String>, results: Vec<FetchResult>) -> Self {
        self.responses.insert(url.into(), results);
        self
    }

    /// Delays each response by a few milliseconds derived from its URL so
    /// completion order differs from dispatch order
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl PageFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> FetchResult {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_default();
            *count += 1;
            *count
        };

        if self.jitter {
            let spread = url.bytes().map(u64::from).sum::<u64>() % 7;
            tokio::time::sleep(Duration::from_millis(spread)).await;
        }

        match self.responses.get(url) {
            Some(results) if !results.is_empty() => results[(call - 1).min(results.len() - 1)].clone(),
            _ => FetchResult::failure(url, FailureReason::Status(404)),
        }
    }
}

pub fn config(output: &std::path::Path, first_year: u16, last_year: u16) -> CrawlerConfig {
    let mut config = CrawlerConfig::default();
    config.source.url_template = TEMPLATE.to_string();
    config.source.first_year = first_year;
    config.source.last_year = last_year;
    config.output.path = output.to_path_buf();
    config
}
