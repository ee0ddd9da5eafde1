//! Outcome report of a crawl run

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{RunState, TimeCoordinate};
use crate::infrastructure::http_client::FailureReason;

/// A page that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPage {
    pub coordinate: TimeCoordinate,
    pub url: String,
    pub reason: String,
    pub attempts: u32,
}

impl FailedPage {
    #[must_use]
    pub fn new(coordinate: TimeCoordinate, url: String, reason: &FailureReason, attempts: u32) -> Self {
        Self {
            coordinate,
            url,
            reason: reason.to_string(),
            attempts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    /// Pages enumerated for the run
    pub total: usize,
    /// Pages fetched, extracted and merged
    pub succeeded: usize,
    /// Failures in ascending coordinate order
    pub failed: Vec<FailedPage>,
    /// Pages skipped because a resumed aggregate already held them
    pub resumed: usize,
    /// Pages never dispatched because the run was cancelled
    pub cancelled: usize,
    /// Entries in the aggregate at the end of the run
    pub entries: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    #[must_use]
    pub fn failed_urls(&self) -> Vec<&str> {
        self.failed.iter().map(|page| page.url.as_str()).collect()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Report including one line per failed URL
    #[must_use]
    pub fn detailed(&self) -> DetailedSummary<'_> {
        DetailedSummary(self)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Run {} {}: {} pages, {} succeeded, {} failed, {} resumed, {} cancelled, {} entries in {:.1}s",
            self.run_id,
            self.state,
            self.total,
            self.succeeded,
            self.failed.len(),
            self.resumed,
            self.cancelled,
            self.entries,
            self.elapsed.as_secs_f64()
        )
    }
}

pub struct DetailedSummary<'a>(&'a RunSummary);

impl fmt::Display for DetailedSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        for page in &self.0.failed {
            write!(
                f,
                "\n  {} {} ({}, {} attempt{})",
                page.coordinate,
                page.url,
                page.reason,
                page.attempts,
                if page.attempts == 1 { "" } else { "s" }
            )?;
        }
        Ok(())
    }
}
