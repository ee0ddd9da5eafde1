//! PhishTank statistics collector
//!
//! Fetches the monthly statistics pages of the PhishTank archive, extracts the
//! published metrics and aggregates them into a `metric -> year -> month`
//! time series persisted as JSON.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{Orchestrator, RunError, RunSummary};
pub use domain::{Aggregate, MetricName, MetricValue, TimeCoordinate};
pub use infrastructure::config::CrawlerConfig;
