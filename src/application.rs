//! Application layer
//!
//! Runs the crawl: dispatches page tasks under the concurrency limit, feeds
//! their results into the aggregation store and reports the outcome.

pub mod aggregation_store;
pub mod orchestrator;
pub mod retry_policy;
pub mod run_summary;

pub use aggregation_store::AggregationStore;
pub use orchestrator::{Orchestrator, RunError};
pub use retry_policy::RetryPolicy;
pub use run_summary::{FailedPage, RunSummary};
