//! HTML parsing infrastructure
//!
//! Turns a monthly report page into `PageMetrics`.

pub mod error;
pub mod metric_extractor;

pub use error::{ParsingError, ParsingResult};
pub use metric_extractor::MetricExtractor;
