//! Infrastructure layer for configuration, logging, network access, HTML
//! parsing and persistence.

pub mod config;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod persistence;

// Re-export commonly used items
pub use config::{ConfigError, CrawlerConfig};
pub use http_client::{FailureReason, FetchFailure, FetchResult, HttpPageFetcher, PageFetcher};
pub use logging::{get_log_directory, init_logging_with_config};
pub use parsing::{MetricExtractor, ParsingError};
pub use persistence::{PersistenceError, Persister};
