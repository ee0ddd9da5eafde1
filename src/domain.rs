//! Domain module - value types of the statistics pipeline
//!
//! Coordinates, metrics, the aggregate time series and the states a crawl
//! moves through. Nothing in here performs I/O.

pub mod aggregate;
pub mod coordinate;
pub mod events;
pub mod metric;
pub mod series;
pub mod url_enumerator;

pub use aggregate::Aggregate;
pub use coordinate::{CoordinateError, TimeCoordinate, YearRange, FIRST_ARCHIVE_YEAR};
pub use events::{RunState, TaskState};
pub use metric::{MetricName, MetricValue, PageMetrics};
pub use url_enumerator::{PageTarget, UrlEnumerator};
