//! Read-side view consumed by the statistics and plotting collaborators.
//!
//! Numeric coercion lives here, outside the pipeline: the aggregate keeps raw
//! strings and only readers turn them into numbers.

use super::aggregate::Aggregate;
use super::coordinate::TimeCoordinate;
use super::metric::{MetricName, MetricValue};

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint<'a> {
    pub coordinate: TimeCoordinate,
    pub value: &'a MetricValue,
}

impl SeriesPoint<'_> {
    /// Strips thousands separators and parses the reading. Absent or empty
    /// readings, and non-numeric ones such as durations, yield `None`.
    #[must_use]
    pub fn numeric(&self) -> Option<f64> {
        let raw = self.value.as_raw()?.trim();
        if raw.is_empty() {
            return None;
        }
        raw.replace(',', "").parse::<f64>().ok()
    }
}

/// Ascending time series for one metric
#[must_use]
pub fn time_series(aggregate: &Aggregate, metric: MetricName) -> Vec<SeriesPoint<'_>> {
    aggregate
        .series(metric)
        .map(|(coordinate, value)| SeriesPoint { coordinate, value })
        .collect()
}

/// Numeric points only, skipping readings that do not coerce
#[must_use]
pub fn numeric_series(aggregate: &Aggregate, metric: MetricName) -> Vec<(TimeCoordinate, f64)> {
    time_series(aggregate, metric)
        .into_iter()
        .filter_map(|point| point.numeric().map(|number| (point.coordinate, number)))
        .collect()
}
