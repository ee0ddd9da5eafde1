//! # Aggregate
//!
//! Three-level `metric -> year -> month -> value` time series accumulated over a
//! run. `merge` is the only mutator: it is idempotent for a given page and
//! commutative across distinct coordinates, and a later write to the same
//! coordinate replaces the earlier one.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

use super::coordinate::TimeCoordinate;
use super::metric::{MetricName, MetricValue, PageMetrics};

type MonthMap = BTreeMap<String, MetricValue>;
type YearMap = BTreeMap<String, MonthMap>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    metrics: BTreeMap<MetricName, YearMap>,
}

impl Aggregate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes every reading of `page` under its coordinate, creating the year
    /// and month levels on demand. Returns the number of entries written.
    pub fn merge(&mut self, page: &PageMetrics) -> usize {
        let coordinate = page.coordinate();
        let (year_key, month_key) = (coordinate.year_key(), coordinate.month_key());

        let mut written = 0;
        for (metric, value) in page.iter() {
            self.metrics
                .entry(metric)
                .or_default()
                .entry(year_key.clone())
                .or_default()
                .insert(month_key.clone(), value.clone());
            written += 1;
        }
        written
    }

    #[must_use]
    pub fn get(&self, metric: MetricName, coordinate: TimeCoordinate) -> Option<&MetricValue> {
        self.metrics
            .get(&metric)?
            .get(&coordinate.year_key())?
            .get(&coordinate.month_key())
    }

    /// True if any metric has an entry for `coordinate`
    #[must_use]
    pub fn contains_coordinate(&self, coordinate: TimeCoordinate) -> bool {
        MetricName::ALL
            .into_iter()
            .any(|metric| self.get(metric, coordinate).is_some())
    }

    /// Every coordinate holding at least one entry, ascending
    #[must_use]
    pub fn coordinates(&self) -> BTreeSet<TimeCoordinate> {
        self.entries().map(|(_, coordinate, _)| coordinate).collect()
    }

    /// Total number of `(metric, year, month)` entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Readings for one metric in ascending coordinate order
    pub fn series(&self, metric: MetricName) -> impl Iterator<Item = (TimeCoordinate, &MetricValue)> {
        self.metrics
            .get(&metric)
            .into_iter()
            .flat_map(|years| years.iter())
            .flat_map(|(year, months)| {
                months.iter().filter_map(move |(month, value)| {
                    TimeCoordinate::from_keys(year, month)
                        .ok()
                        .map(|coordinate| (coordinate, value))
                })
            })
    }

    /// All entries as `(metric, coordinate, value)`
    pub fn entries(&self) -> impl Iterator<Item = (MetricName, TimeCoordinate, &MetricValue)> {
        MetricName::ALL.into_iter().flat_map(move |metric| {
            self.series(metric)
                .map(move |(coordinate, value)| (metric, coordinate, value))
        })
    }

    /// Regroups the aggregate per coordinate. Merging the returned pages into
    /// an empty aggregate reproduces `self`.
    #[must_use]
    pub fn pages(&self) -> Vec<PageMetrics> {
        let mut pages: BTreeMap<TimeCoordinate, PageMetrics> = BTreeMap::new();
        for (metric, coordinate, value) in self.entries() {
            pages
                .entry(coordinate)
                .or_insert_with(|| PageMetrics::new(coordinate))
                .insert(metric, value.clone());
        }
        pages.into_values().collect()
    }
}

/// Always emits every metric as a top-level key, empty or not, so downstream
/// readers can index any metric unconditionally.
impl Serialize for Aggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let empty = YearMap::new();
        let mut map = serializer.serialize_map(Some(MetricName::ALL.len()))?;
        for metric in MetricName::ALL {
            map.serialize_entry(&metric, self.metrics.get(&metric).unwrap_or(&empty))?;
        }
        map.end()
    }
}
