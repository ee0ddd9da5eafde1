//! # Metrics
//!
//! The closed set of statistics published on each monthly report page, and the
//! raw values extracted for them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::coordinate::TimeCoordinate;

/// One of the fixed statistics published on a monthly report page.
///
/// Serialized under its identifier (`"TotalSubmissions"`); the display label
/// (`"Total Submissions"`) is what appears in the page markup and is accepted
/// as an alias when reading older output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricName {
    #[serde(alias = "Total Submissions")]
    TotalSubmissions,
    #[serde(alias = "Valid Phishes")]
    ValidPhishes,
    #[serde(alias = "Invalid Phishes")]
    InvalidPhishes,
    #[serde(alias = "Total Votes")]
    TotalVotes,
    #[serde(alias = "Median Time To Verify")]
    MedianTimeToVerify,
}

impl MetricName {
    pub const ALL: [Self; 5] = [
        Self::TotalSubmissions,
        Self::ValidPhishes,
        Self::InvalidPhishes,
        Self::TotalVotes,
        Self::MedianTimeToVerify,
    ];

    /// Label as rendered in the report page headings
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TotalSubmissions => "Total Submissions",
            Self::ValidPhishes => "Valid Phishes",
            Self::InvalidPhishes => "Invalid Phishes",
            Self::TotalVotes => "Total Votes",
            Self::MedianTimeToVerify => "Median Time To Verify",
        }
    }

    /// Identifier used as the persisted top-level key
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::TotalSubmissions => "TotalSubmissions",
            Self::ValidPhishes => "ValidPhishes",
            Self::InvalidPhishes => "InvalidPhishes",
            Self::TotalVotes => "TotalVotes",
            Self::MedianTimeToVerify => "MedianTimeToVerify",
        }
    }

    /// Exact match against a heading label. Anything outside the set is `None`.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|metric| metric.label() == label)
    }

    /// Accepts either the identifier or the display label
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.key() == key || metric.label() == key)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw metric reading, kept exactly as rendered on the page (thousands
/// separators included).
///
/// `Absent` records a heading whose label was recognised but which carried no
/// value node. It is distinct from `Present("")` and from a missing entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricValue {
    Present(String),
    Absent,
}

impl MetricValue {
    pub fn present(raw: impl Into<String>) -> Self {
        Self::Present(raw.into())
    }

    #[must_use]
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Present(raw) => Some(raw),
            Self::Absent => None,
        }
    }

    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<Option<String>> for MetricValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Present(raw) => serializer.serialize_str(raw),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<String>::deserialize(deserializer).map(Self::from)
    }
}

/// Values extracted from a single report page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetrics {
    coordinate: TimeCoordinate,
    values: BTreeMap<MetricName, MetricValue>,
}

impl PageMetrics {
    #[must_use]
    pub const fn new(coordinate: TimeCoordinate) -> Self {
        Self {
            coordinate,
            values: BTreeMap::new(),
        }
    }

    /// Records a reading; a later reading for the same metric replaces the earlier one
    pub fn insert(&mut self, metric: MetricName, value: MetricValue) {
        self.values.insert(metric, value);
    }

    #[must_use]
    pub fn with(mut self, metric: MetricName, value: MetricValue) -> Self {
        self.insert(metric, value);
        self
    }

    #[must_use]
    pub const fn coordinate(&self) -> TimeCoordinate {
        self.coordinate
    }

    #[must_use]
    pub fn get(&self, metric: MetricName) -> Option<&MetricValue> {
        self.values.get(&metric)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricName, &MetricValue)> {
        self.values.iter().map(|(metric, value)| (*metric, value))
    }
}
