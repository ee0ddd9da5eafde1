//! # Time coordinates
//!
//! A `(year, month)` pair identifies one monthly report page and one
//! aggregation slot. The archive starts publishing monthly statistics in 2009.

use serde::Serialize;
use std::fmt;

/// First year for which the archive publishes monthly statistics
pub const FIRST_ARCHIVE_YEAR: u16 = 2009;

/// Coordinate validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinateError {
    #[error("year {0} is before the first archive year {FIRST_ARCHIVE_YEAR}")]
    YearTooEarly(u16),
    #[error("month {0} is outside 1..=12")]
    InvalidMonth(u8),
    #[error("invalid year key '{0}'")]
    InvalidYearKey(String),
    #[error("invalid month key '{0}'")]
    InvalidMonthKey(String),
    #[error("year range {first}..={last} is inverted")]
    InvertedRange { first: u16, last: u16 },
}

/// Immutable `(year, month)` compound key.
///
/// Ordering is ascending by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeCoordinate {
    year: u16,
    month: u8,
}

impl TimeCoordinate {
    /// Creates a validated coordinate
    ///
    /// # Errors
    /// Returns error if the year predates the archive or the month is not 1..=12
    pub fn new(year: u16, month: u8) -> Result<Self, CoordinateError> {
        if year < FIRST_ARCHIVE_YEAR {
            return Err(CoordinateError::YearTooEarly(year));
        }
        if month < 1 || month > 12 {
            return Err(CoordinateError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// Rebuilds a coordinate from its stored string keys (`"2016"`, `"07"`)
    ///
    /// # Errors
    /// Returns error unless the year is four digits and the month exactly two
    /// (`"7"` is rejected so it cannot alias `"07"`), or if the parsed values
    /// are out of range
    pub fn from_keys(year: &str, month: &str) -> Result<Self, CoordinateError> {
        let is_digits = |key: &str, width: usize| key.len() == width && key.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(year, 4) {
            return Err(CoordinateError::InvalidYearKey(year.to_string()));
        }
        if !is_digits(month, 2) {
            return Err(CoordinateError::InvalidMonthKey(month.to_string()));
        }
        let year_num = year
            .parse::<u16>()
            .map_err(|_| CoordinateError::InvalidYearKey(year.to_string()))?;
        let month_num = month
            .parse::<u8>()
            .map_err(|_| CoordinateError::InvalidMonthKey(month.to_string()))?;
        Self::new(year_num, month_num)
    }

    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Year rendered as a stored key, e.g. `"2016"`
    #[must_use]
    pub fn year_key(&self) -> String {
        self.year.to_string()
    }

    /// Month rendered as a fixed two-digit key, e.g. `"07"`
    #[must_use]
    pub fn month_key(&self) -> String {
        format!("{:02}", self.month)
    }
}

impl fmt::Display for TimeCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Inclusive range of archive years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    first: u16,
    last: u16,
}

impl YearRange {
    /// # Errors
    /// Returns error if `first` predates the archive or `first > last`
    pub fn new(first: u16, last: u16) -> Result<Self, CoordinateError> {
        if first < FIRST_ARCHIVE_YEAR {
            return Err(CoordinateError::YearTooEarly(first));
        }
        if first > last {
            return Err(CoordinateError::InvertedRange { first, last });
        }
        Ok(Self { first, last })
    }

    #[must_use]
    pub const fn first(&self) -> u16 {
        self.first
    }

    #[must_use]
    pub const fn last(&self) -> u16 {
        self.last
    }

    /// Number of years covered, always at least one
    #[must_use]
    pub const fn len(&self) -> usize {
        (self.last - self.first) as usize + 1
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// All coordinates in ascending order
    pub fn coordinates(&self) -> impl Iterator<Item = TimeCoordinate> + Clone + use<> {
        let (first, last) = (self.first, self.last);
        (first..=last).flat_map(|year| (1..=12u8).map(move |month| TimeCoordinate { year, month }))
    }
}
