//! Enumerates the monthly report pages to visit.
//!
//! The URL template carries `{year}` and `{month}` placeholders; the month is
//! always substituted as two digits.

use super::coordinate::{TimeCoordinate, YearRange};

pub const YEAR_PLACEHOLDER: &str = "{year}";
pub const MONTH_PLACEHOLDER: &str = "{month}";

/// One page to fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageTarget {
    pub coordinate: TimeCoordinate,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct UrlEnumerator {
    template: String,
    years: YearRange,
}

impl UrlEnumerator {
    pub fn new(template: impl Into<String>, years: YearRange) -> Self {
        Self {
            template: template.into(),
            years,
        }
    }

    /// Substitutes the coordinate into a URL template
    #[must_use]
    pub fn render(template: &str, coordinate: TimeCoordinate) -> String {
        template
            .replace(YEAR_PLACEHOLDER, &coordinate.year_key())
            .replace(MONTH_PLACEHOLDER, &coordinate.month_key())
    }

    /// Lazy pass over every `(coordinate, url)` in ascending order. Each call
    /// starts a fresh pass.
    pub fn iter(&self) -> impl Iterator<Item = PageTarget> + '_ {
        self.years.coordinates().map(|coordinate| PageTarget {
            coordinate,
            url: Self::render(&self.template, coordinate),
        })
    }

    /// Always `12 * years`
    #[must_use]
    pub const fn len(&self) -> usize {
        self.years.len() * 12
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    #[must_use]
    pub const fn years(&self) -> YearRange {
        self.years
    }
}
