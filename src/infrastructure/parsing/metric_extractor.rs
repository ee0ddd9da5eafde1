//! Metric extractor for monthly report pages
//!
//! A report page lists its statistics as headings of the form
//! `<h3>Total Submissions: <b>1,234</b></h3>`. The label is the heading text
//! before the first colon; the value is the first emphasised node inside the
//! heading, kept verbatim apart from surrounding whitespace.

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

use super::error::{ParsingError, ParsingResult};
use crate::domain::{MetricName, MetricValue, PageMetrics, TimeCoordinate};
use crate::infrastructure::config::ExtractionConfig;

/// Compiled selectors for one extraction configuration. Cheap to share
/// between tasks by reference.
#[derive(Debug)]
pub struct MetricExtractor {
    heading_selector: Selector,
    value_selector: Selector,
    scope_selector: Option<Selector>,
}

impl MetricExtractor {
    /// Extractor with the default selectors
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ExtractionConfig::default())
    }

    /// Compiles the configured selectors
    pub fn with_config(config: &ExtractionConfig) -> ParsingResult<Self> {
        Ok(Self {
            heading_selector: compile("heading_selector", &config.heading_selector)?,
            value_selector: compile("value_selector", &config.value_selector)?,
            scope_selector: config
                .scope_selector
                .as_deref()
                .map(|selector| compile("scope_selector", selector))
                .transpose()?,
        })
    }

    /// Extracts every known metric from `content` for `coordinate`.
    ///
    /// Never fails: empty or unparsable content yields an empty `PageMetrics`.
    /// Unknown labels are skipped; a known label without a value node is
    /// recorded as `MetricValue::Absent`; a repeated label keeps the later value.
    #[must_use]
    pub fn extract(&self, content: &str, coordinate: TimeCoordinate) -> PageMetrics {
        let mut page = PageMetrics::new(coordinate);
        if content.trim().is_empty() {
            return page;
        }

        let document = Html::parse_document(content);
        for heading in self.headings(&document) {
            let text: String = heading.text().collect();
            let label = normalize_label(&text);
            let Some(metric) = MetricName::from_label(&label) else {
                trace!("Skipping heading '{}' on {}", label, coordinate);
                continue;
            };

            let value = heading
                .select(&self.value_selector)
                .next()
                .map(|node| node.text().collect::<String>().trim().to_string());
            page.insert(metric, MetricValue::from(value));
        }

        debug!("Extracted {} metrics for {}", page.len(), coordinate);
        page
    }

    /// Headings in document order, restricted to the scope containers when
    /// the scope selector matches anything.
    fn headings<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        if let Some(scope) = &self.scope_selector {
            let containers: Vec<ElementRef<'a>> = document.select(scope).collect();
            if !containers.is_empty() {
                return containers
                    .into_iter()
                    .flat_map(|container| container.select(&self.heading_selector))
                    .collect();
            }
            debug!("Scope selector matched nothing, scanning whole document");
        }
        document.select(&self.heading_selector).collect()
    }
}

fn compile(field: &'static str, selector: &str) -> ParsingResult<Selector> {
    if selector.trim().is_empty() {
        return Err(ParsingError::EmptySelector { field });
    }
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(field, selector, e))
}

/// Text before the first colon with runs of whitespace collapsed
fn normalize_label(text: &str) -> String {
    let head = text.split(':').next().unwrap_or_default();
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}
