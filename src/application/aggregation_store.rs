//! Shared aggregation sink
//!
//! The only shared mutable state of a run. Every write goes through `merge`,
//! which holds the lock for the whole page so concurrent merges never
//! interleave a partial write.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::domain::{Aggregate, PageMetrics, TimeCoordinate};

#[derive(Debug, Default)]
pub struct AggregationStore {
    aggregate: Mutex<Aggregate>,
}

impl AggregationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Aggregate> {
        // A panic while holding the lock cannot leave a half-merged page
        // behind, so a poisoned aggregate is still consistent.
        self.aggregate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes one page's readings. Idempotent; later writes win.
    pub fn merge(&self, page: &PageMetrics) -> usize {
        let written = self.lock().merge(page);
        trace!("Merged {} entries for {}", written, page.coordinate());
        written
    }

    /// Merges every entry of `aggregate`, e.g. a previously saved run
    pub fn seed(&self, aggregate: &Aggregate) -> usize {
        let mut guard = self.lock();
        aggregate.pages().iter().map(|page| guard.merge(page)).sum()
    }

    #[must_use]
    pub fn contains_coordinate(&self, coordinate: TimeCoordinate) -> bool {
        self.lock().contains_coordinate(coordinate)
    }

    /// Point-in-time copy of the aggregate
    #[must_use]
    pub fn snapshot(&self) -> Aggregate {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
