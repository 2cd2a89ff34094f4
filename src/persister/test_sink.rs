//! In-memory persister for test assertions.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::PersistenceError,
    measurement::{Measurement, MetricKind, MetricsBatch},
};

use super::Persister;

/// Measurements collected by a [`TestPersister`], by category.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Persisted {
    categories: BTreeMap<MetricKind, Vec<Measurement>>,
}

impl Persisted {
    pub fn new() -> Self {
        Self::default()
    }

    fn extend(&mut self, batch: &MetricsBatch) {
        for (kind, entries) in batch.categories() {
            self.categories
                .entry(kind)
                .or_default()
                .extend_from_slice(entries);
        }
    }

    /// Measurements stored under `kind`, in arrival order.
    pub fn get(&self, kind: MetricKind) -> &[Measurement] {
        self.categories
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn gauges(&self) -> &[Measurement] {
        self.get(MetricKind::Gauge)
    }

    pub fn counters(&self) -> &[Measurement] {
        self.get(MetricKind::Counter)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Compare with `other`, ignoring order within each category.
    ///
    /// Each category is treated as a multiset, so duplicates must match in
    /// number.
    pub fn equal_unordered(&self, other: &Persisted) -> bool {
        self.categories.len() == other.categories.len()
            && self.categories.iter().all(|(kind, ours)| {
                other
                    .categories
                    .get(kind)
                    .is_some_and(|theirs| same_multiset(ours, theirs))
            })
    }
}

fn same_multiset(left: &[Measurement], right: &[Measurement]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut remaining: Vec<&Measurement> = right.iter().collect();
    left.iter().all(|wanted| {
        match remaining.iter().position(|candidate| *candidate == wanted) {
            Some(idx) => {
                remaining.swap_remove(idx);
                true
            }
            None => false,
        }
    })
}

impl From<&MetricsBatch> for Persisted {
    fn from(batch: &MetricsBatch) -> Self {
        let mut persisted = Self::new();
        persisted.extend(batch);
        persisted
    }
}

impl From<MetricsBatch> for Persisted {
    fn from(batch: MetricsBatch) -> Self {
        Self::from(&batch)
    }
}

/// Persister that keeps every batch in memory and never fails.
///
/// Clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct TestPersister {
    persisted: Arc<Mutex<Persisted>>,
}

impl TestPersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything persisted since creation or the last reset.
    pub fn persisted(&self) -> Persisted {
        self.persisted.lock().clone()
    }

    /// Forget everything persisted so far.
    pub fn reset(&self) {
        *self.persisted.lock() = Persisted::new();
    }
}

impl Persister for TestPersister {
    fn persist(&self, batch: &MetricsBatch) -> Result<(), PersistenceError> {
        self.persisted.lock().extend(batch);
        Ok(())
    }

    fn persisted(&self) -> Option<Persisted> {
        Some(TestPersister::persisted(self))
    }

    fn reset(&self) {
        TestPersister::reset(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_in_arrival_order() {
        let persister = TestPersister::new();
        persister
            .persist(&MetricsBatch::new().with_gauge("foo", 123))
            .expect("persist");
        persister
            .persist(&MetricsBatch::new().with_gauge("bar", 456).with_counter("c", 1))
            .expect("persist");

        let persisted = persister.persisted();
        assert_eq!(
            persisted.gauges(),
            &[Measurement::new("foo", 123), Measurement::new("bar", 456)]
        );
        assert_eq!(persisted.counters(), &[Measurement::new("c", 1)]);
    }

    #[test]
    fn reset_clears_everything() {
        let persister = TestPersister::new();
        persister
            .persist(&MetricsBatch::new().with_counter("hits", 2))
            .expect("persist");
        persister.reset();
        assert!(persister.persisted().is_empty());
    }

    #[test]
    fn unordered_equality_counts_duplicates() {
        let left = Persisted::from(
            MetricsBatch::new()
                .with_gauge("a", 1)
                .with_gauge("a", 1)
                .with_gauge("b", 2),
        );
        let reordered = Persisted::from(
            MetricsBatch::new()
                .with_gauge("b", 2)
                .with_gauge("a", 1)
                .with_gauge("a", 1),
        );
        let collapsed = Persisted::from(
            MetricsBatch::new()
                .with_gauge("a", 1)
                .with_gauge("b", 2)
                .with_gauge("b", 2),
        );
        assert!(left.equal_unordered(&reordered));
        assert_ne!(left, reordered);
        assert!(!left.equal_unordered(&collapsed));
    }

    #[test]
    fn empty_batches_are_accepted() {
        let persister = TestPersister::new();
        assert!(persister.submit(&MetricsBatch::new()));
        assert!(persister.persisted().is_empty());
    }
}
