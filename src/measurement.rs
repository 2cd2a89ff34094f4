//! Metrics batch model and its wire representation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// Category a measurement is submitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    /// Key used for this category in the payload and in persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauges",
            Self::Counter => "counters",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
}

impl Measurement {
    pub fn new(name: impl Into<String>, value: impl Into<f64>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Measurements submitted together as one request.
///
/// Insertion order is preserved through encoding. Empty categories are left
/// out of the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsBatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    gauges: Vec<Measurement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    counters: Vec<Measurement>,
}

impl MetricsBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a gauge.
    pub fn add_gauge(&mut self, name: impl Into<String>, value: impl Into<f64>) -> &mut Self {
        self.gauges.push(Measurement::new(name, value));
        self
    }

    /// Append a counter.
    pub fn add_counter(&mut self, name: impl Into<String>, value: impl Into<f64>) -> &mut Self {
        self.counters.push(Measurement::new(name, value));
        self
    }

    /// Chainable form of [`add_gauge`](Self::add_gauge).
    pub fn with_gauge(mut self, name: impl Into<String>, value: impl Into<f64>) -> Self {
        self.add_gauge(name, value);
        self
    }

    /// Chainable form of [`add_counter`](Self::add_counter).
    pub fn with_counter(mut self, name: impl Into<String>, value: impl Into<f64>) -> Self {
        self.add_counter(name, value);
        self
    }

    pub fn gauges(&self) -> &[Measurement] {
        &self.gauges
    }

    pub fn counters(&self) -> &[Measurement] {
        &self.counters
    }

    /// Measurements of one category.
    pub fn measurements(&self, kind: MetricKind) -> &[Measurement] {
        match kind {
            MetricKind::Gauge => &self.gauges,
            MetricKind::Counter => &self.counters,
        }
    }

    /// Non-empty categories paired with their measurements.
    pub fn categories(&self) -> impl Iterator<Item = (MetricKind, &[Measurement])> {
        [MetricKind::Gauge, MetricKind::Counter]
            .into_iter()
            .map(|kind| (kind, self.measurements(kind)))
            .filter(|(_, entries)| !entries.is_empty())
    }

    pub fn len(&self) -> usize {
        self.gauges.len() + self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject batches the API cannot accept.
    ///
    /// JSON has no representation for NaN or infinity; `serde_json` would
    /// silently write `null`.
    pub fn validate(&self) -> Result<(), MetricsError> {
        if self.is_empty() {
            return Err(MetricsError::EmptyBatch);
        }
        let invalid = self
            .gauges
            .iter()
            .chain(&self.counters)
            .find(|m| !m.value.is_finite());
        match invalid {
            Some(m) => Err(MetricsError::InvalidMeasurement {
                name: m.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Collect `(name, value)` pairs as gauges.
impl<K, V> FromIterator<(K, V)> for MetricsBatch
where
    K: Into<String>,
    V: Into<f64>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut batch = Self::new();
        for (name, value) in iter {
            batch.add_gauge(name, value);
        }
        batch
    }
}
