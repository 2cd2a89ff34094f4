//! Blocking client for submitting metrics to the AppOptics API.
//!
//! Requests pass through a fixed middleware pipeline (payload encoding,
//! retry with backoff, per-attempt counting, status validation) before a
//! pooled `ureq` agent sends them. Batches are submitted through a
//! [`Persister`], either to the network or to an in-memory sink for tests.
//!
//! ```no_run
//! use appoptics_metrics::{
//!     Credentials, EndpointConfig, MetricsBatch, NetworkPersister, Persister, Transport,
//! };
//!
//! let transport = Transport::configure(
//!     Some(Credentials::new("api-key")),
//!     EndpointConfig::default(),
//! );
//! let persister = NetworkPersister::new(transport);
//! let batch = MetricsBatch::new().with_gauge("queue.depth", 12);
//! persister.persist(&batch)?;
//! # Ok::<(), appoptics_metrics::PersistenceError>(())
//! ```

pub mod builder;
pub mod config;
pub mod credentials;
pub mod error;
pub mod measurement;
pub mod middleware;
pub mod persister;
#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;
pub mod transport;

pub use builder::{BackoffOverrides, BuildError, TransportBuilder};
pub use config::{EndpointConfig, PersistenceMode, TransportConfig};
pub use credentials::Credentials;
pub use error::{MetricsError, PersistenceError, ResponseClass, StatusKind, TransportError};
pub use measurement::{Measurement, MetricKind, MetricsBatch};
pub use middleware::{BackoffPolicy, RequestCounter, RequestStats, RetryPolicy, StatusPolicy};
pub use persister::{NetworkPersister, Persisted, Persister, TestPersister, persister_for};
pub use transport::{
    BackendKind, Body, HTTPMethod, Headers, HttpBackend, Request, Response, Transport,
    UreqBackend,
};
