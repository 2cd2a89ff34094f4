//! Persister that submits batches to the service.

use log::debug;

use crate::{
    error::PersistenceError,
    measurement::MetricsBatch,
    transport::{Body, Headers, Transport},
};

use super::Persister;

/// Path batches are posted to.
pub const METRICS_PATH: &str = "metrics";

/// Posts each batch to the metrics endpoint.
///
/// Retries follow the transport's policy, so a batch whose first attempt
/// timed out after reaching the service may be stored twice.
#[derive(Debug)]
pub struct NetworkPersister {
    transport: Transport,
}

impl NetworkPersister {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }
}

impl Persister for NetworkPersister {
    fn persist(&self, batch: &MetricsBatch) -> Result<(), PersistenceError> {
        batch.validate()?;
        let body = Body::json(batch)?;
        let response = self.transport.post(METRICS_PATH, Headers::new(), body)?;
        debug!(
            "persisted {} measurements (HTTP {})",
            batch.len(),
            response.status()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::credentials::Credentials;
    use crate::error::MetricsError;
    use crate::middleware::RetryPolicy;
    use crate::test_utils::{Reply, ScriptedBackend};

    fn persister(backend: &ScriptedBackend) -> NetworkPersister {
        let config = TransportConfig {
            retry: RetryPolicy::immediate(2),
            ..TransportConfig::default()
        };
        NetworkPersister::new(Transport::from_config(
            Some(Credentials::new("key")),
            config,
            backend.shared(),
        ))
    }

    #[test]
    fn posts_batch_as_json() {
        let backend = ScriptedBackend::always(Reply::Status(202));
        let batch = MetricsBatch::new().with_gauge("foo", 123).with_counter("hits", 1);
        persister(&backend).persist(&batch).expect("persisted");

        let sent = &backend.requests()[0];
        assert!(sent.url.ends_with("/v1/metrics"));
        assert_eq!(sent.headers.get("content-type"), Some("application/json"));
        assert_eq!(
            sent.body,
            Body::bytes(
                br#"{"gauges":[{"name":"foo","value":123.0}],"counters":[{"name":"hits","value":1.0}]}"#
                    .to_vec()
            )
        );
    }

    #[test]
    fn empty_batch_is_rejected_without_io() {
        let backend = ScriptedBackend::new();
        let err = persister(&backend)
            .persist(&MetricsBatch::new())
            .expect_err("empty");
        assert!(matches!(err.cause(), MetricsError::EmptyBatch));
        assert_eq!(backend.request_count(), 0);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let backend = ScriptedBackend::new();
        let batch = MetricsBatch::new().with_gauge("nan", f64::NAN);
        let err = persister(&backend).persist(&batch).expect_err("invalid");
        assert!(matches!(
            err.cause(),
            MetricsError::InvalidMeasurement { name } if name == "nan"
        ));
    }

    #[test]
    fn submit_reports_failure_as_false() {
        let backend = ScriptedBackend::always(Reply::Status(401));
        let batch = MetricsBatch::new().with_gauge("foo", 1);
        assert!(!persister(&backend).submit(&batch));
        assert_eq!(backend.request_count(), 1);
    }
}
