//! Authenticated access to the metrics API.
//!
//! A [`Transport`] owns the credentials, the endpoint configuration, the
//! backend, and the middleware pipeline. Every logical request runs through
//!
//! ```text
//! RequestBody → Retry → CountRequests → ExpectsStatus → backend.send
//! ```
//!
//! so callers see either a validated 2xx [`Response`] or a [`MetricsError`].

use std::{fmt, sync::Arc};

use log::debug;

use crate::{
    config::{API_VERSION, EndpointConfig, TransportConfig},
    credentials::Credentials,
    error::MetricsError,
    middleware::{CountRequests, ExpectsStatus, RequestBody, RequestCounter, Retry},
};

pub mod backend;
pub mod pipeline;
pub mod request;

pub use backend::{BackendKind, HttpBackend, UreqBackend};
pub use pipeline::{Middleware, Next, Pipeline};
pub use request::{Body, HTTPMethod, Headers, Request, Response};

/// Configured client for the metrics API.
pub struct Transport {
    credentials: Option<Arc<Credentials>>,
    config: TransportConfig,
    backend: Arc<dyn HttpBackend>,
    pipeline: Pipeline,
    counter: RequestCounter,
}

impl Transport {
    /// Transport over the default ureq backend and default policies.
    ///
    /// Never performs I/O. Missing credentials are reported by the first
    /// request rather than here.
    pub fn configure(credentials: Option<Credentials>, endpoint: EndpointConfig) -> Self {
        let backend = Arc::new(UreqBackend::new(endpoint.clone()));
        Self::from_config(credentials, TransportConfig::new(endpoint), backend)
    }

    /// Transport over an explicit backend.
    pub fn from_config(
        credentials: Option<Credentials>,
        config: TransportConfig,
        backend: Arc<dyn HttpBackend>,
    ) -> Self {
        let counter = RequestCounter::new();
        let pipeline = Pipeline::new()
            .with(RequestBody)
            .with(Retry::new(config.retry.clone()))
            .with(CountRequests::new(counter.clone()))
            .with(ExpectsStatus::new(config.status.clone()));
        debug!(
            "transport configured for {} via {} backend",
            config.endpoint.base_url,
            backend.kind().label()
        );
        Self {
            credentials: credentials.map(Arc::new),
            config,
            backend,
            pipeline,
            counter,
        }
    }

    /// Issue a request to `path`, relative to the versioned API root.
    ///
    /// Default headers are `User-Agent`, `Content-Type: application/json`,
    /// and Basic `Authorization`; entries in `headers` replace them.
    pub fn request(
        &self,
        method: HTTPMethod,
        path: &str,
        headers: Headers,
        body: Body,
    ) -> Result<Response, MetricsError> {
        let credentials = self
            .credentials
            .as_deref()
            .ok_or(MetricsError::MissingCredentials)?;
        let mut request = Request::new(method, self.build_url(path))
            .with_header("User-Agent", credentials.user_agent(self.backend_kind()))
            .with_header("Content-Type", "application/json")
            .with_header("Authorization", credentials.basic_auth_header())
            .with_body(body);
        request.headers.merge(headers);
        debug!("{} {}", request.method, request.url);
        self.pipeline.run(self.backend.as_ref(), request)
    }

    pub fn get(&self, path: &str, headers: Headers) -> Result<Response, MetricsError> {
        self.request(HTTPMethod::GET, path, headers, Body::Empty)
    }

    pub fn head(&self, path: &str, headers: Headers) -> Result<Response, MetricsError> {
        self.request(HTTPMethod::HEAD, path, headers, Body::Empty)
    }

    pub fn delete(&self, path: &str, headers: Headers) -> Result<Response, MetricsError> {
        self.request(HTTPMethod::DELETE, path, headers, Body::Empty)
    }

    pub fn post(&self, path: &str, headers: Headers, body: Body) -> Result<Response, MetricsError> {
        self.request(HTTPMethod::POST, path, headers, body)
    }

    pub fn put(&self, path: &str, headers: Headers, body: Body) -> Result<Response, MetricsError> {
        self.request(HTTPMethod::PUT, path, headers, body)
    }

    /// Absolute URL for `path` under the versioned API root.
    pub fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{API_VERSION}/{}",
            self.config.endpoint.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Attempts made by this transport, across all requests.
    pub fn counter(&self) -> &RequestCounter {
        &self.counter
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_deref()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Pipeline stage names, outermost first.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.names()
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("credentials", &self.credentials)
            .field("config", &self.config)
            .field("backend", &self.backend_kind())
            .field("pipeline", &self.pipeline)
            .field("counter", &self.counter.snapshot())
            .finish()
    }
}
