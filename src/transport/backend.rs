//! Physical HTTP backends.
//!
//! A backend performs exactly one request/response exchange. Every HTTP
//! status, including 4xx and 5xx, comes back as `Ok(Response)`; only failures
//! that prevent a status line from arriving are errors. Classifying statuses
//! is the job of the pipeline, not the backend.

use std::{
    error::Error as _,
    fmt,
    io::{self, Read},
    sync::Arc,
};

use log::debug;
use once_cell::sync::OnceCell;
use ureq::{Agent, AgentBuilder, ErrorKind};

use crate::{
    config::EndpointConfig,
    error::{MetricsError, TransportError},
    middleware::encode,
};

use super::request::{Body, Headers, Request, Response};

/// Upper bound on response bodies read into memory.
pub const MAX_RESPONSE_BODY: u64 = 10 << 20; // 10 MiB

/// Known backend implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// [`UreqBackend`].
    Ureq,
    /// An in-memory fake used by tests.
    InMemory,
    /// Any other caller-supplied backend.
    Custom(&'static str),
}

impl BackendKind {
    /// Short identifier used in the user agent.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ureq => "ureq",
            Self::InMemory => "in-memory",
            Self::Custom(name) => name,
        }
    }
}

/// Capability to perform one HTTP exchange.
pub trait HttpBackend: Send + Sync {
    /// Send a request and return whatever the server answered.
    fn send(&self, request: &Request) -> Result<Response, MetricsError>;

    /// Which implementation this is.
    fn kind(&self) -> BackendKind {
        BackendKind::Custom("custom")
    }
}

/// Blocking backend built on a pooled [`ureq::Agent`].
///
/// The agent is created on first use and reused for every later request, so
/// constructing the backend never touches the network or the TLS stack.
pub struct UreqBackend {
    config: EndpointConfig,
    agent: OnceCell<Agent>,
}

impl UreqBackend {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            agent: OnceCell::new(),
        }
    }

    /// The memoized agent, building it on first access.
    pub fn agent(&self) -> Result<&Agent, MetricsError> {
        self.agent.get_or_try_init(|| build_agent(&self.config))
    }
}

fn dispatch(
    agent: &Agent,
    request: &Request,
    body: &[u8],
) -> Result<ureq::Response, ureq::Error> {
    let mut req = agent.request(request.method.as_str(), &request.url);
    for (name, value) in request.headers.iter() {
        req = req.set(name, value);
    }
    match request.body {
        Body::Empty => req.call(),
        _ => req.send_bytes(body),
    }
}

impl HttpBackend for UreqBackend {
    fn send(&self, request: &Request) -> Result<Response, MetricsError> {
        let agent = self.agent()?;
        // Bodies that bypassed the encoder stage are serialised here.
        let encoded = encode(&request.body)?;
        debug!("ureq backend dispatching {} {}", request.method, request.url);
        let response = match dispatch(agent, request, &encoded.bytes) {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(map_transport_error(&transport).into());
            }
        };
        read_response(response).map_err(MetricsError::from)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Ureq
    }
}

impl fmt::Debug for UreqBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqBackend")
            .field("config", &self.config)
            .field("connected", &self.agent.get().is_some())
            .finish()
    }
}

fn build_agent(config: &EndpointConfig) -> Result<Agent, MetricsError> {
    let tls = native_tls::TlsConnector::new()
        .map_err(|err| MetricsError::InvalidConfig(format!("tls setup failed: {err}")))?;
    let mut builder = AgentBuilder::new()
        .timeout_connect(config.open_timeout)
        .timeout(config.timeout)
        .tls_connector(Arc::new(tls));
    if let Some(proxy) = &config.proxy {
        let proxy = ureq::Proxy::new(proxy).map_err(|err| {
            MetricsError::InvalidConfig(format!("invalid proxy `{proxy}`: {err}"))
        })?;
        builder = builder.proxy(proxy);
    }
    debug!("built ureq agent for {}", config.base_url);
    Ok(builder.build())
}

fn read_response(response: ureq::Response) -> Result<Response, TransportError> {
    let status = response.status();
    let mut headers = Headers::new();
    for name in response.headers_names() {
        if let Some(value) = response.header(&name) {
            headers.set(name.clone(), value);
        }
    }
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_BODY)
        .read_to_end(&mut body)?;
    Ok(Response::new(status, headers, body))
}

fn map_transport_error(err: &ureq::Transport) -> TransportError {
    let message = err.to_string();
    match err.kind() {
        ErrorKind::Dns => TransportError::Dns(message),
        ErrorKind::ConnectionFailed | ErrorKind::ProxyConnect => TransportError::Connect(message),
        ErrorKind::InvalidUrl
        | ErrorKind::UnknownScheme
        | ErrorKind::InvalidProxyUrl
        | ErrorKind::InsecureRequestHttpsOnly
        | ErrorKind::ProxyUnauthorized => TransportError::InvalidRequest(message),
        ErrorKind::Io => match err.source().and_then(|s| s.downcast_ref::<io::Error>()) {
            Some(io_err)
                if matches!(
                    io_err.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                ) =>
            {
                TransportError::Timeout(message)
            }
            _ => TransportError::Io(message),
        },
        _ => TransportError::Io(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_is_built_once() {
        let backend = UreqBackend::new(EndpointConfig::default());
        let first = backend.agent().expect("agent") as *const Agent;
        let second = backend.agent().expect("agent") as *const Agent;
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn invalid_proxy_surfaces_on_first_use() {
        let config = EndpointConfig {
            proxy: Some("ftp://proxy.invalid:21".into()),
            ..EndpointConfig::default()
        };
        let backend = UreqBackend::new(config);
        let err = backend.agent().expect_err("proxy must be rejected");
        assert!(matches!(err, MetricsError::InvalidConfig(msg) if msg.contains("proxy")));
    }

    #[test]
    fn backend_labels() {
        assert_eq!(BackendKind::Ureq.label(), "ureq");
        assert_eq!(BackendKind::Custom("curl").label(), "curl");
    }
}
