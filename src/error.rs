//! Error types shared by the transport pipeline and the persisters.
//!
//! Every failure a request can end in is a [`MetricsError`]. The retry stage
//! consults [`MetricsError::class`] to decide whether another attempt is
//! worthwhile; persisters wrap the final error in a [`PersistenceError`] so
//! callers that only care about "did the batch land" need not match on
//! transport internals.

use std::{fmt, io};

use thiserror::Error;

/// Outcome classification used by the retry stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx responses - request succeeded.
    Success,
    /// Rate limiting, gateway errors, or network failures - retry with backoff.
    Retryable,
    /// Everything else - surface immediately, never retried.
    Fatal,
}

/// Low-level failure raised before any HTTP status was received.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Host name resolution failed.
    #[error("dns lookup failed: {0}")]
    Dns(String),
    /// The remote end refused or dropped the connection.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The connect or read timeout expired.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Any other I/O failure while writing the request or reading the response.
    #[error("transport i/o error: {0}")]
    Io(String),
    /// The request could not be issued at all (bad URL, unsupported scheme).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout(err.to_string()),
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Self::Connect(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Name given to a non-retryable status, following the API's documented codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// 401: the API key was rejected.
    Unauthorized,
    /// 403: the token lacks permission for this operation.
    Forbidden,
    /// 404: the path does not exist.
    NotFound,
    /// 422: the entity already exists or the payload was rejected.
    EntityAlreadyExists,
    /// Any other 4xx.
    ClientError,
    /// 5xx outside the retryable set.
    ServerError,
    /// 1xx/3xx or other codes the API never documents.
    Unexpected,
}

impl StatusKind {
    /// Name a status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::EntityAlreadyExists,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Unexpected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::EntityAlreadyExists => "entity already exists",
            Self::ClientError => "client error",
            Self::ServerError => "server error",
            Self::Unexpected => "unexpected status",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while issuing a request through the transport.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// No API key was supplied; raised when a request is attempted.
    #[error("no credentials provided; authenticate before issuing requests")]
    MissingCredentials,
    /// Network failure before a status line arrived.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The service answered with a status from the retryable set.
    #[error("service temporarily unavailable (HTTP {status})")]
    RetryableStatus { status: u16, body: String },
    /// The service rejected the request.
    #[error("request failed with HTTP {status} ({kind}): {body}")]
    FatalStatus {
        status: u16,
        kind: StatusKind,
        body: String,
    },
    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    /// A batch without any measurements was submitted.
    #[error("metrics batch is empty")]
    EmptyBatch,
    /// A measurement value cannot be represented on the wire.
    #[error("measurement `{name}` has a non-finite value")]
    InvalidMeasurement { name: String },
    /// Configuration that could only be checked when the connection was built.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MetricsError {
    /// Retry classification for this failure.
    pub fn class(&self) -> ResponseClass {
        match self {
            Self::Transport(err) if err.is_transient() => ResponseClass::Retryable,
            Self::RetryableStatus { .. } => ResponseClass::Retryable,
            _ => ResponseClass::Fatal,
        }
    }

    /// HTTP status carried by the error, if the service answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RetryableStatus { status, .. } | Self::FatalStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Response body returned alongside a failing status.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::RetryableStatus { body, .. } | Self::FatalStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// A batch could not be persisted.
///
/// Wraps the [`MetricsError`] that ended the submission.
#[derive(Debug, Error)]
#[error("metrics batch was not persisted: {source}")]
pub struct PersistenceError {
    #[from]
    source: MetricsError,
}

impl PersistenceError {
    /// The underlying failure.
    pub fn cause(&self) -> &MetricsError {
        &self.source
    }

    /// Consume the wrapper and return the underlying failure.
    pub fn into_cause(self) -> MetricsError {
        self.source
    }

    /// HTTP status of the final attempt, when there was one.
    pub fn status_code(&self) -> Option<u16> {
        self.source.status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(401, StatusKind::Unauthorized)]
    #[case(403, StatusKind::Forbidden)]
    #[case(404, StatusKind::NotFound)]
    #[case(422, StatusKind::EntityAlreadyExists)]
    #[case(400, StatusKind::ClientError)]
    #[case(500, StatusKind::ServerError)]
    #[case(302, StatusKind::Unexpected)]
    fn names_fatal_statuses(#[case] status: u16, #[case] expected: StatusKind) {
        assert_eq!(StatusKind::from_status(status), expected);
    }

    #[test]
    fn transport_failures_are_retryable_unless_invalid() {
        let timeout = MetricsError::from(TransportError::Timeout("read".into()));
        assert_eq!(timeout.class(), ResponseClass::Retryable);
        let invalid = MetricsError::from(TransportError::InvalidRequest("bad scheme".into()));
        assert_eq!(invalid.class(), ResponseClass::Fatal);
    }

    #[test]
    fn missing_credentials_is_fatal() {
        assert_eq!(MetricsError::MissingCredentials.class(), ResponseClass::Fatal);
    }

    #[test]
    fn io_errors_map_onto_transport_variants() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(TransportError::from(refused), TransportError::Connect(_)));
        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(TransportError::from(timed_out), TransportError::Timeout(_)));
    }

    #[test]
    fn persistence_error_exposes_status() {
        let err = PersistenceError::from(MetricsError::FatalStatus {
            status: 400,
            kind: StatusKind::ClientError,
            body: "bad".into(),
        });
        assert_eq!(err.status_code(), Some(400));
        assert!(err.to_string().contains("HTTP 400"));
    }
}
