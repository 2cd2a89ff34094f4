//! Builder for [`Transport`].
//!
//! Exposes the API key, user-agent customisation, endpoint, timeouts, proxy,
//! retry budget, retryable statuses, and backoff parameters. Values are
//! checked in [`TransportBuilder::build`]; anything left unset falls back to
//! the defaults in [`crate::config`].

use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    config::{EndpointConfig, TransportConfig},
    credentials::Credentials,
    middleware::{BackoffPolicy, StatusPolicy},
    transport::{HttpBackend, Transport, UreqBackend},
};

/// Errors that may occur while building a transport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Optional backoff timing overrides, in milliseconds.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackoffOverrides {
    base_ms: Option<u64>,
    cap_ms: Option<u64>,
    deadline_ms: Option<u64>,
    jitter: Option<bool>,
}

impl BackoffOverrides {
    /// Create overrides with no custom values.
    pub fn new() -> Self {
        Self::default()
    }

    option_setter!(
        #[doc = "Override the delay before the first retry."]
        with_base_ms,
        base_ms,
        u64
    );
    option_setter!(
        #[doc = "Override the maximum delay between retries."]
        with_cap_ms,
        cap_ms,
        u64
    );
    option_setter!(
        #[doc = "Override the window after which no further retry starts."]
        with_deadline_ms,
        deadline_ms,
        u64
    );
    option_setter!(
        #[doc = "Enable or disable jitter."]
        with_jitter,
        jitter,
        bool
    );

    fn apply(&self, policy: &mut BackoffPolicy) -> Result<(), BuildError> {
        if let Some(base) = self.base_ms {
            ensure_positive!(base, "backoff_base_ms")?;
            policy.base = Duration::from_millis(base);
        }
        if let Some(cap) = self.cap_ms {
            ensure_positive!(cap, "backoff_cap_ms")?;
            policy.cap = Duration::from_millis(cap);
        }
        if let Some(deadline) = self.deadline_ms {
            ensure_positive!(deadline, "backoff_deadline_ms")?;
            policy.deadline = Duration::from_millis(deadline);
        }
        if let Some(jitter) = self.jitter {
            policy.jitter = jitter;
        }
        if policy.base > policy.cap {
            return Err(BuildError::InvalidConfig(format!(
                "backoff base ({:?}) must not exceed cap ({:?})",
                policy.base, policy.cap
            )));
        }
        Ok(())
    }
}

/// Builder for constructing [`Transport`] instances.
#[derive(Clone, Default)]
pub struct TransportBuilder {
    api_key: Option<String>,
    custom_user_agent: Option<String>,
    agent_identifier: Option<String>,
    base_url: Option<String>,
    proxy: Option<String>,
    open_timeout_ms: Option<u64>,
    timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    retryable_statuses: Option<Vec<u16>>,
    backoff: BackoffOverrides,
    backend: Option<Arc<dyn HttpBackend>>,
}

impl TransportBuilder {
    /// Create a new builder with nothing configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the API key used for Basic authentication.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Replace the generated user agent entirely.
    pub fn with_custom_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.custom_user_agent = Some(user_agent.into());
        self
    }

    /// Prefix the generated user agent with an identifier.
    pub fn with_agent_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.agent_identifier = Some(identifier.into());
        self
    }

    /// Set the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Route requests through an HTTP proxy.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    option_setter!(
        #[doc = "Set the connect timeout in milliseconds."]
        with_open_timeout_ms,
        open_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the request timeout in milliseconds."]
        with_timeout_ms,
        timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the number of attempts per request, including the first."]
        with_max_attempts,
        max_attempts,
        u32
    );

    /// Replace the set of statuses that are retried.
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = Some(statuses.into_iter().collect());
        self
    }

    /// Override backoff timings using the provided overrides.
    pub fn with_backoff(mut self, overrides: BackoffOverrides) -> Self {
        self.backoff = overrides;
        self
    }

    /// Send requests through `backend` instead of the default ureq backend.
    pub fn with_backend(mut self, backend: Arc<dyn HttpBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_base_url()?;
        self.validate_timeouts()?;
        if let Some(attempts) = self.max_attempts {
            ensure_positive!(attempts, "max_attempts")?;
        }
        if let Some(statuses) = &self.retryable_statuses
            && let Some(status) = statuses.iter().find(|s| !(100..=599).contains(*s))
        {
            return Err(BuildError::InvalidConfig(format!(
                "{status} is not an HTTP status code"
            )));
        }
        Ok(())
    }

    fn validate_base_url(&self) -> Result<(), BuildError> {
        match &self.base_url {
            Some(url) if url.trim().is_empty() => Err(BuildError::InvalidConfig(
                "base URL must not be empty".into(),
            )),
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => Err(
                BuildError::InvalidConfig(format!("base URL must be http or https: {url}")),
            ),
            _ => Ok(()),
        }
    }

    fn validate_timeouts(&self) -> Result<(), BuildError> {
        if let Some(timeout) = self.open_timeout_ms {
            ensure_positive!(timeout, "open_timeout_ms")?;
        }
        if let Some(timeout) = self.timeout_ms {
            ensure_positive!(timeout, "timeout_ms")?;
        }
        Ok(())
    }

    fn credentials(&self) -> Option<Credentials> {
        let mut credentials = Credentials::new(self.api_key.clone()?);
        if let Some(user_agent) = &self.custom_user_agent {
            credentials = credentials.with_custom_user_agent(user_agent.clone());
        }
        if let Some(identifier) = &self.agent_identifier {
            credentials = credentials.with_agent_identifier(identifier.clone());
        }
        Some(credentials)
    }

    /// Validate and assemble the configuration without building a transport.
    pub fn build_config(&self) -> Result<TransportConfig, BuildError> {
        self.validate()?;

        let defaults = EndpointConfig::default();
        let endpoint = EndpointConfig {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            open_timeout: self
                .open_timeout_ms
                .map_or(defaults.open_timeout, Duration::from_millis),
            timeout: self
                .timeout_ms
                .map_or(defaults.timeout, Duration::from_millis),
            proxy: self.proxy.clone(),
        };
        let mut config = TransportConfig::new(endpoint);
        if let Some(attempts) = self.max_attempts {
            config.retry.max_attempts = attempts;
        }
        if let Some(statuses) = &self.retryable_statuses {
            config.status = StatusPolicy::with_retryable(statuses.iter().copied());
        }
        self.backoff.apply(&mut config.retry.backoff)?;
        Ok(config)
    }

    /// Build the transport.
    ///
    /// A missing API key is not an error here; requests report it instead.
    pub fn build(&self) -> Result<Transport, BuildError> {
        let config = self.build_config()?;
        let backend = match &self.backend {
            Some(backend) => Arc::clone(backend),
            None => Arc::new(UreqBackend::new(config.endpoint.clone())),
        };
        Ok(Transport::from_config(self.credentials(), config, backend))
    }
}

impl std::fmt::Debug for TransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("proxy", &self.proxy)
            .field("open_timeout_ms", &self.open_timeout_ms)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_attempts", &self.max_attempts)
            .field("retryable_statuses", &self.retryable_statuses)
            .field("backoff", &self.backoff)
            .field("backend", &self.backend.as_ref().map(|b| b.kind()))
            .finish()
    }
}
