//! Client identity attached to every request.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};

use crate::transport::BackendKind;

/// Library identifier advertised in the default user agent.
pub const USER_AGENT_PRODUCT: &str = concat!("appoptics-metrics-rs/", env!("CARGO_PKG_VERSION"));

/// API credentials and optional user-agent customisation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    custom_user_agent: Option<String>,
    agent_identifier: Option<String>,
}

impl Credentials {
    /// Create credentials for the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            custom_user_agent: None,
            agent_identifier: None,
        }
    }

    /// Replace the generated user agent entirely.
    pub fn with_custom_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.custom_user_agent = Some(user_agent.into());
        self
    }

    /// Prefix the generated user agent with an application identifier.
    pub fn with_agent_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.agent_identifier = Some(identifier.into());
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn custom_user_agent(&self) -> Option<&str> {
        self.custom_user_agent.as_deref()
    }

    pub fn agent_identifier(&self) -> Option<&str> {
        self.agent_identifier.as_deref()
    }

    /// `Authorization` header value: Basic auth with the API key as the user
    /// name and an empty password.
    pub fn basic_auth_header(&self) -> String {
        let encoded = BASE64_STANDARD.encode(format!("{}:", self.api_key));
        format!("Basic {encoded}")
    }

    /// User agent sent with each request.
    ///
    /// A custom user agent wins outright. Otherwise the agent identifier (when
    /// present and non-empty) is followed by the library product token, the
    /// platform, and the HTTP backend in use.
    pub fn user_agent(&self, backend: BackendKind) -> String {
        if let Some(custom) = &self.custom_user_agent {
            return custom.clone();
        }
        let mut chunks = Vec::with_capacity(4);
        if let Some(identifier) = self.agent_identifier.as_deref()
            && !identifier.is_empty()
        {
            chunks.push(identifier.to_owned());
        }
        chunks.push(USER_AGENT_PRODUCT.to_owned());
        chunks.push(format!(
            "(rust; {}; {})",
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        chunks.push(format!("direct-{}", backend.label()));
        chunks.join(" ")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("custom_user_agent", &self.custom_user_agent)
            .field("agent_identifier", &self.agent_identifier)
            .finish()
    }
}
