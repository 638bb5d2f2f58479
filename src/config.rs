//! Client configuration.
//!
//! Everything a [`crate::DoclingClient`] needs is fixed once in a
//! [`ClientConfig`], built via its [`ClientConfigBuilder`]. The client keeps
//! the config behind an `Arc` and never mutates it, so one client can serve
//! any number of concurrent calls.

use crate::error::DoclingError;
use crate::transport::Transport;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use std::env;
use std::fmt;
use std::sync::Arc;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Environment variable read by [`ClientConfig::from_env`] for the base URL.
pub const ENV_BASE_URL: &str = "DOCLING_SERVE_URL";

/// Environment variable read by [`ClientConfig::from_env`] for the API key.
pub const ENV_API_KEY: &str = "DOCLING_SERVE_API_KEY";

/// Configuration for a docling-serve client.
///
/// # Example
/// ```rust
/// use docling_serve_client::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://docling.internal:5001")
///     .api_key("secret")
///     .header("X-Tenant", "acme")
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url.as_str(), "https://docling.internal:5001/");
/// ```
#[derive(Clone)]
pub struct ClientConfig {
    /// Service root. Always ends in `/` so relative paths join beneath it.
    pub base_url: Url,

    /// Static API key, sent as `X-Api-Key` on every request.
    pub api_key: Option<String>,

    /// Headers sent on every request. Per-call headers override these.
    pub default_headers: HeaderMap,

    /// Upper bound on how much of a failed response body is read. Default: 1 MiB.
    pub max_error_body_bytes: usize,

    /// User agent for the built-in transport.
    pub user_agent: String,

    /// Pre-constructed transport. Takes precedence over the built-in one.
    pub transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            default_headers: HeaderMap::new(),
            max_error_body_bytes: 1024 * 1024,
            user_agent: concat!("docling-serve-client/", env!("CARGO_PKG_VERSION")).to_string(),
            transport: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("default_headers", &self.default_headers.keys().collect::<Vec<_>>())
            .field("max_error_body_bytes", &self.max_error_body_bytes)
            .field("user_agent", &self.user_agent)
            .field("transport", &self.transport.as_ref().map(|_| "<dyn Transport>"))
            .finish()
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            base_url: None,
            api_key: None,
            headers: Vec::new(),
            config: Self::default(),
        }
    }

    /// Build from `DOCLING_SERVE_URL` and `DOCLING_SERVE_API_KEY`; unset or
    /// blank variables fall back to the defaults.
    pub fn from_env() -> Result<Self, DoclingError> {
        let mut builder = Self::builder();
        if let Some(url) = load_env_optional(ENV_BASE_URL) {
            builder = builder.base_url(url);
        }
        if let Some(key) = load_env_optional(ENV_API_KEY) {
            builder = builder.api_key(key);
        }
        builder.build()
    }

    /// Default headers plus the API key header, as sent on the wire.
    pub(crate) fn base_headers(&self) -> Result<HeaderMap, DoclingError> {
        let mut headers = self.default_headers.clone();
        if let Some(key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            let mut value = HeaderValue::from_str(key).map_err(|_| {
                DoclingError::InvalidConfig("API key is not a valid header value".into())
            })?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static("x-api-key"), value);
        }
        Ok(headers)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    headers: Vec<(String, String)>,
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Add a default header. Later calls with the same name replace earlier ones.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn max_error_body_bytes(mut self, bytes: usize) -> Self {
        self.config.max_error_body_bytes = bytes;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    /// Build the configuration, validating the URL and headers.
    pub fn build(self) -> Result<ClientConfig, DoclingError> {
        let mut config = self.config;

        if let Some(url) = self.base_url {
            config.base_url = normalize_base_url(&url)?;
        }
        config.api_key = self.api_key.filter(|key| !key.trim().is_empty());

        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                DoclingError::InvalidConfig(format!("invalid header name '{name}'"))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|_| {
                DoclingError::InvalidConfig(format!("invalid value for header '{name}'"))
            })?;
            config.default_headers.insert(name, value);
        }

        if config.max_error_body_bytes == 0 {
            return Err(DoclingError::InvalidConfig(
                "max_error_body_bytes must be ≥ 1".into(),
            ));
        }
        // Surface a bad API key now rather than on the first request.
        config.base_headers()?;
        Ok(config)
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("DEFAULT_BASE_URL is a valid URL")
}

/// Parse `url` and make sure its path ends in `/`.
pub(crate) fn normalize_base_url(url: &str) -> Result<Url, DoclingError> {
    let with_slash = if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    };
    let parsed = Url::parse(&with_slash)
        .map_err(|e| DoclingError::InvalidConfig(format!("invalid base URL '{url}': {e}")))?;
    if parsed.cannot_be_a_base() {
        return Err(DoclingError::InvalidConfig(format!(
            "base URL '{url}' cannot have relative paths"
        )));
    }
    Ok(parsed)
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
