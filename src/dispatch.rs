//! The request dispatcher: the single path every call takes.
//!
//! ```text
//! ApiRequest ──▶ resolve URL ──▶ merge headers ──▶ prepare body
//!            ──▶ transport.send (exactly once)
//!            ──▶ 2xx ? decode_response : normalize_error
//! ```
//!
//! There is no retry, no redirect policy beyond the transport's own, and no
//! timeout. The call's token goes to the transport untouched, and the
//! dispatcher also races it against every body read that follows, so a
//! stalled download or error body ends with `TransportError::Cancelled`.

use crate::client::DoclingClient;
use crate::error::DoclingError;
use crate::pipeline::body::{prepare_body, RequestBody};
use crate::pipeline::decode::{decode_response, DecodedBody, ResponseMode};
use crate::pipeline::failure::normalize_error;
use crate::transport::{TransportError, TransportRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, Url};
use tokio_util::sync::CancellationToken;
use tracing::debug;

static ABSOLUTE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("valid absolute URL regex"));

/// One call, described as data.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute `http(s)` URL, or a path relative to the base URL.
    pub path: String,
    pub body: Option<RequestBody>,
    /// Per-call headers; these win over the client's defaults.
    pub headers: HeaderMap,
    pub cancel: Option<CancellationToken>,
    pub mode: ResponseMode,
    /// `Accept` value used when neither defaults nor per-call headers set one.
    pub default_accept: Option<&'static str>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
            cancel: None,
            mode: ResponseMode::Json,
            default_accept: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn cancel(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    pub fn mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn default_accept(mut self, accept: &'static str) -> Self {
        self.default_accept = Some(accept);
        self
    }
}

impl DoclingClient {
    /// Send one request and decode the outcome.
    ///
    /// Non-2xx responses become [`DoclingError::Api`]; transport failures
    /// become [`DoclingError::Transport`] unchanged.
    pub async fn execute(&self, request: ApiRequest) -> Result<DecodedBody, DoclingError> {
        let ApiRequest {
            method,
            path,
            body,
            headers: extra,
            cancel,
            mode,
            default_accept,
        } = request;

        let url = resolve_url(&self.config().base_url, &path)?;
        let mut headers = merge_headers(self.base_headers().clone(), extra);
        if let Some(accept) = default_accept {
            if !headers.contains_key(ACCEPT) {
                headers.insert(ACCEPT, HeaderValue::from_static(accept));
            }
        }
        let body = prepare_body(body, &mut headers)?;

        if cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            debug!("{} {} cancelled before sending", method, url);
            return Err(TransportError::Cancelled.into());
        }

        debug!("{} {} ({} response)", method, url, mode);
        let response = self
            .transport()
            .send(TransportRequest {
                method: method.clone(),
                url,
                headers,
                body,
                cancel: cancel.clone(),
            })
            .await?;
        // Body reads below must stop when the token fires, whatever the transport.
        let response = match cancel {
            Some(token) => response.cancel_on(token),
            None => response,
        };

        if !response.status().is_success() {
            let error = normalize_error(
                method.as_str(),
                &path,
                response,
                self.config().max_error_body_bytes,
            )
            .await;
            return Err(error.into());
        }

        debug!("{} {} → HTTP {}", method, path, response.status().as_u16());
        decode_response(response, mode).await
    }
}

/// Absolute `http(s)` URLs are used verbatim; anything else is joined under
/// the base URL with one leading `/` stripped. The base is always treated as
/// a directory, whether or not its path ends in `/`.
pub(crate) fn resolve_url(base: &Url, path: &str) -> Result<String, DoclingError> {
    if ABSOLUTE_URL.is_match(path) {
        return Ok(path.to_string());
    }
    let relative = path.strip_prefix('/').unwrap_or(path);
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(relative)
        .map(String::from)
        .map_err(|e| DoclingError::invalid_input(format!("cannot resolve path '{path}': {e}")))
}

/// Overlay `extra` on `base`. Every header name present in `extra` replaces
/// all of its values in `base`.
pub(crate) fn merge_headers(mut base: HeaderMap, extra: HeaderMap) -> HeaderMap {
    base.extend(extra);
    base
}
