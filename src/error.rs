//! Error types for the docling-serve client.
//!
//! Two error families reach the caller and are never conflated:
//!
//! * [`TransportError`](crate::transport::TransportError): the request never
//!   produced an HTTP response (network failure, DNS, cancellation). It is
//!   carried through [`DoclingError::Transport`] exactly as the transport
//!   produced it.
//!
//! * [`ApiError`]: the service answered with a non-2xx status. Every such
//!   outcome is normalized into this one shape by
//!   [`crate::pipeline::failure`], carrying the status, the response headers,
//!   a best-effort parsed body and the request it answered.
//!
//! The remaining [`DoclingError`] variants cover local failures: bad input,
//! bad configuration, and a 2xx body that does not decode.

use crate::pipeline::decode::ResponseMode;
use crate::transport::TransportError;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docling-serve client.
#[derive(Debug, Error)]
pub enum DoclingError {
    // ── Protocol errors ───────────────────────────────────────────────────
    /// The service returned a non-success status.
    #[error("{0}")]
    Api(Box<ApiError>),

    // ── Transport errors ──────────────────────────────────────────────────
    /// The transport failed before a response was available.
    #[error(transparent)]
    Transport(#[from] TransportError),

    // ── Local errors ──────────────────────────────────────────────────────
    /// A caller-supplied argument was rejected before any request was made.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Client configuration could not be built.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A successful response body did not match the declared mode.
    #[error("Failed to decode {mode} response body: {detail}")]
    Decode { mode: ResponseMode, detail: String },

    /// A file input could not be read from disk.
    #[error("Failed to read file input '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DoclingError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// The normalized HTTP error, if this is a protocol-level failure.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            DoclingError::Api(err) => Some(err),
            _ => None,
        }
    }

    /// HTTP status of a protocol-level failure.
    pub fn status(&self) -> Option<StatusCode> {
        self.as_api().map(ApiError::status)
    }

    /// True when the transport reported that the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DoclingError::Transport(TransportError::Cancelled))
    }
}

impl From<ApiError> for DoclingError {
    fn from(err: ApiError) -> Self {
        DoclingError::Api(Box::new(err))
    }
}

/// A non-2xx response, normalized.
///
/// `body` holds the parsed JSON when the response declared a JSON media type,
/// otherwise the text as a JSON string. It is `None` when the body was empty
/// or could not be drained.
#[derive(Debug, Clone)]
pub struct ApiError {
    message: String,
    status: StatusCode,
    status_text: String,
    body: Option<Value>,
    headers: HeaderMap,
    method: String,
    path: String,
}

impl ApiError {
    pub(crate) fn new(
        method: &str,
        path: &str,
        status: StatusCode,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> Self {
        Self {
            message: format!("Request to {path} failed with status {}", status.as_u16()),
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
            headers,
            method: method.to_uppercase(),
            path: path.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Upper-cased HTTP method of the failed request.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path as the caller passed it (relative or absolute).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Decode a FastAPI validation body (`{"detail": [{loc, msg, type}]}`).
    ///
    /// Returns an empty list when the body has another shape, e.g. the
    /// `{"detail": "message"}` form used for plain HTTP exceptions.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.body
            .as_ref()
            .and_then(|body| body.get("detail"))
            .and_then(|detail| serde_json::from_value(detail.clone()).ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// One entry of a 422 validation response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub loc: Vec<Value>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}
