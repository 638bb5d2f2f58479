//! Response decoding for successful (2xx) responses.
//!
//! The caller declares up front how a body should be read with a
//! [`ResponseMode`]; the decoder never sniffs the content. Failures here are
//! not absorbed: a 2xx body that does not decode is a contract violation the
//! caller has to see.

use crate::error::DoclingError;
use crate::transport::{ByteStream, TransportResponse};
use bytes::Bytes;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::debug;

/// How a successful response body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Parse as JSON. Empty successes (204 or `Content-Length: 0`) yield
    /// [`DecodedBody::Empty`] without parsing.
    #[default]
    Json,
    /// Buffer the whole body.
    Binary,
    /// Hand back the undrained body stream.
    Blob,
    /// Decode as UTF-8 text.
    Text,
    /// Ignore the body.
    Void,
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseMode::Json => "json",
            ResponseMode::Binary => "binary",
            ResponseMode::Blob => "blob",
            ResponseMode::Text => "text",
            ResponseMode::Void => "void",
        };
        f.write_str(name)
    }
}

/// A decoded success body, tagged by how it was read.
pub enum DecodedBody {
    Json(Value),
    Binary(Bytes),
    Stream(ByteStream),
    Text(String),
    Empty,
}

impl DecodedBody {
    /// Deserialize a structured body into `T`.
    ///
    /// An empty body deserializes from `null`, so `Option<T>` and `Value`
    /// targets accept it while struct targets report a decode error.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, DoclingError> {
        let value = match self {
            DecodedBody::Json(value) => value,
            DecodedBody::Empty => Value::Null,
            other => {
                return Err(DoclingError::Decode {
                    mode: ResponseMode::Json,
                    detail: format!("expected a structured body, got {}", other.kind()),
                })
            }
        };
        serde_json::from_value(value).map_err(|e| DoclingError::Decode {
            mode: ResponseMode::Json,
            detail: e.to_string(),
        })
    }

    /// The buffered bytes of a binary body.
    pub fn into_bytes(self) -> Result<Bytes, DoclingError> {
        match self {
            DecodedBody::Binary(bytes) => Ok(bytes),
            DecodedBody::Empty => Ok(Bytes::new()),
            other => Err(DoclingError::Decode {
                mode: ResponseMode::Binary,
                detail: format!("expected a binary body, got {}", other.kind()),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DecodedBody::Empty)
    }

    fn kind(&self) -> &'static str {
        match self {
            DecodedBody::Json(_) => "json",
            DecodedBody::Binary(_) => "binary",
            DecodedBody::Stream(_) => "stream",
            DecodedBody::Text(_) => "text",
            DecodedBody::Empty => "empty",
        }
    }
}

impl fmt::Debug for DecodedBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedBody::Json(value) => f.debug_tuple("Json").field(value).finish(),
            DecodedBody::Binary(bytes) => f.debug_tuple("Binary").field(&bytes.len()).finish(),
            DecodedBody::Stream(_) => f.write_str("Stream"),
            DecodedBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            DecodedBody::Empty => f.write_str("Empty"),
        }
    }
}

/// Read a successful response according to `mode`.
pub async fn decode_response(
    response: TransportResponse,
    mode: ResponseMode,
) -> Result<DecodedBody, DoclingError> {
    match mode {
        ResponseMode::Binary => Ok(DecodedBody::Binary(response.bytes().await?)),
        ResponseMode::Blob => Ok(DecodedBody::Stream(response.into_stream())),
        ResponseMode::Text => Ok(DecodedBody::Text(response.text().await?)),
        ResponseMode::Void => Ok(DecodedBody::Empty),
        ResponseMode::Json => {
            if response.status() == StatusCode::NO_CONTENT || response.content_length() == Some(0)
            {
                debug!("Empty {} response, skipping JSON parse", response.status());
                return Ok(DecodedBody::Empty);
            }
            let bytes = response.bytes().await?;
            let value = serde_json::from_slice(&bytes).map_err(|e| DoclingError::Decode {
                mode,
                detail: e.to_string(),
            })?;
            Ok(DecodedBody::Json(value))
        }
    }
}
