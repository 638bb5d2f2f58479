//! Body negotiation: decide what goes on the wire and with which
//! `Content-Type`.
//!
//! A candidate payload is either a structured value, which is always sent as
//! JSON, or one of the closed set of [`WireBody`] shapes, which are sent
//! unchanged. Each wire shape declares its own default content type; it is
//! applied only when the caller did not set one. Multipart bodies never get a
//! content type here because the boundary belongs to the transport.

use crate::error::DoclingError;
use crate::pipeline::multipart::MultipartForm;
use crate::transport::ByteStream;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub const APPLICATION_JSON: &str = "application/json";
pub const FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";

/// A body that is already in a form the transport can send.
pub enum WireBody {
    /// Text, assumed to be JSON unless the caller says otherwise.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// A prebuilt multipart form.
    Multipart(MultipartForm),
    /// `application/x-www-form-urlencoded` key/value pairs.
    UrlEncoded(Vec<(String, String)>),
    /// A streaming body of unknown length.
    Stream(ByteStream),
}

impl WireBody {
    /// Content type applied when the caller set none.
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            WireBody::Text(_) => Some(APPLICATION_JSON),
            WireBody::UrlEncoded(_) => Some(FORM_URL_ENCODED),
            WireBody::Bytes(_) | WireBody::Multipart(_) | WireBody::Stream(_) => None,
        }
    }

    pub fn as_multipart(&self) -> Option<&MultipartForm> {
        match self {
            WireBody::Multipart(form) => Some(form),
            _ => None,
        }
    }

    /// Text or byte content, when the body is held in memory.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            WireBody::Text(text) => Some(text.as_bytes()),
            WireBody::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl fmt::Debug for WireBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireBody::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            WireBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            WireBody::Multipart(form) => {
                f.debug_tuple("Multipart").field(&form.parts().len()).finish()
            }
            WireBody::UrlEncoded(pairs) => f.debug_tuple("UrlEncoded").field(pairs).finish(),
            WireBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<String> for WireBody {
    fn from(text: String) -> Self {
        WireBody::Text(text)
    }
}

impl From<Bytes> for WireBody {
    fn from(bytes: Bytes) -> Self {
        WireBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for WireBody {
    fn from(bytes: Vec<u8>) -> Self {
        WireBody::Bytes(bytes.into())
    }
}

impl From<MultipartForm> for WireBody {
    fn from(form: MultipartForm) -> Self {
        WireBody::Multipart(form)
    }
}

/// A request payload before negotiation.
#[derive(Debug)]
pub enum RequestBody {
    /// Sent as-is.
    Wire(WireBody),
    /// Serialized to JSON.
    Structured(Value),
}

impl RequestBody {
    /// Serialize any value into a structured payload.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, DoclingError> {
        serde_json::to_value(value)
            .map(RequestBody::Structured)
            .map_err(|e| DoclingError::invalid_input(format!("request body: {e}")))
    }
}

impl From<WireBody> for RequestBody {
    fn from(body: WireBody) -> Self {
        RequestBody::Wire(body)
    }
}

impl From<String> for RequestBody {
    fn from(body: String) -> Self {
        RequestBody::Wire(body.into())
    }
}

impl From<Bytes> for RequestBody {
    fn from(body: Bytes) -> Self {
        RequestBody::Wire(body.into())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(body: Vec<u8>) -> Self {
        RequestBody::Wire(body.into())
    }
}

impl From<MultipartForm> for RequestBody {
    fn from(body: MultipartForm) -> Self {
        RequestBody::Wire(body.into())
    }
}

/// Turn a candidate payload into the final wire body, adjusting `headers`.
///
/// * `None` → no body, headers untouched
/// * wire shapes → unchanged; default content type only if none is set
/// * structured values → JSON text, `Content-Type: application/json`
///   overriding whatever the caller set
pub fn prepare_body(
    body: Option<RequestBody>,
    headers: &mut HeaderMap,
) -> Result<Option<WireBody>, DoclingError> {
    match body {
        None => Ok(None),
        Some(RequestBody::Wire(wire)) => {
            if let Some(default) = wire.default_content_type() {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(default));
                }
            }
            Ok(Some(wire))
        }
        Some(RequestBody::Structured(value)) => {
            let text = serde_json::to_string(&value)
                .map_err(|e| DoclingError::invalid_input(format!("request body: {e}")))?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            Ok(Some(WireBody::Text(text)))
        }
    }
}
