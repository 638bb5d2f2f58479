//! Error normalization for non-2xx responses.
//!
//! Whatever the service sends back on failure, the caller receives one
//! [`ApiError`]. The body is drained at most up to a byte cap and parsed on a
//! best-effort basis: JSON when the response says it is JSON, text otherwise.
//! A body that fails to drain or parse becomes `None`; it must never replace
//! the HTTP failure with a secondary error.

use crate::error::ApiError;
use crate::transport::TransportResponse;
use bytes::BytesMut;
use futures::StreamExt;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, warn};

/// Build the normalized error for a failed response. Never fails.
pub async fn normalize_error(
    method: &str,
    path: &str,
    response: TransportResponse,
    max_body_bytes: usize,
) -> ApiError {
    let (status, headers, body) = response.into_parts();
    let is_json = is_json_media_type(&headers);

    let parsed = match drain_capped(body, max_body_bytes).await {
        Some(bytes) => parse_body(&bytes, is_json),
        None => None,
    };

    let error = ApiError::new(method, path, status, headers, parsed);
    warn!(
        "{} {} failed with HTTP {}",
        error.method(),
        error.path(),
        status.as_u16()
    );
    error
}

/// True when `Content-Type` names JSON (`application/json` or `*/*+json`).
fn is_json_media_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            let essence = value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            essence == "application/json" || essence.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Read up to `limit` bytes; `None` if any chunk fails.
async fn drain_capped(mut body: crate::transport::ByteStream, limit: usize) -> Option<BytesMut> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(chunk) => {
                let room = limit.saturating_sub(buf.len());
                if chunk.len() > room {
                    buf.extend_from_slice(&chunk[..room]);
                    debug!("Error body truncated at {} bytes", limit);
                    break;
                }
                buf.extend_from_slice(&chunk);
            }
            Err(e) => {
                debug!("Could not drain error body: {}", e);
                return None;
            }
        }
    }
    Some(buf)
}

fn parse_body(bytes: &[u8], is_json: bool) -> Option<Value> {
    if is_json {
        return match serde_json::from_slice(bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Error body is not valid JSON: {}", e);
                None
            }
        };
    }
    let text = String::from_utf8_lossy(bytes);
    if text.is_empty() {
        None
    } else {
        Some(Value::String(text.into_owned()))
    }
}
