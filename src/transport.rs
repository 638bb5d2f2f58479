//! HTTP transport boundary.
//!
//! The client never talks to the network directly. Every request goes through
//! one call to a [`Transport`], which receives the final URL, method, headers,
//! body and cancellation token, and hands back a status, headers and a lazily
//! drained body stream. DNS, TLS, proxies, redirects and connection pooling
//! all live behind this trait.
//!
//! [`ReqwestTransport`] is the built-in implementation (feature
//! `reqwest-transport`, on by default). Tests and embedders can plug in their
//! own, for example a recorder that returns canned responses.

use crate::pipeline::body::WireBody;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::{Method, StatusCode};
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A response body: chunks of bytes, each of which may fail to arrive.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Failures raised by a [`Transport`]. The dispatcher passes these through
/// unchanged.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Error reported by the reqwest client.
    #[error("HTTP transport error: {0}")]
    Network(#[from] reqwest::Error),

    /// The call's cancellation token fired before the response completed.
    #[error("Request was cancelled")]
    Cancelled,

    /// Error raised by a custom transport.
    #[error("Transport error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TransportError::Other(err.into())
    }
}

/// Everything a transport needs to perform one HTTP call.
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<WireBody>,
    pub cancel: Option<CancellationToken>,
}

impl fmt::Debug for TransportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

/// A raw HTTP response whose body has not been read yet.
pub struct TransportResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ByteStream,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ByteStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response whose body is already in memory.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self::new(status, headers, stream::once(async move { Ok(body) }).boxed())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase for the status code (empty for unknown codes).
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Declared `Content-Length`, if the header is present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    }

    /// Split into headers and the undrained body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, ByteStream) {
        (self.status, self.headers, self.body)
    }

    pub fn into_stream(self) -> ByteStream {
        self.body
    }

    /// End the body with [`TransportError::Cancelled`] as soon as `token`
    /// fires, even if the server has stalled mid-body.
    pub fn cancel_on(self, token: CancellationToken) -> Self {
        Self {
            body: cancellable(self.body, token),
            ..self
        }
    }

    /// Drain the whole body into memory.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Drain the body and decode it as UTF-8, replacing invalid sequences.
    pub async fn text(self) -> Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn cancellable(body: ByteStream, token: CancellationToken) -> ByteStream {
    stream::unfold(Some((body, token)), |state| async move {
        let (mut body, token) = state?;
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            chunk = body.next() => Some(chunk),
        };
        match next {
            None => Some((Err(TransportError::Cancelled), None)),
            Some(chunk) => chunk.map(|chunk| (chunk, Some((body, token)))),
        }
    })
    .boxed()
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Performs exactly one HTTP call per invocation.
///
/// Implementations must honour `request.cancel` if they can: when the token
/// fires, return whatever error represents cancellation for them
/// (`TransportError::Cancelled` for the built-in transport). The token only
/// needs to cover the call up to the response headers; the dispatcher ends
/// the body stream itself once the token fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(feature = "reqwest-transport")]
pub use self::reqwest_impl::ReqwestTransport;

#[cfg(feature = "reqwest-transport")]
mod reqwest_impl {
    use super::*;
    use crate::pipeline::multipart::{FormPart, MultipartForm};
    use reqwest::multipart::{Form, Part};
    use reqwest::{Body, Client};
    use tracing::debug;

    /// [`Transport`] backed by a shared `reqwest::Client`.
    ///
    /// reqwest follows its default redirect policy; no timeout is set, callers
    /// wanting a deadline cancel the call's token.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        pub fn new(user_agent: &str) -> Result<Self, TransportError> {
            let client = Client::builder().user_agent(user_agent).build()?;
            Ok(Self { client })
        }

        /// Wrap an existing client, e.g. one configured with a proxy.
        pub fn with_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            let TransportRequest {
                method,
                url,
                headers,
                body,
                cancel,
            } = request;

            let mut builder = self.client.request(method, url).headers(headers);
            builder = match body {
                None => builder,
                Some(WireBody::Text(text)) => builder.body(text),
                Some(WireBody::Bytes(bytes)) => builder.body(bytes),
                Some(WireBody::UrlEncoded(pairs)) => builder.body(encode_pairs(&pairs)),
                Some(WireBody::Stream(stream)) => builder.body(Body::wrap_stream(stream)),
                Some(WireBody::Multipart(form)) => builder.multipart(into_reqwest_form(form)?),
            };

            let send = builder.send();
            let response = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(TransportError::Cancelled),
                    response = send => response?,
                },
                None => send.await?,
            };

            debug!("Transport received HTTP {}", response.status());
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes_stream().map(|chunk| chunk.map_err(TransportError::from));
            Ok(TransportResponse::new(status, headers, body.boxed()))
        }
    }

    fn encode_pairs(pairs: &[(String, String)]) -> String {
        pairs
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    fn into_reqwest_form(form: MultipartForm) -> Result<Form, TransportError> {
        let mut out = Form::new();
        for part in form.into_parts() {
            out = match part {
                FormPart::Text { name, value } => out.text(name, value),
                FormPart::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    let part = Part::bytes(data.to_vec())
                        .file_name(filename)
                        .mime_str(&content_type)?;
                    out.part(name, part)
                }
            };
        }
        Ok(out)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn url_encoded_pairs_are_escaped() {
            let pairs = vec![
                ("q".to_string(), "a b&c".to_string()),
                ("lang".to_string(), "en".to_string()),
            ];
            assert_eq!(encode_pairs(&pairs), "q=a%20b%26c&lang=en");
        }
    }
}
