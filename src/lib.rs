//! # docling-serve-client
//!
//! Typed async client for the [docling-serve] document conversion and
//! chunking API.
//!
//! ## Pipeline Overview
//!
//! Every endpoint method funnels through one dispatch path:
//!
//! ```text
//! endpoint method
//!  │
//!  ├─ 1. Encode    files + settings → multipart form   (pipeline::multipart)
//!  ├─ 2. Negotiate payload → wire body + Content-Type   (pipeline::body)
//!  ├─ 3. Send      exactly one transport call           (Transport)
//!  ├─ 4. Decode    2xx body → JSON / bytes / text       (pipeline::decode)
//!  └─ 5. Normalize non-2xx → ApiError                    (pipeline::failure)
//! ```
//!
//! Long-running work uses the submit → poll → fetch pattern: the `*_async`
//! methods return a [`TaskStatusResponse`], [`DoclingClient::poll_task`]
//! refreshes it, and [`DoclingClient::task_result`] fetches the outcome.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docling_serve_client::{
//!     ConvertDocumentsRequest, ConvertResult, DoclingClient, HttpSource, RequestOptions,
//!     ResponseFormat,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads DOCLING_SERVE_URL / DOCLING_SERVE_API_KEY, defaults to localhost:8000
//!     let client = DoclingClient::from_env()?;
//!     let request =
//!         ConvertDocumentsRequest::new([HttpSource::new("https://arxiv.org/pdf/2206.01062")]);
//!     let result = client
//!         .convert_source(&request, RequestOptions::new(), ResponseFormat::Json)
//!         .await?;
//!     if let Some(ConvertResult::Document(doc)) = result.structured() {
//!         println!("{}", doc.document.md_content.unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `reqwest-transport` | on | Built-in [`ReqwestTransport`] (rustls, multipart, streaming) |
//!
//! Without it, supply your own [`Transport`] through
//! [`ClientConfigBuilder::transport`].
//!
//! [docling-serve]: https://github.com/docling-project/docling-serve

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod transport;
pub mod types;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{DoclingClient, Payload, RequestOptions, ResponseFormat};
pub use config::{ClientConfig, ClientConfigBuilder, API_KEY_HEADER, DEFAULT_BASE_URL};
pub use dispatch::ApiRequest;
pub use error::{ApiError, DoclingError, ValidationError};
pub use pipeline::body::{RequestBody, WireBody};
pub use pipeline::decode::{DecodedBody, ResponseMode};
pub use pipeline::multipart::{BinaryPayload, FileInput, MultipartForm, SettingValue, Settings};
pub use transport::{ByteStream, Transport, TransportError, TransportRequest, TransportResponse};
pub use types::*;

#[cfg(feature = "reqwest-transport")]
pub use transport::ReqwestTransport;
