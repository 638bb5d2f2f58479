//! The docling-serve client and its endpoint methods.
//!
//! Every method here is a thin mapping onto [`DoclingClient::execute`]: a
//! fixed method and path, a body built by the multipart encoder or the body
//! negotiator, and a response format. None of them keep state between calls.
//!
//! ## Async tasks
//!
//! ```text
//! *_async(...) ──▶ TaskStatusResponse { task_id, .. }
//!                      │
//!      poll_task(id) ◀─┘  repeat until task_status.is_terminal()
//!                      │
//!    task_result(id) ──▶ same shape as the synchronous call
//! ```
//!
//! The client never polls on its own; scheduling is the caller's business.

use crate::config::ClientConfig;
use crate::dispatch::ApiRequest;
use crate::error::DoclingError;
use crate::pipeline::body::RequestBody;
use crate::pipeline::decode::ResponseMode;
use crate::pipeline::multipart::{encode_multipart, FileInput, Settings};
use crate::transport::Transport;
use crate::types::{
    ChunkDocumentResponse, ClearResponse, ConvertDocumentsRequest, ConvertFileSettings,
    ConvertResult, HealthCheckResponse, HierarchicalChunkFileSettings,
    HierarchicalChunkerOptionsDocumentsRequest, HybridChunkFileSettings,
    HybridChunkerOptionsDocumentsRequest, TaskResult, TaskStatusResponse,
};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Multipart field every file endpoint expects the uploads under.
const FILE_FIELD: &str = "files";

const ACCEPT_JSON: &str = "application/json";
const ACCEPT_ZIP: &str = "application/zip";

// ── Per-call options ─────────────────────────────────────────────────────

/// Options accepted by every endpoint method.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers for this call; they replace client defaults of the same name.
    pub headers: HeaderMap,
    /// Fires to abort the call, including a response body still arriving.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Representation requested from the synchronous endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Structured JSON, decoded into the endpoint's result type.
    #[default]
    Json,
    /// Raw zip archive bytes.
    Zip,
}

impl ResponseFormat {
    fn mode(self) -> ResponseMode {
        match self {
            ResponseFormat::Json => ResponseMode::Json,
            ResponseFormat::Zip => ResponseMode::Binary,
        }
    }

    fn accept(self) -> &'static str {
        match self {
            ResponseFormat::Json => ACCEPT_JSON,
            ResponseFormat::Zip => ACCEPT_ZIP,
        }
    }
}

/// Result of an endpoint that can answer in either representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<T> {
    Structured(T),
    Binary(Bytes),
    /// A JSON success with no body (204 or `Content-Length: 0`).
    Empty,
}

impl<T> Payload<T> {
    pub fn structured(self) -> Option<T> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::Binary(_) | Payload::Empty => None,
        }
    }

    pub fn binary(self) -> Option<Bytes> {
        match self {
            Payload::Binary(bytes) => Some(bytes),
            Payload::Structured(_) | Payload::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// Async client for a docling-serve instance.
///
/// Cheap to clone; clones share configuration and transport.
///
/// # Example
/// ```rust,no_run
/// use docling_serve_client::{ConvertDocumentsRequest, DoclingClient, HttpSource};
///
/// # async fn run() -> Result<(), docling_serve_client::DoclingError> {
/// let client = DoclingClient::with_base_url("http://localhost:5001")?;
/// let request = ConvertDocumentsRequest::new([HttpSource::new("https://arxiv.org/pdf/2206.01062")]);
/// if let Some(task) = client.convert_source_async(&request, Default::default()).await? {
///     let status = client.poll_task(&task.task_id, Default::default()).await?;
///     println!("{:?}", status.map(|s| s.task_status));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DoclingClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    base_headers: HeaderMap,
}

impl fmt::Debug for DoclingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoclingClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("api_key", &self.config.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl DoclingClient {
    /// Build a client. Fails when no transport is available.
    pub fn new(config: ClientConfig) -> Result<Self, DoclingError> {
        let transport = resolve_transport(&config)?;
        let base_headers = config.base_headers()?;
        info!(
            "docling-serve client for {} (api key: {})",
            config.base_url,
            if config.api_key.is_some() { "set" } else { "none" }
        );
        Ok(Self {
            config: Arc::new(config),
            transport,
            base_headers,
        })
    }

    /// Build from `DOCLING_SERVE_URL` / `DOCLING_SERVE_API_KEY`.
    pub fn from_env() -> Result<Self, DoclingError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn with_base_url(url: impl Into<String>) -> Result<Self, DoclingError> {
        Self::new(ClientConfig::builder().base_url(url).build()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn base_headers(&self) -> &HeaderMap {
        &self.base_headers
    }

    // ── Service ──────────────────────────────────────────────────────────
    //
    // JSON-only endpoints return `None` when the server answers with an empty
    // success body instead of failing to decode it.

    /// `GET /health`
    pub async fn health(&self, options: RequestOptions) -> Result<Option<HealthCheckResponse>, DoclingError> {
        self.fetch(ApiRequest::get("/health"), options).await
    }

    /// `GET /openapi-3.0.json`
    pub async fn openapi_document(
        &self,
        options: RequestOptions,
    ) -> Result<Option<Value>, DoclingError> {
        self.fetch(ApiRequest::get("/openapi-3.0.json"), options).await
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// `POST /v1/convert/source`
    pub async fn convert_source(
        &self,
        request: &ConvertDocumentsRequest,
        options: RequestOptions,
        format: ResponseFormat,
    ) -> Result<Payload<ConvertResult>, DoclingError> {
        let request = json_request("/v1/convert/source", request)?;
        self.fetch_payload(request, options, format).await
    }

    /// `POST /v1/convert/source/async`
    pub async fn convert_source_async(
        &self,
        request: &ConvertDocumentsRequest,
        options: RequestOptions,
    ) -> Result<Option<TaskStatusResponse>, DoclingError> {
        let request = json_request("/v1/convert/source/async", request)?;
        self.fetch(request, options).await
    }

    /// `POST /v1/convert/file`
    pub async fn convert_file(
        &self,
        files: Vec<FileInput>,
        settings: Option<&ConvertFileSettings>,
        options: RequestOptions,
        format: ResponseFormat,
    ) -> Result<Payload<ConvertResult>, DoclingError> {
        let settings = settings.map(ConvertFileSettings::to_settings).transpose()?;
        let request = file_request("/v1/convert/file", files, settings)?;
        self.fetch_payload(request, options, format).await
    }

    /// `POST /v1/convert/file/async`
    pub async fn convert_file_async(
        &self,
        files: Vec<FileInput>,
        settings: Option<&ConvertFileSettings>,
        options: RequestOptions,
    ) -> Result<Option<TaskStatusResponse>, DoclingError> {
        let settings = settings.map(ConvertFileSettings::to_settings).transpose()?;
        let request = file_request("/v1/convert/file/async", files, settings)?;
        self.fetch(request, options).await
    }

    // ── Hybrid chunking ──────────────────────────────────────────────────

    /// `POST /v1/chunk/hybrid/source`
    pub async fn chunk_hybrid_source(
        &self,
        request: &HybridChunkerOptionsDocumentsRequest,
        options: RequestOptions,
        format: ResponseFormat,
    ) -> Result<Payload<ChunkDocumentResponse>, DoclingError> {
        let request = json_request("/v1/chunk/hybrid/source", request)?;
        self.fetch_payload(request, options, format).await
    }

    /// `POST /v1/chunk/hybrid/source/async`
    pub async fn chunk_hybrid_source_async(
        &self,
        request: &HybridChunkerOptionsDocumentsRequest,
        options: RequestOptions,
    ) -> Result<Option<TaskStatusResponse>, DoclingError> {
        let request = json_request("/v1/chunk/hybrid/source/async", request)?;
        self.fetch(request, options).await
    }

    /// `POST /v1/chunk/hybrid/file`
    pub async fn chunk_hybrid_file(
        &self,
        files: Vec<FileInput>,
        settings: Option<&HybridChunkFileSettings>,
        options: RequestOptions,
        format: ResponseFormat,
    ) -> Result<Payload<ChunkDocumentResponse>, DoclingError> {
        let settings = settings.map(HybridChunkFileSettings::to_settings).transpose()?;
        let request = file_request("/v1/chunk/hybrid/file", files, settings)?;
        self.fetch_payload(request, options, format).await
    }

    /// `POST /v1/chunk/hybrid/file/async`
    pub async fn chunk_hybrid_file_async(
        &self,
        files: Vec<FileInput>,
        settings: Option<&HybridChunkFileSettings>,
        options: RequestOptions,
    ) -> Result<Option<TaskStatusResponse>, DoclingError> {
        let settings = settings.map(HybridChunkFileSettings::to_settings).transpose()?;
        let request = file_request("/v1/chunk/hybrid/file/async", files, settings)?;
        self.fetch(request, options).await
    }

    // ── Hierarchical chunking ────────────────────────────────────────────

    /// `POST /v1/chunk/hierarchical/source`
    pub async fn chunk_hierarchical_source(
        &self,
        request: &HierarchicalChunkerOptionsDocumentsRequest,
        options: RequestOptions,
        format: ResponseFormat,
    ) -> Result<Payload<ChunkDocumentResponse>, DoclingError> {
        let request = json_request("/v1/chunk/hierarchical/source", request)?;
        self.fetch_payload(request, options, format).await
    }

    /// `POST /v1/chunk/hierarchical/source/async`
    pub async fn chunk_hierarchical_source_async(
        &self,
        request: &HierarchicalChunkerOptionsDocumentsRequest,
        options: RequestOptions,
    ) -> Result<Option<TaskStatusResponse>, DoclingError> {
        let request = json_request("/v1/chunk/hierarchical/source/async", request)?;
        self.fetch(request, options).await
    }

    /// `POST /v1/chunk/hierarchical/file`
    pub async fn chunk_hierarchical_file(
        &self,
        files: Vec<FileInput>,
        settings: Option<&HierarchicalChunkFileSettings>,
        options: RequestOptions,
        format: ResponseFormat,
    ) -> Result<Payload<ChunkDocumentResponse>, DoclingError> {
        let settings = settings
            .map(HierarchicalChunkFileSettings::to_settings)
            .transpose()?;
        let request = file_request("/v1/chunk/hierarchical/file", files, settings)?;
        self.fetch_payload(request, options, format).await
    }

    /// `POST /v1/chunk/hierarchical/file/async`
    pub async fn chunk_hierarchical_file_async(
        &self,
        files: Vec<FileInput>,
        settings: Option<&HierarchicalChunkFileSettings>,
        options: RequestOptions,
    ) -> Result<Option<TaskStatusResponse>, DoclingError> {
        let settings = settings
            .map(HierarchicalChunkFileSettings::to_settings)
            .transpose()?;
        let request = file_request("/v1/chunk/hierarchical/file/async", files, settings)?;
        self.fetch(request, options).await
    }

    // ── Tasks ────────────────────────────────────────────────────────────

    /// `GET /v1/status/poll/{task_id}`
    pub async fn poll_task(
        &self,
        task_id: &str,
        options: RequestOptions,
    ) -> Result<Option<TaskStatusResponse>, DoclingError> {
        let path = format!("/v1/status/poll/{}", urlencoding::encode(task_id));
        self.fetch(ApiRequest::get(path), options).await
    }

    /// `GET /v1/result/{task_id}`
    pub async fn task_result(
        &self,
        task_id: &str,
        options: RequestOptions,
        format: ResponseFormat,
    ) -> Result<Payload<TaskResult>, DoclingError> {
        self.fetch_payload(result_request(task_id), options, format)
            .await
    }

    /// `GET /v1/result/{task_id}`, decoded into a shape the caller already knows.
    pub async fn task_result_as<T: DeserializeOwned>(
        &self,
        task_id: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, DoclingError> {
        self.fetch(result_request(task_id), options).await
    }

    // ── Maintenance ──────────────────────────────────────────────────────

    /// `GET /v1/clear/converters`
    pub async fn clear_converters(
        &self,
        options: RequestOptions,
    ) -> Result<Option<ClearResponse>, DoclingError> {
        self.fetch(ApiRequest::get("/v1/clear/converters"), options)
            .await
    }

    /// `GET /v1/clear/results`
    pub async fn clear_results(
        &self,
        options: RequestOptions,
    ) -> Result<Option<ClearResponse>, DoclingError> {
        self.fetch(ApiRequest::get("/v1/clear/results"), options).await
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        options: RequestOptions,
    ) -> Result<Option<T>, DoclingError> {
        let body = self
            .execute(with_options(request, options, ResponseFormat::Json))
            .await?;
        if body.is_empty() {
            return Ok(None);
        }
        body.into_json().map(Some)
    }

    async fn fetch_payload<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        options: RequestOptions,
        format: ResponseFormat,
    ) -> Result<Payload<T>, DoclingError> {
        let body = self
            .execute(with_options(request, options, format))
            .await?;
        if body.is_empty() {
            return Ok(Payload::Empty);
        }
        match format {
            ResponseFormat::Json => Ok(Payload::Structured(body.into_json()?)),
            ResponseFormat::Zip => Ok(Payload::Binary(body.into_bytes()?)),
        }
    }
}

#[cfg(feature = "reqwest-transport")]
fn resolve_transport(config: &ClientConfig) -> Result<Arc<dyn Transport>, DoclingError> {
    if let Some(transport) = &config.transport {
        return Ok(Arc::clone(transport));
    }
    let transport = crate::transport::ReqwestTransport::new(&config.user_agent).map_err(|e| {
        DoclingError::InvalidConfig(format!("failed to build HTTP transport: {e}"))
    })?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "reqwest-transport"))]
fn resolve_transport(config: &ClientConfig) -> Result<Arc<dyn Transport>, DoclingError> {
    config.transport.clone().ok_or_else(|| {
        DoclingError::InvalidConfig(
            "no transport configured and the `reqwest-transport` feature is disabled".into(),
        )
    })
}

fn with_options(request: ApiRequest, options: RequestOptions, format: ResponseFormat) -> ApiRequest {
    request
        .headers(options.headers)
        .cancel(options.cancel)
        .mode(format.mode())
        .default_accept(format.accept())
}

fn json_request<B: Serialize>(path: &str, body: &B) -> Result<ApiRequest, DoclingError> {
    Ok(ApiRequest::post(path).body(RequestBody::json(body)?))
}

fn file_request(
    path: &str,
    files: Vec<FileInput>,
    settings: Option<Settings>,
) -> Result<ApiRequest, DoclingError> {
    let form = encode_multipart(FILE_FIELD, files, settings.as_ref())?;
    Ok(ApiRequest::post(path).body(form))
}

fn result_request(task_id: &str) -> ApiRequest {
    ApiRequest::get(format!("/v1/result/{}", urlencoding::encode(task_id)))
}
