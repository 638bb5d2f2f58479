//! Request and response shapes of the docling-serve HTTP API.
//!
//! These mirror the service's published schema closely enough to be useful
//! without pinning every field. Optional request fields are skipped when
//! unset so the service applies its own defaults; response structs carry an
//! `extra` map so fields added by newer servers are kept rather than dropped.

use crate::error::DoclingError;
use crate::pipeline::multipart::{SettingValue, Settings};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Sources and targets ──────────────────────────────────────────────────

/// A document fetched by the service from a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSource {
    pub url: String,
    /// Headers the service sends when fetching `url`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub headers: Map<String, Value>,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Map::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Value::String(value.into()));
        self
    }
}

/// A document sent inline as base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSource {
    pub base64_string: String,
    pub filename: String,
}

impl FileSource {
    /// Encode raw bytes as an inline source.
    pub fn from_bytes(data: impl AsRef<[u8]>, filename: impl Into<String>) -> Self {
        Self {
            base64_string: STANDARD.encode(data),
            filename: filename.into(),
        }
    }
}

/// Where the service reads a document from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Source {
    Http(HttpSource),
    File(FileSource),
}

impl From<HttpSource> for Source {
    fn from(source: HttpSource) -> Self {
        Source::Http(source)
    }
}

impl From<FileSource> for Source {
    fn from(source: FileSource) -> Self {
        Source::File(source)
    }
}

/// Where results go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Target {
    /// Results are returned in the response body (default).
    InBody,
    /// Results are returned as a zip archive.
    Zip,
    /// Results are uploaded to a presigned URL.
    Put { url: String },
}

/// Target selector used by the multipart (file) endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    InBody,
    Zip,
}

// ── Conversion options ───────────────────────────────────────────────────

/// Export formats the service can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Md,
    Json,
    Html,
    HtmlSplitPage,
    Text,
    Doctags,
}

/// How pictures are represented in exported documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageExportMode {
    Placeholder,
    Embedded,
    Referenced,
}

/// Table structure model mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableMode {
    Fast,
    Accurate,
}

/// Conversion options. Unset fields use the server's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertDocumentsRequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_formats: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_formats: Option<Vec<OutputFormat>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_export_mode: Option<ImageExportMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_ocr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_ocr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_lang: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_mode: Option<TableMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_cell_matching: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<String>,
    /// Inclusive, 1-based page range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<(u32, u32)>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_timeout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_on_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_table_structure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md_page_break_placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_code_enrichment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_formula_enrichment: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_picture_classification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_picture_description: Option<bool>,
    /// Options this crate does not model yet; sent as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /v1/convert/source[/async]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertDocumentsRequest {
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ConvertDocumentsRequestOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

impl ConvertDocumentsRequest {
    pub fn new(sources: impl IntoIterator<Item = impl Into<Source>>) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            options: None,
            target: None,
        }
    }

    pub fn options(mut self, options: ConvertDocumentsRequestOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }
}

// ── Chunking options ─────────────────────────────────────────────────────

/// Options for the token-aware hybrid chunker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HybridChunkerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_peers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_markdown_tables: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_raw_text: Option<bool>,
}

/// Options for the structure-only hierarchical chunker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalChunkerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_markdown_tables: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_raw_text: Option<bool>,
}

/// Body of `POST /v1/chunk/<strategy>/source[/async]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDocumentsRequest<O> {
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convert_options: Option<ConvertDocumentsRequestOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking_options: Option<O>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_converted_doc: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

pub type HybridChunkerOptionsDocumentsRequest = ChunkDocumentsRequest<HybridChunkerOptions>;
pub type HierarchicalChunkerOptionsDocumentsRequest =
    ChunkDocumentsRequest<HierarchicalChunkerOptions>;

impl<O> ChunkDocumentsRequest<O> {
    pub fn new(sources: impl IntoIterator<Item = impl Into<Source>>) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            convert_options: None,
            chunking_options: None,
            include_converted_doc: None,
            target: None,
        }
    }

    pub fn chunking_options(mut self, options: O) -> Self {
        self.chunking_options = Some(options);
        self
    }

    pub fn convert_options(mut self, options: ConvertDocumentsRequestOptions) -> Self {
        self.convert_options = Some(options);
        self
    }
}

// ── Multipart settings ───────────────────────────────────────────────────

/// Form fields sent next to the files on `/v1/convert/file[/async]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConvertFileSettings {
    #[serde(flatten)]
    pub options: ConvertDocumentsRequestOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_type: Option<TargetType>,
}

impl ConvertFileSettings {
    pub fn to_settings(&self) -> Result<Settings, DoclingError> {
        Settings::from_serialize(self)
    }
}

/// Form fields sent next to the files on `/v1/chunk/<strategy>/file[/async]`.
///
/// The service expects chunker options as `chunking_<name>` form fields, so
/// they are prefixed during flattening.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFileSettings<O> {
    pub convert_options: ConvertDocumentsRequestOptions,
    pub chunking_options: O,
    pub include_converted_doc: Option<bool>,
    pub target_type: Option<TargetType>,
}

pub type HybridChunkFileSettings = ChunkFileSettings<HybridChunkerOptions>;
pub type HierarchicalChunkFileSettings = ChunkFileSettings<HierarchicalChunkerOptions>;

impl<O: Serialize> ChunkFileSettings<O> {
    pub fn to_settings(&self) -> Result<Settings, DoclingError> {
        let mut settings = Settings::from_serialize(&self.convert_options)?;
        for (key, value) in Settings::from_serialize(&self.chunking_options)?.iter() {
            settings = settings.insert(format!("chunking_{key}"), value.clone());
        }
        if let Some(include) = self.include_converted_doc {
            settings = settings.insert("include_converted_doc", include);
        }
        if let Some(target) = self.target_type {
            let value = match target {
                TargetType::InBody => "inbody",
                TargetType::Zip => "zip",
            };
            settings = settings.insert("target_type", SettingValue::from(value));
        }
        Ok(settings)
    }
}

// ── Responses ────────────────────────────────────────────────────────────

/// `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /v1/clear/*`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearResponse {
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lifecycle of an asynchronous task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Started,
    Success,
    Failure,
    /// A status this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// True once the task will not change state again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }
}

/// Task handle returned by the async endpoints and by polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub task_status: TaskStatus,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub task_position: Option<u32>,
    #[serde(default)]
    pub task_meta: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-document conversion outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStatus {
    Pending,
    Started,
    Failure,
    Success,
    PartialSuccess,
    Skipped,
    #[serde(other)]
    Unknown,
}

/// An error reported for one component of the conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorItem {
    pub component_type: String,
    pub module_name: String,
    pub error_message: String,
}

/// The converted document in each requested format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportDocumentResponse {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub md_content: Option<String>,
    #[serde(default)]
    pub json_content: Option<Value>,
    #[serde(default)]
    pub html_content: Option<String>,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub doctags_content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of an in-body conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertDocumentResponse {
    pub document: ExportDocumentResponse,
    pub status: ConversionStatus,
    #[serde(default)]
    pub errors: Vec<ErrorItem>,
    #[serde(default)]
    pub processing_time: f64,
    #[serde(default)]
    pub timings: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of a conversion uploaded to a presigned URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresignedUrlConvertDocumentResponse {
    pub num_converted: u32,
    #[serde(default)]
    pub num_succeeded: u32,
    #[serde(default)]
    pub num_failed: u32,
    #[serde(default)]
    pub processing_time: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Either conversion result shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConvertResult {
    Document(Box<ConvertDocumentResponse>),
    Presigned(PresignedUrlConvertDocumentResponse),
}

/// One chunk of a chunked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkedDocumentResultItem {
    pub filename: String,
    pub chunk_index: u32,
    pub text: String,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub num_tokens: Option<u32>,
    #[serde(default)]
    pub headings: Option<Vec<String>>,
    #[serde(default)]
    pub captions: Option<Vec<String>>,
    #[serde(default)]
    pub doc_items: Vec<String>,
    #[serde(default)]
    pub page_numbers: Option<Vec<u32>>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Result of a chunking call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDocumentResponse {
    pub chunks: Vec<ChunkedDocumentResultItem>,
    /// Converted documents, present when `include_converted_doc` was set.
    #[serde(default)]
    pub documents: Vec<Value>,
    #[serde(default)]
    pub processing_time: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Whatever `GET /v1/result/{task_id}` returned, by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskResult {
    Chunk(ChunkDocumentResponse),
    Convert(ConvertResult),
}
