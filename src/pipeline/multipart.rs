//! Multipart encoding: files + flat settings → [`MultipartForm`].
//!
//! The file endpoints take one or more uploads under a fixed field name plus
//! the conversion options as ordinary form fields. Settings are flattened with
//! fixed rules so the service's form parser sees what it expects:
//!
//! * absent / `null` values are skipped entirely
//! * lists become one field per item, same key, order preserved
//! * nested objects become a single field holding their JSON text
//! * dates become ISO-8601 strings with millisecond precision (`...000Z`)
//!
//! The form is plain data. The transport decides the boundary and the
//! `Content-Type` header when it puts the form on the wire.

use crate::error::DoclingError;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ── Inputs ───────────────────────────────────────────────────────────────

/// Raw file content with the type and name it already carries, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPayload {
    data: Bytes,
    content_type: Option<String>,
    name: Option<String>,
}

impl BinaryPayload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
            name: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl From<Bytes> for BinaryPayload {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for BinaryPayload {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&'static [u8]> for BinaryPayload {
    fn from(data: &'static [u8]) -> Self {
        Self::new(data)
    }
}

/// One file to upload: a payload plus optional filename / content-type
/// overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInput {
    pub data: BinaryPayload,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl FileInput {
    pub fn new(data: impl Into<BinaryPayload>) -> Self {
        Self {
            data: data.into(),
            filename: None,
            content_type: None,
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a file from disk. The payload is named after the file and typed
    /// from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, DoclingError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await.map_err(|source| DoclingError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut payload = BinaryPayload::new(data);
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            payload = payload.with_name(name);
        }
        if let Some(mime) = mime_guess::from_path(path).first() {
            payload = payload.with_content_type(mime.essence_str());
        }
        debug!("Loaded file input {} ({} bytes)", path.display(), payload.data.len());
        Ok(Self::new(payload))
    }
}

impl From<BinaryPayload> for FileInput {
    fn from(data: BinaryPayload) -> Self {
        Self::new(data)
    }
}

impl From<Bytes> for FileInput {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for FileInput {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

// ── Settings ─────────────────────────────────────────────────────────────

/// A settings value before form flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    Date(DateTime<Utc>),
    List(Vec<SettingValue>),
    Object(Map<String, Value>),
}

impl From<Value> for SettingValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SettingValue::Null,
            Value::Bool(b) => SettingValue::Bool(b),
            Value::Number(n) => SettingValue::Number(n),
            Value::String(s) => SettingValue::Text(s),
            Value::Array(items) => {
                SettingValue::List(items.into_iter().map(SettingValue::from).collect())
            }
            Value::Object(map) => SettingValue::Object(map),
        }
    }
}

impl From<DateTime<Utc>> for SettingValue {
    fn from(value: DateTime<Utc>) -> Self {
        SettingValue::Date(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Number(value.into())
    }
}

/// NaN and infinities have no JSON number form and become
/// [`SettingValue::Null`], so the setting is left out of the form.
impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        serde_json::Number::from_f64(value)
            .map(SettingValue::Number)
            .unwrap_or(SettingValue::Null)
    }
}

impl<T: Into<SettingValue>> From<Vec<T>> for SettingValue {
    fn from(items: Vec<T>) -> Self {
        SettingValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<SettingValue>> From<Option<T>> for SettingValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SettingValue::Null)
    }
}

/// Ordered option name → value mapping sent next to the files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    entries: Vec<(String, SettingValue)>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Keys are not deduplicated; order is kept.
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Flatten a serializable struct or map. Fields keep their declaration
    /// order; `Option::None` fields that serialize as `null` are dropped
    /// later during encoding.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, DoclingError> {
        let value = serde_json::to_value(value).map_err(|e| {
            DoclingError::invalid_input(format!("settings could not be serialized: {e}"))
        })?;
        match value {
            Value::Object(map) => Ok(Self {
                entries: map
                    .into_iter()
                    .map(|(key, value)| (key, SettingValue::from(value)))
                    .collect(),
            }),
            Value::Null => Ok(Self::default()),
            other => Err(DoclingError::invalid_input(format!(
                "settings must serialize to an object, got {other}"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ── Output ───────────────────────────────────────────────────────────────

/// One field of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    File {
        name: String,
        filename: String,
        content_type: String,
        data: Bytes,
    },
    Text {
        name: String,
        value: String,
    },
}

impl FormPart {
    pub fn name(&self) -> &str {
        match self {
            FormPart::File { name, .. } | FormPart::Text { name, .. } => name,
        }
    }
}

/// A multipart/form-data body as an ordered list of parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<FormPart> {
        self.parts
    }

    /// Text values of every field named `name`, in order.
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }
}

// ── Encoder ──────────────────────────────────────────────────────────────

/// Build a multipart body with every file under `file_field`, followed by
/// the flattened settings.
///
/// Fails with [`DoclingError::InvalidInput`] when `files` is empty.
pub fn encode_multipart(
    file_field: &str,
    files: Vec<FileInput>,
    settings: Option<&Settings>,
) -> Result<MultipartForm, DoclingError> {
    if files.is_empty() {
        return Err(DoclingError::invalid_input(
            "At least one file must be provided",
        ));
    }

    let file_count = files.len();
    let mut form = MultipartForm::new();
    for (index, input) in files.into_iter().enumerate() {
        let (filename, content_type, data) = resolve_file(input, index);
        form = form.file(file_field, filename, content_type, data);
    }

    if let Some(settings) = settings {
        for (key, value) in settings.iter() {
            append_setting(&mut form, key, value);
        }
    }

    debug!(
        "Encoded multipart body: {} file(s), {} field(s)",
        file_count,
        form.parts.len() - file_count
    );
    Ok(form)
}

/// Filename and content type for one upload. Explicit overrides win over the
/// payload's own metadata; unnamed payloads get `file-<n>` (1-based).
fn resolve_file(input: FileInput, index: usize) -> (String, String, Bytes) {
    let FileInput {
        data,
        filename,
        content_type,
    } = input;

    let content_type = content_type
        .or(data.content_type)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    let filename = filename
        .or(data.name)
        .unwrap_or_else(|| format!("file-{}", index + 1));

    (filename, content_type, data.data)
}

fn append_setting(form: &mut MultipartForm, key: &str, value: &SettingValue) {
    let text = match value {
        SettingValue::Null => return,
        SettingValue::List(items) => {
            for item in items {
                append_setting(form, key, item);
            }
            return;
        }
        SettingValue::Bool(b) => b.to_string(),
        SettingValue::Number(n) => n.to_string(),
        SettingValue::Text(s) => s.clone(),
        SettingValue::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
        SettingValue::Object(map) => Value::Object(map.clone()).to_string(),
    };
    form.parts.push(FormPart::Text {
        name: key.to_string(),
        value: text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn pdf() -> FileInput {
        FileInput::new(b"%PDF-1.7".to_vec())
    }

    #[test]
    fn empty_file_list_is_rejected() {
        let err = encode_multipart("files", vec![], None).unwrap_err();
        assert!(matches!(err, DoclingError::InvalidInput { .. }));
    }

    #[test]
    fn files_come_first_in_input_order() {
        let files = vec![
            pdf().filename("a.pdf"),
            FileInput::new(BinaryPayload::new(b"x".to_vec()).with_name("b.docx")),
            pdf(),
        ];
        let settings = Settings::new().insert("do_ocr", true);
        let form = encode_multipart("files", files, Some(&settings)).unwrap();

        let names: Vec<_> = form
            .parts()
            .iter()
            .map(|p| match p {
                FormPart::File { filename, .. } => format!("file:{filename}"),
                FormPart::Text { name, .. } => format!("text:{name}"),
            })
            .collect();
        assert_eq!(
            names,
            vec!["file:a.pdf", "file:b.docx", "file:file-3", "text:do_ocr"]
        );
    }

    #[test]
    fn content_type_override_wins_over_payload_type() {
        let payload = BinaryPayload::new(b"x".to_vec()).with_content_type("text/plain");
        let form = encode_multipart(
            "files",
            vec![FileInput::new(payload).content_type("text/markdown")],
            None,
        )
        .unwrap();
        match &form.parts()[0] {
            FormPart::File { content_type, .. } => assert_eq!(content_type, "text/markdown"),
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn untyped_payload_defaults_to_octet_stream() {
        let form = encode_multipart("files", vec![pdf()], None).unwrap();
        match &form.parts()[0] {
            FormPart::File {
                content_type, name, ..
            } => {
                assert_eq!(content_type, "application/octet-stream");
                assert_eq!(name, "files");
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn settings_follow_flattening_rules() {
        let date = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let settings = Settings::new()
            .insert("to_formats", vec!["md", "json"])
            .insert("ocr_lang", SettingValue::Null)
            .insert("images_scale", 2.0)
            .insert("page_range", vec![1i64, 4])
            .insert("since", date)
            .insert(
                "picture_description_api",
                SettingValue::from(json!({"url": "http://vlm", "timeout": 20})),
            );
        let form = encode_multipart("files", vec![pdf()], Some(&settings)).unwrap();

        assert_eq!(form.values("to_formats"), vec!["md", "json"]);
        assert!(form.values("ocr_lang").is_empty());
        assert_eq!(form.values("images_scale"), vec!["2.0"]);
        assert_eq!(form.values("page_range"), vec!["1", "4"]);
        assert_eq!(form.values("since"), vec!["2024-05-06T07:08:09.000Z"]);
        assert_eq!(
            form.values("picture_description_api"),
            vec![r#"{"url":"http://vlm","timeout":20}"#]
        );
        // one file + 2 + 1 + 2 + 1 + 1 text fields
        assert_eq!(form.parts().len(), 8);
    }

    #[test]
    fn non_finite_floats_are_left_out() {
        let settings = Settings::new()
            .insert("images_scale", f64::NAN)
            .insert("document_timeout", f64::INFINITY)
            .insert("do_ocr", true);
        let form = encode_multipart("files", vec![pdf()], Some(&settings)).unwrap();

        assert!(form.values("images_scale").is_empty());
        assert!(form.values("document_timeout").is_empty());
        assert_eq!(form.values("do_ocr"), vec!["true"]);
    }

    #[test]
    fn integral_floats_keep_their_fraction() {
        let settings = Settings::new().insert("images_scale", 2.0).insert("page", 2i64);
        let form = encode_multipart("files", vec![pdf()], Some(&settings)).unwrap();

        assert_eq!(form.values("images_scale"), vec!["2.0"]);
        assert_eq!(form.values("page"), vec!["2"]);
    }

    #[test]
    fn settings_from_struct_keep_field_order() {
        #[derive(Serialize)]
        struct Opts {
            zeta: bool,
            alpha: Option<String>,
            middle: Vec<&'static str>,
        }
        let settings = Settings::from_serialize(&Opts {
            zeta: false,
            alpha: None,
            middle: vec!["a", "b"],
        })
        .unwrap();
        let form = encode_multipart("files", vec![pdf()], Some(&settings)).unwrap();
        let keys: Vec<_> = form.parts()[1..].iter().map(FormPart::name).collect();
        assert_eq!(keys, vec!["zeta", "middle", "middle"]);
    }

    #[test]
    fn non_object_settings_are_rejected() {
        let err = Settings::from_serialize(&vec![1, 2]).unwrap_err();
        assert!(matches!(err, DoclingError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn from_path_names_and_types_the_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let input = FileInput::from_path(&path).await.unwrap();
        assert_eq!(input.data.name(), Some("report.pdf"));
        assert_eq!(input.data.content_type(), Some("application/pdf"));
        assert_eq!(input.data.data().as_ref(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn from_path_reports_missing_file() {
        let err = FileInput::from_path("/definitely/not/here.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, DoclingError::Io { .. }));
    }
}
