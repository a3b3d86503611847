//! Request body resolution
//!
//! Turns the stored `body` string of a request into what goes on the wire,
//! according to its `bodyType`, and adjusts the outgoing headers to match.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::variables::replace_variables;
use crate::errors::{OpenRequestError, Result};
use crate::mime::{get_content_type, OCTET_STREAM};
use crate::models::{BodyType, FieldType, FormField, HeaderMap, HttpRequest, VariableTable};

/// Content of the stand-in file sent when a form file was never chosen
pub const PLACEHOLDER_FILE_CONTENT: &str = "[File content not available]";

const CONTENT_TYPE: &str = "Content-Type";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A file picked for a multipart form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FileHandle {
    pub fn new(file_name: &str, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type
                .map(String::from)
                .or_else(|| get_content_type(file_name))
                .unwrap_or_else(|| OCTET_STREAM.to_string()),
            bytes,
        }
    }

    /// Read a file from disk, guessing its content type from the extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");
        Ok(Self::new(file_name, None, bytes))
    }

    /// Stand-in built from the field's stored metadata; `None` without a file name
    fn placeholder(field: &FormField) -> Option<Self> {
        let file_name = field.file_name.as_deref()?;
        Some(Self {
            file_name: file_name.to_string(),
            content_type: field
                .file_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| OCTET_STREAM.to_string()),
            bytes: PLACEHOLDER_FILE_CONTENT.as_bytes().to_vec(),
        })
    }

    fn into_part(self) -> Result<Part> {
        let content_type = if self.content_type.parse::<mime::Mime>().is_ok() {
            self.content_type
        } else {
            OCTET_STREAM.to_string()
        };
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&content_type)?)
    }
}

/// Files chosen in the form editor, keyed by field key and position.
///
/// Passed alongside the request it belongs to; the key of a field is
/// `{key}_{index}` where `index` is the field's position in the form.
#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    files: HashMap<String, FileHandle>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry_key(key: &str, index: usize) -> String {
        format!("{}_{}", key, index)
    }

    pub fn insert(&mut self, key: &str, index: usize, file: FileHandle) {
        self.files.insert(Self::registry_key(key, index), file);
    }

    pub fn get(&self, key: &str, index: usize) -> Option<&FileHandle> {
        self.files.get(&Self::registry_key(key, index))
    }

    pub fn remove(&mut self, key: &str, index: usize) -> Option<FileHandle> {
        self.files.remove(&Self::registry_key(key, index))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// One part of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartField {
    Text { key: String, value: String },
    File { key: String, file: FileHandle },
}

/// Body ready to be attached to the outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Sent verbatim (JSON, raw, url-encoded)
    Text(String),
    Multipart(Vec<MultipartField>),
}

impl RequestBody {
    /// Build the reqwest multipart form for a multipart body
    pub fn into_form(fields: Vec<MultipartField>) -> Result<Form> {
        let mut form = Form::new();
        for field in fields {
            form = match field {
                MultipartField::Text { key, value } => form.text(key, value),
                MultipartField::File { key, file } => form.part(key, file.into_part()?),
            };
        }
        Ok(form)
    }
}

/// Set a header, replacing any existing one whatever its case
pub fn set_header(headers: &mut HeaderMap, name: &str, value: &str) {
    remove_header(headers, name);
    headers.insert(name.to_string(), value.to_string());
}

/// Remove a header whatever its case
pub fn remove_header(headers: &mut HeaderMap, name: &str) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
}

/// Resolve the body of `request` and adjust `headers` for it.
///
/// Header changes apply whatever the method; the body itself is `None`
/// for GET and HEAD. An unparseable JSON body is an error only when it would
/// actually be sent.
pub fn resolve_body(
    request: &HttpRequest,
    variables: &VariableTable,
    headers: &mut HeaderMap,
    files: &FileRegistry,
) -> Result<Option<RequestBody>> {
    let sends_body = request.method.allows_body();

    let body = match request.body_type {
        BodyType::None => None,
        BodyType::Json => {
            let body = replace_variables(&request.body, variables);
            if body.is_empty() {
                None
            } else {
                set_header(headers, CONTENT_TYPE, "application/json");
                if sends_body && serde_json::from_str::<JsonValue>(&body).is_err() {
                    return Err(OpenRequestError::InvalidJsonBody);
                }
                Some(RequestBody::Text(body))
            }
        }
        BodyType::Raw => {
            let body = replace_variables(&request.body, variables);
            (!body.is_empty()).then_some(RequestBody::Text(body))
        }
        BodyType::Form => form_body(&request.body, variables, headers, files),
    };

    Ok(body.filter(|_| sends_body))
}

fn form_body(
    raw: &str,
    variables: &VariableTable,
    headers: &mut HeaderMap,
    files: &FileRegistry,
) -> Option<RequestBody> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Array(items)) => {
            match serde_json::from_value::<Vec<FormField>>(JsonValue::Array(items.clone())) {
                Ok(fields) => {
                    remove_header(headers, CONTENT_TYPE);
                    Some(RequestBody::Multipart(multipart_fields(&fields, variables, files)))
                }
                Err(e) => {
                    warn!(error = %e, "Malformed form fields, sending url-encoded text fields");
                    set_header(headers, CONTENT_TYPE, FORM_URLENCODED);
                    let encoded = urlencoded_text_fields(&items, variables);
                    (!encoded.is_empty()).then_some(RequestBody::Text(encoded))
                }
            }
        }
        Ok(_) => Some(RequestBody::Text(replace_variables(raw, variables))),
        Err(e) => {
            warn!(error = %e, "Form body is not JSON, sending it url-encoded as written");
            set_header(headers, CONTENT_TYPE, FORM_URLENCODED);
            Some(RequestBody::Text(replace_variables(raw, variables)))
        }
    }
}

fn multipart_fields(
    fields: &[FormField],
    variables: &VariableTable,
    files: &FileRegistry,
) -> Vec<MultipartField> {
    let mut parts = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        if !field.enabled || field.key.is_empty() {
            continue;
        }
        match field.field_type {
            FieldType::Text => parts.push(MultipartField::Text {
                key: field.key.clone(),
                value: replace_variables(&field.value, variables),
            }),
            FieldType::File => {
                let file = files
                    .get(&field.key, index)
                    .cloned()
                    .or_else(|| FileHandle::placeholder(field));
                match file {
                    Some(file) => parts.push(MultipartField::File {
                        key: field.key.clone(),
                        file,
                    }),
                    None => debug!(field = %field.key, "File field has no file, skipping"),
                }
            }
        }
    }

    parts
}

/// `key=value` pairs of the enabled text fields, read leniently
fn urlencoded_text_fields(items: &[JsonValue], variables: &VariableTable) -> String {
    items
        .iter()
        .filter(|item| item.get("enabled").and_then(JsonValue::as_bool).unwrap_or(false))
        .filter(|item| item.get("type").and_then(JsonValue::as_str) == Some("text"))
        .filter_map(|item| {
            let key = item.get("key").and_then(JsonValue::as_str).filter(|k| !k.is_empty())?;
            let value = item.get("value").and_then(JsonValue::as_str).unwrap_or("");
            Some(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&replace_variables(value, variables))
            ))
        })
        .collect::<Vec<_>>()
        .join("&")
}
