//! File upload payload resolution.
//!
//! Turns an [`UploadRequest`] into the [`FilePart`] of a multipart body:
//! decodes or reads the content, picks a filename, and picks a MIME type.
//!
//! Filename precedence: explicit name, then the source's own filename,
//! then a name derived from the binary property, then a generic default.
//! MIME precedence: the source's declared type, then a lookup by
//! extension, then `application/octet-stream`.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use nodekit_core::error::{NodeError, NodeResult};
use nodekit_core::types::JsonObject;
use serde_json::Value;

use crate::operation::{UploadRequest, UploadSource};
use crate::request::FilePart;

/// Fallback MIME type when nothing better is known.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Filename used for base64 uploads with nothing else to go on.
const BASE64_DEFAULT_NAME: &str = "file.bin";

/// Stem used for binary uploads whose property name is empty.
const BINARY_DEFAULT_STEM: &str = "uploaded_file";

/// Resolve the file part of an upload.
pub fn resolve_file_part(upload: &UploadRequest) -> NodeResult<FilePart> {
    let explicit = upload.file_name.as_deref().filter(|n| !n.is_empty());

    match &upload.source {
        UploadSource::Binary { property, data } => {
            if data.data.is_empty() {
                return Err(NodeError::UploadSource(format!(
                    "Binary data in property '{property}' is missing or empty"
                )));
            }
            let bytes = decode_base64(&data.data)?;
            let file_name = explicit
                .map(str::to_string)
                .or_else(|| data.file_name.clone().filter(|n| !n.is_empty()))
                .unwrap_or_else(|| {
                    let stem = if property.is_empty() {
                        BINARY_DEFAULT_STEM
                    } else {
                        property.as_str()
                    };
                    format!("{stem}.bin")
                });
            let mime_type = data
                .mime_type
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| mime_for_file_name(&file_name).to_string());
            Ok(FilePart {
                file_name,
                mime_type,
                bytes,
            })
        }
        UploadSource::FilePath(path) => {
            if path.as_os_str().is_empty() {
                return Err(NodeError::UploadSource(
                    "File path is required for filepath upload".into(),
                ));
            }
            let bytes = std::fs::read(path).map_err(|e| {
                NodeError::UploadSource(format!("Cannot read file at {}: {e}", path.display()))
            })?;
            let file_name = explicit
                .map(str::to_string)
                .or_else(|| {
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                })
                .unwrap_or_else(|| BASE64_DEFAULT_NAME.to_string());
            let mime_type = mime_for_file_name(&file_name).to_string();
            Ok(FilePart {
                file_name,
                mime_type,
                bytes,
            })
        }
        UploadSource::Base64 { content, property } => {
            if content.is_empty() {
                return Err(NodeError::UploadSource(
                    "Base64 content is required for base64 upload".into(),
                ));
            }
            let bytes = decode_base64(content)?;
            let file_name = explicit
                .map(str::to_string)
                .or_else(|| {
                    property
                        .as_deref()
                        .filter(|p| extension(p).is_some())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| BASE64_DEFAULT_NAME.to_string());
            let mime_type = mime_for_file_name(&file_name).to_string();
            tracing::debug!(file_name = %file_name, mime_type = %mime_type, "Using provided base64 payload");
            Ok(FilePart {
                file_name,
                mime_type,
                bytes,
            })
        }
    }
}

/// Flatten upload metadata into multipart text fields.
///
/// Object and array values become JSON text since multipart fields are
/// flat strings; strings are sent as-is; `null` values are skipped.
pub fn metadata_fields(metadata: Option<&JsonObject>) -> Vec<(String, String)> {
    let Some(metadata) = metadata else {
        return Vec::new();
    };
    metadata
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect()
}

/// Guess a MIME type from a filename's extension.
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    let Some(ext) = extension(file_name) else {
        return DEFAULT_MIME_TYPE;
    };
    match ext.to_ascii_lowercase().as_str() {
        // Overrides where the common registries disagree.
        "mp4" | "mpg4" => "video/mp4",
        "wav" => "audio/wave",
        "rtf" => "text/rtf",
        "xml" => "text/xml",

        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/vnd.microsoft.icon",
        "tif" | "tiff" => "image/tiff",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "md" => "text/markdown",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => DEFAULT_MIME_TYPE,
    }
}

fn extension(file_name: &str) -> Option<&str> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
}

fn decode_base64(content: &str) -> NodeResult<Vec<u8>> {
    BASE64
        .decode(content.trim())
        .map_err(|e| NodeError::UploadSource(format!("Invalid Base64 string provided: {e}")))
}
