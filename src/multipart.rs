//! Hand-rolled `multipart/form-data` decoder for upload request bodies.
//!
//! The browser client posts receipts and billing slips as classic form
//! uploads; this module turns one raw body into a map of named fields.
//! Framing anomalies inside the body (headerless segments, unnamed parts)
//! are dropped silently, matching what lenient form parsers do. Only a
//! malformed outer envelope (wrong content type, no boundary, empty body)
//! is an error.

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum MultipartError {
    NotMultipart,
    MissingBoundary,
    EmptyBody,
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::NotMultipart => {
                write!(f, "content type is not multipart/form-data")
            }
            MultipartError::MissingBoundary => {
                write!(f, "content type is missing the boundary parameter")
            }
            MultipartError::EmptyBody => write!(f, "request body is empty"),
        }
    }
}

/// One decoded form field, either plain text or an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Text(String),
    File(FilePart),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FormField {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormField::Text(value) => Some(value),
            FormField::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FilePart> {
        match self {
            FormField::File(part) => Some(part),
            FormField::Text(_) => None,
        }
    }
}

/// Decodes a multipart body into its named fields.
///
/// Duplicate field names collapse to the last occurrence.
pub fn parse(
    body: &[u8],
    content_type: &str,
) -> Result<HashMap<String, FormField>, MultipartError> {
    if !content_type.trim_start().starts_with("multipart/form-data") {
        return Err(MultipartError::NotMultipart);
    }
    let boundary =
        header_param(content_type, "boundary").ok_or(MultipartError::MissingBoundary)?;
    if body.is_empty() {
        return Err(MultipartError::EmptyBody);
    }

    let delimiter = format!("--{boundary}").into_bytes();
    let segments = split_on(body, &delimiter);

    let mut fields = HashMap::new();
    // The first segment precedes the opening boundary and the last follows
    // the terminal `--boundary--` marker; neither is a real part.
    if segments.len() < 3 {
        return Ok(fields);
    }
    for segment in &segments[1..segments.len() - 1] {
        if let Some((name, field)) = parse_part(segment) {
            fields.insert(name, field);
        }
    }
    Ok(fields)
}

/// Extracts a `;`-separated `key=value` parameter from a header value,
/// stripping surrounding quotes. Keys match case-insensitively.
fn header_param(value: &str, key: &str) -> Option<String> {
    for param in value.split(';') {
        let param = param.trim();
        let (param_key, param_value) = match param.split_once('=') {
            Some(pair) => pair,
            None => continue,
        };
        if !param_key.trim().eq_ignore_ascii_case(key) {
            continue;
        }
        let param_value = param_value.trim();
        let stripped = param_value
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(param_value);
        return Some(stripped.to_string());
    }
    None
}

/// Splits `haystack` on every non-overlapping occurrence of `needle`.
fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        if &haystack[i..i + needle.len()] == needle {
            parts.push(&haystack[start..i]);
            i += needle.len();
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(&haystack[start..]);
    parts
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Decodes one boundary-delimited segment into a named field.
///
/// Returns `None` for segments with no header/body separator and for parts
/// whose `Content-Disposition` carries no `name` parameter.
fn parse_part(segment: &[u8]) -> Option<(String, FormField)> {
    let separator = find(segment, b"\r\n\r\n")?;
    let header_block = &segment[..separator];
    let mut content = &segment[separator + 4..];
    if content.ends_with(b"\r\n") {
        content = &content[..content.len() - 2];
    }

    let headers = parse_part_headers(header_block);
    let disposition = headers.get("content-disposition")?;
    let name = header_param(disposition, "name")?;

    let field = match header_param(disposition, "filename") {
        Some(filename) => FormField::File(FilePart {
            filename,
            content_type: headers
                .get("content-type")
                .cloned()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            data: content.to_vec(),
        }),
        None => FormField::Text(String::from_utf8_lossy(content).into_owned()),
    };
    Some((name, field))
}

/// Parses per-part header lines into lowercase-keyed `name: value` pairs.
fn parse_part_headers(block: &[u8]) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    let text = String::from_utf8_lossy(block);
    for line in text.split("\r\n") {
        let (key, value) = match line.split_once(':') {
            Some(pair) => pair,
            None => continue,
        };
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    headers
}
