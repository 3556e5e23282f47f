//! Path, timestamp and hashing helpers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;

/// Fields every backend assigns per instance; never carried into a create payload.
pub const MEDIA_INSTANCE_FIELDS: &[&str] = &[
    "id",
    "documentId",
    "createdAt",
    "updatedAt",
    "created_by",
    "updated_by",
    "createdBy",
    "updatedBy",
];

/// Instance fields of entries; publish state is reset on import.
pub const ENTRY_INSTANCE_FIELDS: &[&str] = &[
    "id",
    "documentId",
    "createdAt",
    "updatedAt",
    "publishedAt",
    "created_by",
    "updated_by",
    "createdBy",
    "updatedBy",
];

/// Last path segment of a media URL, without query or fragment.
#[must_use]
pub fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

/// Directory stamp for an export: RFC 3339 with `:` and `.` turned into `-`.
#[must_use]
pub fn export_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// RFC 3339 timestamp as stored by the file-backed backend.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// File-system safe name for a content-type uid (`api::post.post` -> `api__post.post`).
#[must_use]
pub fn sanitize_uid(uid: &str) -> String {
    uid.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// JavaScript-style truthiness: null, false, "" and 0 are absent.
#[must_use]
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

/// Remove the given keys from an object.
pub fn strip_fields(map: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        map.remove(*field);
    }
}

/// SHA-256 of a file, hex encoded.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
