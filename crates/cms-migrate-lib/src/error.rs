//! Error types for `cms-migrate-lib`.

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for export/import operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    // === Backend Errors ===
    /// The backend project could not be loaded.
    #[error("Backend unavailable at {path}: {reason}")]
    BackendUnavailable { path: PathBuf, reason: String },

    /// Content type uid is not registered in the backend.
    #[error("Content type not found: {uid}")]
    ModelNotFound { uid: String },

    /// Entry with the specified id was not found.
    #[error("Entry not found: {uid} #{id}")]
    EntryNotFound { uid: String, id: String },

    /// Media record with the specified id was not found.
    #[error("Media not found: {id}")]
    MediaNotFound { id: String },

    /// Generic storage error.
    #[error("Storage error: {0}")]
    Storage(String),

    // === Validation Errors ===
    /// Payload violates a schema constraint.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Failed to parse a line in a JSONL data file.
    #[error("JSONL parse error at line {line}: {reason}")]
    JsonlParse { line: usize, reason: String },

    // === Selection Errors ===
    /// More than one export selector was given.
    #[error("Mutually exclusive selectors combined: {}", .selectors.join(", "))]
    ConflictingSelectors { selectors: Vec<String> },

    /// A filter pattern is not a valid regular expression.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // === Archive Errors ===
    /// Input path does not exist.
    #[error("Input path not found: {0}")]
    InputNotFound(PathBuf),

    /// No manifest could be resolved from the import source.
    #[error("data.json not found in {0}")]
    ManifestNotFound(PathBuf),

    /// Packing or unpacking an archive failed.
    #[error("Archive error: {0}")]
    Archive(String),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn archive(reason: impl std::fmt::Display) -> Self {
        Self::Archive(reason.to_string())
    }
}

/// Result type using `MigrateError`.
pub type Result<T> = std::result::Result<T, MigrateError>;
