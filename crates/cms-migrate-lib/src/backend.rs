//! The content backend an export reads from and an import writes to.

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::Result;
use crate::model::{ComponentDescriptor, MediaRecord, RecordId, TypeDescriptor};

/// Operations the reconciliation needs from a content-management backend.
///
/// Calls are blocking and made one at a time.
pub trait ContentBackend {
    /// Every registered content type.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn content_types(&self) -> Result<Vec<TypeDescriptor>>;

    /// Every registered component schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn components(&self) -> Result<Vec<ComponentDescriptor>>;

    /// Descriptor of one content type, `None` when the uid is not registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    fn content_type(&self, uid: &str) -> Result<Option<TypeDescriptor>> {
        Ok(self.content_types()?.into_iter().find(|t| t.uid == uid))
    }

    /// All entries of a type with media and components expanded.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` for unknown types, or a storage error.
    fn find_entries(&self, uid: &str) -> Result<Vec<Value>>;

    /// Create an entry and return it populated.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the payload violates the schema.
    fn create_entry(&mut self, uid: &str, data: Value) -> Result<Value>;

    /// Update the fields present in `data` on an existing entry.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` or `Validation`.
    fn update_entry(&mut self, uid: &str, id: &RecordId, data: Value) -> Result<Value>;

    /// Delete one entry.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if no entry has the id.
    fn delete_entry(&mut self, uid: &str, id: &RecordId) -> Result<()>;

    /// Media record with the given content hash.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the media store cannot be queried.
    fn find_media_by_hash(&self, hash: &str) -> Result<Option<MediaRecord>>;

    /// Create a media record; the backend assigns id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when required media fields are missing.
    fn create_media(&mut self, data: Map<String, Value>) -> Result<MediaRecord>;

    /// Delete one media record (the files are left to the caller).
    ///
    /// # Errors
    ///
    /// Returns `MediaNotFound` if no record has the id.
    fn delete_media(&mut self, id: &RecordId) -> Result<()>;

    /// Local directory holding uploaded files.
    fn upload_dir(&self) -> &Path;
}
