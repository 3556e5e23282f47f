//! File-backed content backend.
//!
//! A project directory holds the schema registry, one JSONL file per
//! content type, a JSONL media store and the upload directory:
//!
//! ```text
//! <project>/content-types.json
//! <project>/data/<uid>.jsonl
//! <project>/data/media.jsonl
//! <project>/public/uploads/
//! ```
//!
//! Stored entries keep media attributes as ids; reads populate them into
//! full media records. Every successful write is persisted immediately.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};

use crate::backend::ContentBackend;
use crate::error::{MigrateError, Result};
use crate::jsonl;
use crate::model::{Attribute, ComponentDescriptor, MediaRecord, RecordId, Registry, TypeDescriptor};
use crate::util::{sanitize_uid, timestamp};

pub const REGISTRY_FILE: &str = "content-types.json";
pub const DATA_DIR: &str = "data";
pub const MEDIA_FILE: &str = "media.jsonl";
pub const DEFAULT_UPLOADS_DIR: &str = "public/uploads";

const MAX_COMPONENT_DEPTH: usize = 16;

/// Content backend stored as JSON files under a project directory.
pub struct LocalBackend {
    root: PathBuf,
    upload_dir: PathBuf,
    registry: Registry,
    entries: HashMap<String, Vec<Map<String, Value>>>,
    media: Vec<MediaRecord>,
}

impl LocalBackend {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open a project with the default upload directory.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the registry is missing or invalid.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        Self::open_with_uploads(root, root.join(DEFAULT_UPLOADS_DIR))
    }

    /// Open a project with an explicit upload directory.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the registry is missing or invalid,
    /// or a parse error if a data file is corrupt.
    pub fn open_with_uploads(root: impl AsRef<Path>, upload_dir: impl Into<PathBuf>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let registry_path = root.join(REGISTRY_FILE);

        let raw = fs::read_to_string(&registry_path).map_err(|e| MigrateError::BackendUnavailable {
            path: root.clone(),
            reason: format!("cannot read {REGISTRY_FILE}: {e}"),
        })?;
        let registry: Registry =
            serde_json::from_str(&raw).map_err(|e| MigrateError::BackendUnavailable {
                path: root.clone(),
                reason: format!("invalid {REGISTRY_FILE}: {e}"),
            })?;

        let mut entries = HashMap::new();
        for descriptor in &registry.content_types {
            let path = entries_path(&root, &descriptor.uid);
            let stored = jsonl::load(&path)?
                .into_iter()
                .filter_map(|record| match record {
                    Value::Object(map) => Some(map),
                    other => {
                        tracing::warn!(uid = %descriptor.uid, "Ignoring non-object record: {other}");
                        None
                    }
                })
                .collect();
            entries.insert(descriptor.uid.clone(), stored);
        }

        let media = jsonl::load(&root.join(DATA_DIR).join(MEDIA_FILE))?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<MediaRecord>, _>>()?;

        tracing::debug!(
            root = %root.display(),
            types = registry.content_types.len(),
            media = media.len(),
            "Loaded backend"
        );

        Ok(Self {
            root,
            upload_dir: upload_dir.into(),
            registry,
            entries,
            media,
        })
    }

    /// Initialize a new project directory with the given registry.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directories or registry file cannot be written.
    pub fn create(root: impl AsRef<Path>, registry: &Registry) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root.join(DATA_DIR))?;
        fs::create_dir_all(root.join(DEFAULT_UPLOADS_DIR))?;
        fs::write(
            root.join(REGISTRY_FILE),
            serde_json::to_string_pretty(registry)?,
        )?;
        Self::open(root)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// All media records, in creation order.
    #[must_use]
    pub fn media(&self) -> &[MediaRecord] {
        &self.media
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    fn persist_entries(&self, uid: &str) -> Result<()> {
        let records: Vec<Value> = self
            .entries
            .get(uid)
            .map(|stored| stored.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default();
        jsonl::save(&entries_path(&self.root, uid), &records)
    }

    fn persist_media(&self) -> Result<()> {
        let records = self
            .media
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        jsonl::save(&self.root.join(DATA_DIR).join(MEDIA_FILE), &records)
    }

    fn descriptor(&self, uid: &str) -> Result<&TypeDescriptor> {
        self.registry
            .content_type(uid)
            .ok_or_else(|| MigrateError::ModelNotFound {
                uid: uid.to_string(),
            })
    }

    // ========================================================================
    // Population
    // ========================================================================

    fn populate(
        &self,
        attributes: &BTreeMap<String, Attribute>,
        mut object: Map<String, Value>,
        depth: usize,
    ) -> Map<String, Value> {
        if depth > MAX_COMPONENT_DEPTH {
            return object;
        }
        for (name, attribute) in attributes {
            let Some(value) = object.remove(name) else {
                continue;
            };
            let populated = if attribute.is_media() {
                self.populate_media(value)
            } else if let Some(component) = attribute.component_uid() {
                self.populate_component(component, value, depth)
            } else {
                value
            };
            object.insert(name.clone(), populated);
        }
        object
    }

    fn populate_media(&self, value: Value) -> Value {
        match value {
            Value::Array(ids) => Value::Array(
                ids.iter()
                    .filter_map(|id| self.media_value(id))
                    .collect(),
            ),
            Value::Null => Value::Null,
            single => self.media_value(&single).unwrap_or(Value::Null),
        }
    }

    fn media_value(&self, reference: &Value) -> Option<Value> {
        let id = RecordId::from_reference(reference)?;
        let record = self.media.iter().find(|m| m.id == id)?;
        serde_json::to_value(record).ok()
    }

    fn populate_component(&self, component: &str, value: Value, depth: usize) -> Value {
        let Some(schema) = self.registry.component(component) else {
            return value;
        };
        match value {
            Value::Object(object) => Value::Object(self.populate(&schema.attributes, object, depth + 1)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(object) => {
                            Value::Object(self.populate(&schema.attributes, object, depth + 1))
                        }
                        other => other,
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check `data` against the schema and turn media references into ids.
    ///
    /// With `partial`, missing attributes are not required (updates).
    fn normalize(
        &self,
        attributes: &BTreeMap<String, Attribute>,
        mut data: Map<String, Value>,
        partial: bool,
        depth: usize,
    ) -> Result<Map<String, Value>> {
        if depth > MAX_COMPONENT_DEPTH {
            return Err(MigrateError::validation("component", "nesting too deep"));
        }
        for (name, attribute) in attributes {
            let value = data.remove(name);
            let missing = value.as_ref().is_none_or(Value::is_null);
            if attribute.required && missing && !(partial && value.is_none()) {
                return Err(MigrateError::validation(name, "is required"));
            }
            let Some(value) = value else {
                continue;
            };

            let normalized = if value.is_null() {
                Value::Null
            } else if attribute.is_media() {
                self.normalize_media(name, attribute.multiple, &value)?
            } else if let Some(component) = attribute.component_uid() {
                self.normalize_component(name, component, attribute.repeatable, value, depth)?
            } else {
                value
            };
            data.insert(name.clone(), normalized);
        }
        Ok(data)
    }

    fn normalize_media(&self, field: &str, multiple: bool, value: &Value) -> Result<Value> {
        if multiple {
            let Value::Array(items) = value else {
                return Err(MigrateError::validation(field, "expected an array of media"));
            };
            let ids = items
                .iter()
                .map(|item| self.existing_media_id(field, item))
                .collect::<Result<Vec<Value>>>()?;
            Ok(Value::Array(ids))
        } else {
            self.existing_media_id(field, value)
        }
    }

    fn existing_media_id(&self, field: &str, reference: &Value) -> Result<Value> {
        let id = RecordId::from_reference(reference)
            .ok_or_else(|| MigrateError::validation(field, format!("invalid media reference {reference}")))?;
        if self.media.iter().any(|m| m.id == id) {
            Ok(id.to_value())
        } else {
            Err(MigrateError::validation(field, format!("unknown media id {id}")))
        }
    }

    fn normalize_component(
        &self,
        field: &str,
        component: &str,
        repeatable: bool,
        value: Value,
        depth: usize,
    ) -> Result<Value> {
        let schema = self
            .registry
            .component(component)
            .ok_or_else(|| MigrateError::validation(field, format!("unknown component {component}")))?;

        let normalize_one = |item: Value| -> Result<Value> {
            match item {
                Value::Object(object) => Ok(Value::Object(self.normalize(
                    &schema.attributes,
                    object,
                    false,
                    depth + 1,
                )?)),
                _ => Err(MigrateError::validation(field, "expected a component object")),
            }
        };

        if repeatable {
            let Value::Array(items) = value else {
                return Err(MigrateError::validation(field, "expected an array of components"));
            };
            Ok(Value::Array(
                items
                    .into_iter()
                    .map(normalize_one)
                    .collect::<Result<Vec<Value>>>()?,
            ))
        } else {
            normalize_one(value)
        }
    }
}

impl ContentBackend for LocalBackend {
    fn content_types(&self) -> Result<Vec<TypeDescriptor>> {
        Ok(self.registry.content_types.clone())
    }

    fn components(&self) -> Result<Vec<ComponentDescriptor>> {
        Ok(self.registry.components.clone())
    }

    fn content_type(&self, uid: &str) -> Result<Option<TypeDescriptor>> {
        Ok(self.registry.content_type(uid).cloned())
    }

    fn find_entries(&self, uid: &str) -> Result<Vec<Value>> {
        let descriptor = self.descriptor(uid)?;
        let stored = self.entries.get(uid).map(Vec::as_slice).unwrap_or_default();
        Ok(stored
            .iter()
            .map(|entry| Value::Object(self.populate(&descriptor.attributes, entry.clone(), 0)))
            .collect())
    }

    fn create_entry(&mut self, uid: &str, data: Value) -> Result<Value> {
        let descriptor = self.descriptor(uid)?;
        let Value::Object(data) = data else {
            return Err(MigrateError::validation("data", "expected an object"));
        };
        let mut entry = self.normalize(&descriptor.attributes, data, false, 0)?;
        let attributes = descriptor.attributes.clone();

        let stored = self.entries.entry(uid.to_string()).or_default();
        let id = next_int_id(stored.iter().filter_map(|e| e.get("id").and_then(Value::as_i64)));
        let now = timestamp(Utc::now());
        entry.insert("id".to_string(), Value::from(id));
        entry.insert("createdAt".to_string(), Value::from(now.clone()));
        entry.insert("updatedAt".to_string(), Value::from(now.clone()));
        entry.insert("publishedAt".to_string(), Value::from(now));
        stored.push(entry.clone());

        self.persist_entries(uid)?;
        Ok(Value::Object(self.populate(&attributes, entry, 0)))
    }

    fn update_entry(&mut self, uid: &str, id: &RecordId, data: Value) -> Result<Value> {
        let descriptor = self.descriptor(uid)?;
        let Value::Object(data) = data else {
            return Err(MigrateError::validation("data", "expected an object"));
        };
        let changes = self.normalize(&descriptor.attributes, data, true, 0)?;
        let attributes = descriptor.attributes.clone();

        let stored = self.entries.entry(uid.to_string()).or_default();
        let entry = stored
            .iter_mut()
            .find(|e| e.get("id").and_then(RecordId::from_value).as_ref() == Some(id))
            .ok_or_else(|| MigrateError::EntryNotFound {
                uid: uid.to_string(),
                id: id.to_string(),
            })?;
        for (key, value) in changes {
            if key != "id" && key != "createdAt" {
                entry.insert(key, value);
            }
        }
        entry.insert("updatedAt".to_string(), Value::from(timestamp(Utc::now())));
        let updated = entry.clone();

        self.persist_entries(uid)?;
        Ok(Value::Object(self.populate(&attributes, updated, 0)))
    }

    fn delete_entry(&mut self, uid: &str, id: &RecordId) -> Result<()> {
        self.descriptor(uid)?;
        let stored = self.entries.entry(uid.to_string()).or_default();
        let before = stored.len();
        stored.retain(|e| e.get("id").and_then(RecordId::from_value).as_ref() != Some(id));
        if stored.len() == before {
            return Err(MigrateError::EntryNotFound {
                uid: uid.to_string(),
                id: id.to_string(),
            });
        }
        self.persist_entries(uid)
    }

    fn find_media_by_hash(&self, hash: &str) -> Result<Option<MediaRecord>> {
        Ok(self.media.iter().find(|m| m.hash == hash).cloned())
    }

    fn create_media(&mut self, mut data: Map<String, Value>) -> Result<MediaRecord> {
        let id = next_int_id(self.media.iter().filter_map(|m| match m.id {
            RecordId::Int(n) => Some(n),
            RecordId::Str(_) => None,
        }));
        let now = timestamp(Utc::now());
        data.insert("id".to_string(), Value::from(id));
        data.insert("createdAt".to_string(), Value::from(now.clone()));
        data.insert("updatedAt".to_string(), Value::from(now));

        let record: MediaRecord = serde_json::from_value(Value::Object(data))
            .map_err(|e| MigrateError::validation("media", e.to_string()))?;
        self.media.push(record.clone());
        self.persist_media()?;
        Ok(record)
    }

    fn delete_media(&mut self, id: &RecordId) -> Result<()> {
        let before = self.media.len();
        self.media.retain(|m| &m.id != id);
        if self.media.len() == before {
            return Err(MigrateError::MediaNotFound { id: id.to_string() });
        }
        self.persist_media()
    }

    fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }
}

fn entries_path(root: &Path, uid: &str) -> PathBuf {
    root.join(DATA_DIR).join(format!("{}.jsonl", sanitize_uid(uid)))
}

/// One past the largest integer id.
fn next_int_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0) + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentTypeKind;
    use serde_json::json;

    fn registry() -> Registry {
        serde_json::from_value(json!({
            "contentTypes": [
                {
                    "uid": "api::article.article",
                    "kind": "collectionType",
                    "collectionName": "articles",
                    "attributes": {
                        "title": {"type": "string", "required": true},
                        "cover": {"type": "media"},
                        "gallery": {"type": "media", "multiple": true},
                        "seo": {"type": "component", "component": "shared.seo"}
                    }
                },
                {"uid": "api::home.home", "kind": "singleType", "collectionName": "homes"}
            ],
            "components": [
                {
                    "uid": "shared.seo",
                    "collectionName": "components_shared_seos",
                    "attributes": {"image": {"type": "media"}}
                }
            ]
        }))
        .unwrap()
    }

    fn media_data(hash: &str) -> Map<String, Value> {
        json!({
            "hash": hash,
            "ext": ".png",
            "mime": "image/png",
            "url": format!("/uploads/{hash}.png"),
            "name": format!("{hash}.png")
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_open_missing_registry() {
        let dir = tempfile::tempdir().unwrap();
        let result = LocalBackend::open(dir.path());
        assert!(matches!(result, Err(MigrateError::BackendUnavailable { .. })));
    }

    #[test]
    fn test_create_and_populate() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::create(dir.path(), &registry()).unwrap();
        let media = backend.create_media(media_data("h1")).unwrap();
        assert_eq!(media.id, RecordId::Int(1));

        let created = backend
            .create_entry(
                "api::article.article",
                json!({"title": "Hello", "cover": 1, "gallery": [1], "seo": {"image": 1}}),
            )
            .unwrap();
        assert_eq!(created["id"], json!(1));
        assert_eq!(created["cover"]["hash"], json!("h1"));
        assert_eq!(created["gallery"][0]["url"], json!("/uploads/h1.png"));
        assert_eq!(created["seo"]["image"]["id"], json!(1));

        // Reopen from disk
        let reopened = LocalBackend::open(dir.path()).unwrap();
        let entries = reopened.find_entries("api::article.article").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["cover"]["mime"], json!("image/png"));
        assert_eq!(reopened.media().len(), 1);
    }

    #[test]
    fn test_create_rejects_unknown_media_and_missing_required() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::create(dir.path(), &registry()).unwrap();

        let missing_title = backend.create_entry("api::article.article", json!({"cover": null}));
        assert!(matches!(missing_title, Err(MigrateError::Validation { ref field, .. }) if field == "title"));

        let bad_media = backend.create_entry("api::article.article", json!({"title": "x", "cover": 42}));
        assert!(matches!(bad_media, Err(MigrateError::Validation { ref field, .. }) if field == "cover"));

        assert!(backend.find_entries("api::article.article").unwrap().is_empty());
    }

    #[test]
    fn test_update_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::create(dir.path(), &registry()).unwrap();
        let created = backend.create_entry("api::home.home", json!({"headline": "a"})).unwrap();

        let updated = backend
            .update_entry("api::home.home", &RecordId::Int(1), json!({"headline": "b", "id": 99}))
            .unwrap();
        assert_eq!(updated["id"], json!(1));
        assert_eq!(updated["headline"], json!("b"));
        assert_eq!(updated["createdAt"], created["createdAt"]);
        assert_eq!(
            backend.registry().content_type("api::home.home").unwrap().kind,
            ContentTypeKind::Single
        );
    }

    #[test]
    fn test_unknown_type_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = LocalBackend::create(dir.path(), &registry()).unwrap();
        assert!(matches!(
            backend.find_entries("api::nope.nope"),
            Err(MigrateError::ModelNotFound { .. })
        ));

        backend.create_entry("api::home.home", json!({})).unwrap();
        backend.delete_entry("api::home.home", &RecordId::Int(1)).unwrap();
        assert!(matches!(
            backend.delete_entry("api::home.home", &RecordId::Int(1)),
            Err(MigrateError::EntryNotFound { .. })
        ));

        let media = backend.create_media(media_data("h2")).unwrap();
        assert!(backend.find_media_by_hash("h2").unwrap().is_some());
        backend.delete_media(&media.id).unwrap();
        assert!(backend.find_media_by_hash("h2").unwrap().is_none());
    }

    #[test]
    fn test_dangling_media_id_populates_as_null() {
        let dir = tempfile::tempdir().unwrap();
        LocalBackend::create(dir.path(), &registry()).unwrap();
        fs::write(
            dir.path().join(DATA_DIR).join("api__article.article.jsonl"),
            "{\"id\": 1, \"title\": \"t\", \"cover\": 5, \"gallery\": [5]}\n",
        )
        .unwrap();

        let backend = LocalBackend::open(dir.path()).unwrap();
        let entries = backend.find_entries("api::article.article").unwrap();
        assert_eq!(entries[0]["cover"], Value::Null);
        assert_eq!(entries[0]["gallery"], json!([]));
    }
}
