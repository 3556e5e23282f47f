//! Core data types: manifest, media records and the content-type registry.
//!
//! Serde names follow the backend's camelCase JSON so that manifests and
//! registry files round-trip without translation.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::util::file_name_from_url;

/// Backend-assigned identifier: integer or string, never portable between instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    /// Read an id out of a JSON value. Empty strings and non-integral numbers are not ids.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) if !s.is_empty() => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    /// Read the id of a reference: either a bare id or an object carrying `id`.
    #[must_use]
    pub fn from_reference(value: &Value) -> Option<Self> {
        match value {
            Value::Object(obj) => obj.get("id").and_then(Self::from_value),
            other => Self::from_value(other),
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(n) => Value::from(*n),
            Self::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// A size variant of a media file (thumbnail, small, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFormat {
    pub url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Snapshot of an uploaded file's metadata.
///
/// Fields the reconciliation does not interpret (size, width, alternative
/// text, provider metadata, ...) are carried verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: RecordId,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    pub mime: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<BTreeMap<String, MediaFormat>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaRecord {
    /// Upload file name of the original file.
    #[must_use]
    pub fn file_name(&self) -> &str {
        file_name_from_url(&self.url)
    }

    /// Upload file names of every format variant.
    #[must_use]
    pub fn format_file_names(&self) -> Vec<&str> {
        self.formats
            .iter()
            .flat_map(BTreeMap::values)
            .map(|format| file_name_from_url(&format.url))
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Display name for log lines.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.file_name())
    }

    /// Serialize into a JSON object.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Entries grouped by content-type uid, in insertion order.
///
/// Serialized as a JSON object; key order is kept in both directions because
/// import processes types in manifest order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeEntries {
    groups: Vec<(String, Vec<Value>)>,
}

impl TypeEntries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entries of a type, replacing any previous group for the uid.
    pub fn insert(&mut self, uid: impl Into<String>, entries: Vec<Value>) {
        let uid = uid.into();
        if let Some(group) = self.groups.iter_mut().find(|(existing, _)| *existing == uid) {
            group.1 = entries;
        } else {
            self.groups.push((uid, entries));
        }
    }

    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&[Value]> {
        self.groups
            .iter()
            .find(|(existing, _)| existing == uid)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.groups
            .iter()
            .map(|(uid, entries)| (uid.as_str(), entries.as_slice()))
    }

    pub fn uids(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(uid, _)| uid.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of entries across all types.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|(_, entries)| entries.len()).sum()
    }
}

impl Serialize for TypeEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (uid, entries) in &self.groups {
            map.serialize_entry(uid, entries)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TypeEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TypeEntriesVisitor;

        impl<'de> Visitor<'de> for TypeEntriesVisitor {
            type Value = TypeEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of content-type uid to entry list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TypeEntries, A::Error> {
                let mut entries = TypeEntries::new();
                while let Some((uid, group)) = access.next_entry::<String, Vec<Value>>()? {
                    entries.insert(uid, group);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(TypeEntriesVisitor)
    }
}

/// The serialized export payload (`data.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub types: TypeEntries,
    #[serde(default)]
    pub media: Vec<MediaRecord>,
}

impl Manifest {
    #[must_use]
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(created_at),
            ..Self::default()
        }
    }
}

/// Singularity of a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ContentTypeKind {
    #[serde(rename = "singleType", alias = "single")]
    Single,
    #[default]
    #[serde(rename = "collectionType", alias = "collection")]
    Collection,
}

impl fmt::Display for ContentTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("singleType"),
            Self::Collection => f.write_str("collectionType"),
        }
    }
}

/// One attribute of a content-type or component schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default)]
    pub repeatable: bool,
}

impl Attribute {
    #[must_use]
    pub fn is_media(&self) -> bool {
        self.kind == "media"
    }

    /// Component uid when this attribute embeds a component.
    #[must_use]
    pub fn component_uid(&self) -> Option<&str> {
        if self.kind == "component" {
            self.component.as_deref()
        } else {
            None
        }
    }
}

/// Registered content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    pub uid: String,
    #[serde(default)]
    pub kind: ContentTypeKind,
    #[serde(default)]
    pub collection_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl TypeDescriptor {
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.kind == ContentTypeKind::Single
    }
}

/// Registered reusable component schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDescriptor {
    pub uid: String,
    #[serde(default)]
    pub collection_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

/// Schema registry of a backend project (`content-types.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    #[serde(default)]
    pub content_types: Vec<TypeDescriptor>,
    #[serde(default)]
    pub components: Vec<ComponentDescriptor>,
}

impl Registry {
    #[must_use]
    pub fn content_type(&self, uid: &str) -> Option<&TypeDescriptor> {
        self.content_types.iter().find(|t| t.uid == uid)
    }

    #[must_use]
    pub fn component(&self, uid: &str) -> Option<&ComponentDescriptor> {
        self.components.iter().find(|c| c.uid == uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_entries_keep_file_order() {
        let raw = r#"{"types": {"api::z.z": [], "api::a.a": [{"id": 1}], "api::m.m": []}}"#;
        let manifest: Manifest = serde_json::from_str(raw).unwrap();
        let uids: Vec<&str> = manifest.types.uids().collect();
        assert_eq!(uids, vec!["api::z.z", "api::a.a", "api::m.m"]);

        let out = serde_json::to_string(&manifest.types).unwrap();
        assert!(out.find("api::z.z").unwrap() < out.find("api::a.a").unwrap());
    }

    #[test]
    fn test_media_record_keeps_unknown_fields() {
        let record: MediaRecord = serde_json::from_value(json!({
            "id": 4,
            "hash": "cat_1a2b",
            "ext": ".png",
            "mime": "image/png",
            "url": "/uploads/cat_1a2b.png",
            "size": 12.5,
            "alternativeText": "a cat",
            "formats": {"thumbnail": {"url": "/uploads/thumbnail_cat_1a2b.png", "width": 64}}
        }))
        .unwrap();

        assert_eq!(record.id, RecordId::Int(4));
        assert_eq!(record.file_name(), "cat_1a2b.png");
        assert_eq!(record.format_file_names(), vec!["thumbnail_cat_1a2b.png"]);
        assert_eq!(record.extra["alternativeText"], json!("a cat"));

        let map = record.to_map();
        assert_eq!(map["size"], json!(12.5));
        assert_eq!(map["formats"]["thumbnail"]["width"], json!(64));
    }

    #[test]
    fn test_media_record_null_formats() {
        let record: MediaRecord = serde_json::from_value(json!({
            "id": "abc", "hash": "h", "mime": "text/plain", "url": "/uploads/h.txt", "formats": null
        }))
        .unwrap();
        assert_eq!(record.id, RecordId::from("abc"));
        assert!(record.format_file_names().is_empty());
    }

    #[test]
    fn test_record_id_from_value() {
        assert_eq!(RecordId::from_value(&json!(7)), Some(RecordId::Int(7)));
        assert_eq!(RecordId::from_value(&json!("k1")), Some(RecordId::from("k1")));
        assert_eq!(RecordId::from_value(&json!("")), None);
        assert_eq!(RecordId::from_value(&json!(1.5)), None);
        assert_eq!(
            RecordId::from_reference(&json!({"id": 3, "url": "/x"})),
            Some(RecordId::Int(3))
        );
    }

    #[test]
    fn test_kind_aliases() {
        let single: ContentTypeKind = serde_json::from_value(json!("single")).unwrap();
        let collection: ContentTypeKind = serde_json::from_value(json!("collectionType")).unwrap();
        assert_eq!(single, ContentTypeKind::Single);
        assert_eq!(collection, ContentTypeKind::Collection);
        assert_eq!(serde_json::to_value(single).unwrap(), json!("singleType"));
    }
}
