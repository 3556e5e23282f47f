//! Media discovery and media-id remapping.
//!
//! A media object is recognised by field presence, expressed as a
//! [`MediaShape`]. Export collects every record-shaped object once per id
//! ([`MediaIndex`]); import replaces every reference-shaped object with the
//! destination id recorded in an [`IdMap`].

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::model::{MediaRecord, RecordId};
use crate::tree::{Substitution, rewrite_matching};
use crate::util::is_present;

/// Named set of fields that must all be present for an object to count as media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaShape {
    pub name: &'static str,
    pub required: &'static [&'static str],
}

impl MediaShape {
    /// A full media record as the backend returns it.
    pub const RECORD: Self = Self {
        name: "record",
        required: &["id", "hash", "ext", "mime", "url"],
    };

    /// Enough of a media record to be rewritten into a destination id.
    pub const REFERENCE: Self = Self {
        name: "reference",
        required: &["id", "hash", "mime", "url"],
    };

    #[must_use]
    pub fn matches(&self, object: &Map<String, Value>) -> bool {
        self.required
            .iter()
            .all(|field| object.get(*field).is_some_and(is_present))
    }
}

/// Deduplicated media records discovered in content payloads.
///
/// The first occurrence of an id wins. Format variants stay inside their
/// parent record and are not indexed on their own.
#[derive(Debug, Default)]
pub struct MediaIndex {
    records: Vec<MediaRecord>,
    seen: HashSet<RecordId>,
}

impl MediaIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk `value`, indexing every media record in it, and hand it back unchanged.
    pub fn scan(&mut self, value: Value) -> Value {
        rewrite_matching(
            value,
            &|object| MediaShape::RECORD.matches(object),
            &mut |object| {
                self.absorb(&object);
                Substitution::Keep(object)
            },
        )
    }

    fn absorb(&mut self, object: &Map<String, Value>) {
        let Some(id) = object.get("id").and_then(RecordId::from_value) else {
            return;
        };
        if self.seen.contains(&id) {
            return;
        }
        match serde_json::from_value::<MediaRecord>(Value::Object(object.clone())) {
            Ok(record) => {
                debug!(id = %id, url = %record.url, "Found media");
                self.seen.insert(id);
                self.records.push(record);
            }
            Err(e) => warn!(id = %id, "Skipping malformed media object: {e}"),
        }
    }

    #[must_use]
    pub fn records(&self) -> &[MediaRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<MediaRecord> {
        self.records
    }
}

/// Collect the deduplicated media records of a payload.
#[must_use]
pub fn resolve_media(value: &Value) -> Vec<MediaRecord> {
    let mut index = MediaIndex::new();
    index.scan(value.clone());
    index.into_records()
}

/// Source media id -> destination media id, for one import run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdMap {
    ids: HashMap<RecordId, RecordId>,
}

impl IdMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old: RecordId, new: RecordId) {
        self.ids.insert(old, new);
    }

    #[must_use]
    pub fn get(&self, old: &RecordId) -> Option<&RecordId> {
        self.ids.get(old)
    }

    #[must_use]
    pub fn contains(&self, old: &RecordId) -> bool {
        self.ids.contains_key(old)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Replace every media reference in `value` with its destination id.
    ///
    /// Unmapped references become `null`, or disappear when they sit in an array.
    #[must_use]
    pub fn rewrite_references(&self, value: Value) -> Value {
        rewrite_matching(
            value,
            &|object| MediaShape::REFERENCE.matches(object),
            &mut |object| {
                let mapped = object
                    .get("id")
                    .and_then(RecordId::from_value)
                    .and_then(|old| self.get(&old));
                match mapped {
                    Some(new) => Substitution::Replace(new.to_value()),
                    None => Substitution::Remove,
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media(id: i64, hash: &str) -> Value {
        json!({
            "id": id,
            "hash": hash,
            "ext": ".png",
            "mime": "image/png",
            "url": format!("/uploads/{hash}.png"),
            "name": format!("{hash}.png")
        })
    }

    #[test]
    fn test_resolve_dedups_by_id() {
        let payload = json!([
            {"id": 1, "cover": media(9, "h1"), "gallery": [media(9, "h1"), media(10, "h2")]},
            {"id": 2, "blocks": [{"image": {"nested": media(10, "h2")}}]}
        ]);
        let found = resolve_media(&payload);
        let ids: Vec<RecordId> = found.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![RecordId::Int(9), RecordId::Int(10)]);
    }

    #[test]
    fn test_resolve_requires_every_field() {
        let mut partial = media(3, "h3");
        partial["ext"] = json!("");
        let payload = json!({"a": partial, "b": {"id": 4, "url": "/uploads/x.png"}});
        assert!(resolve_media(&payload).is_empty());
    }

    #[test]
    fn test_resolve_does_not_index_formats() {
        let mut record = media(5, "h5");
        record["formats"] = json!({"thumbnail": media(6, "thumb_h5")});
        let found = resolve_media(&json!({"cover": record}));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].format_file_names(), vec!["thumb_h5.png"]);
    }

    #[test]
    fn test_scan_returns_input() {
        let payload = json!({"cover": media(1, "h")});
        let mut index = MediaIndex::new();
        assert_eq!(index.scan(payload.clone()), payload);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rewrite_mapped_and_unmapped() {
        let mut ids = IdMap::new();
        ids.insert(RecordId::Int(9), RecordId::Int(101));

        let entry = json!({
            "title": "x",
            "cover": media(9, "h1"),
            "avatar": media(77, "gone"),
            "gallery": [media(9, "h1"), media(77, "gone")],
            "seo": {"image": media(77, "gone"), "keywords": ["a", null]}
        });

        let out = ids.rewrite_references(entry);
        assert_eq!(
            out,
            json!({
                "title": "x",
                "cover": 101,
                "avatar": null,
                "gallery": [101],
                "seo": {"image": null, "keywords": ["a", null]}
            })
        );
    }

    #[test]
    fn test_reference_shape_does_not_need_ext() {
        let mut ids = IdMap::new();
        ids.insert(RecordId::Int(9), RecordId::Int(1));
        let out = ids.rewrite_references(json!({
            "cover": {"id": 9, "hash": "h1", "mime": "image/png", "url": "/u/a.png"}
        }));
        assert_eq!(out, json!({"cover": 1}));
    }
}
