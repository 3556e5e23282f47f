//! Recursive rewrite over untyped JSON trees.
//!
//! Media discovery and media-reference remapping are the same walk with a
//! different substitution: objects accepted by the predicate are handed to
//! the substitution and never descended into; everything else is traversed.

use serde_json::{Map, Value};

/// Outcome for an object accepted by the predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Substitution {
    /// Put the object back unchanged.
    Keep(Map<String, Value>),
    /// Put another value in its place.
    Replace(Value),
    /// Drop it: removed from an enclosing array, `null` anywhere else.
    Remove,
}

/// Rewrite every object matching `predicate`, depth-first.
pub fn rewrite_matching<P, S>(value: Value, predicate: &P, substitute: &mut S) -> Value
where
    P: Fn(&Map<String, Value>) -> bool,
    S: FnMut(Map<String, Value>) -> Substitution,
{
    rewrite_node(value, predicate, substitute).unwrap_or(Value::Null)
}

fn rewrite_node<P, S>(value: Value, predicate: &P, substitute: &mut S) -> Option<Value>
where
    P: Fn(&Map<String, Value>) -> bool,
    S: FnMut(Map<String, Value>) -> Substitution,
{
    match value {
        Value::Object(map) if predicate(&map) => match substitute(map) {
            Substitution::Keep(map) => Some(Value::Object(map)),
            Substitution::Replace(replacement) => Some(replacement),
            Substitution::Remove => None,
        },
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                let child = rewrite_node(child, predicate, substitute).unwrap_or(Value::Null);
                out.insert(key, child);
            }
            Some(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(item) = rewrite_node(item, predicate, substitute) {
                    out.push(item);
                }
            }
            Some(Value::Array(out))
        }
        scalar => Some(scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_marked(map: &Map<String, Value>) -> bool {
        map.contains_key("mark")
    }

    #[test]
    fn test_replace_at_any_depth() {
        let input = json!({"a": {"b": [{"mark": 1}, {"c": {"mark": 2}}]}});
        let out = rewrite_matching(input, &is_marked, &mut |map| {
            Substitution::Replace(map["mark"].clone())
        });
        assert_eq!(out, json!({"a": {"b": [1, {"c": 2}]}}));
    }

    #[test]
    fn test_remove_in_array_and_field() {
        let input = json!({"one": {"mark": 1}, "many": [{"mark": 2}, 5, null]});
        let out = rewrite_matching(input, &is_marked, &mut |_| Substitution::Remove);
        assert_eq!(out, json!({"one": null, "many": [5, null]}));
    }

    #[test]
    fn test_matched_nodes_are_not_descended() {
        let input = json!([{"mark": 1, "inner": {"mark": 2}}]);
        let mut seen = Vec::new();
        let out = rewrite_matching(input.clone(), &is_marked, &mut |map| {
            seen.push(map["mark"].clone());
            Substitution::Keep(map)
        });
        assert_eq!(out, input);
        assert_eq!(seen, vec![json!(1)]);
    }

    #[test]
    fn test_removed_root_becomes_null() {
        let out = rewrite_matching(json!({"mark": true}), &is_marked, &mut |_| Substitution::Remove);
        assert_eq!(out, Value::Null);
    }
}
