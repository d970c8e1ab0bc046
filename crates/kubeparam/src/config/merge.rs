//! Layering of mapping fields.

use serde_json::{Map, Value};

/// Field-by-field replace: every key in `overlay` replaces the one in `base`.
pub fn overlay(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut result = base.clone();
    for (key, value) in overlay {
        result.insert(key.clone(), value.clone());
    }
    result
}

/// Recursive merge: maps present on both sides are merged key by key, any
/// other value in `overlay` (scalars, lists, null) replaces the base value.
pub fn deep_merge(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut result = base.clone();
    for (key, value) in overlay {
        let merged = match (result.get(key), value) {
            (Some(Value::Object(left)), Value::Object(right)) => {
                Value::Object(deep_merge(left, right))
            }
            _ => value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected a map, got {other}"),
        }
    }

    #[test]
    fn test_overlay_replaces_whole_values() {
        let base = map(json!({"a": {"x": 1, "y": 2}, "b": 1}));
        let top = map(json!({"a": {"x": 3}}));
        assert_eq!(Value::Object(overlay(&base, &top)), json!({"a": {"x": 3}, "b": 1}));
    }

    #[test]
    fn test_deep_merge_keeps_nested_siblings() {
        let base = map(json!({"context": {"a": {"b": 1, "c": 2}}, "skip": false}));
        let top = map(json!({"context": {"a": {"b": 9}}, "skip": true}));
        assert_eq!(
            Value::Object(deep_merge(&base, &top)),
            json!({"context": {"a": {"b": 9, "c": 2}}, "skip": true})
        );
    }

    #[test]
    fn test_deep_merge_replaces_lists_and_nulls() {
        let base = map(json!({"included_projects": ["a", "b"], "active_templates": ["x"]}));
        let top = map(json!({"included_projects": ["c"], "active_templates": null}));
        assert_eq!(
            Value::Object(deep_merge(&base, &top)),
            json!({"included_projects": ["c"], "active_templates": null})
        );
    }

    #[test]
    fn test_deep_merge_preserves_key_order() {
        let base = map(json!({"resource_templates": {"one": "1", "two": "2"}}));
        let top = map(json!({"resource_templates": {"three": "3", "one": "uno"}}));
        let merged = deep_merge(&base, &top);
        let keys: Vec<&String> = merged["resource_templates"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["one", "two", "three"]);
    }
}
