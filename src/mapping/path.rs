//! Dotted-path access into nested JSON objects (`fields.assignee.name`).

use serde_json::{Map, Value};

/// Value at `path`, or `None` when any segment is missing or crosses a non-object
pub fn get_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at `path`, creating intermediate objects.
///
/// Non-object intermediates (and a non-object root) are replaced by objects.
pub fn set_path(document: &mut Value, path: &str, value: Value) {
    let mut map = match std::mem::take(document) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    insert_path(&mut map, path, value);
    *document = Value::Object(map);
}

fn insert_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map.entry(head.to_string()).or_insert(Value::Null);
            set_path(child, rest, value);
        }
    }
}

/// `value` rendered as plain text: strings unquoted, null empty, everything else as JSON
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path_walks_nested_objects() {
        let doc = json!({"fields": {"summary": "Fix login", "assignee": {"name": "sam"}}});
        assert_eq!(get_path(&doc, "fields.summary"), Some(&json!("Fix login")));
        assert_eq!(get_path(&doc, "fields.assignee.name"), Some(&json!("sam")));
        assert_eq!(get_path(&doc, "fields.missing"), None);
    }

    #[test]
    fn test_get_path_stops_at_non_objects() {
        let doc = json!({"fields": {"labels": ["a", "b"], "summary": "x"}});
        assert_eq!(get_path(&doc, "fields.labels.0"), None);
        assert_eq!(get_path(&doc, "fields.summary.len"), None);
        assert_eq!(get_path(&json!("scalar"), "a"), None);
    }

    #[test]
    fn test_set_path_creates_intermediates() {
        let mut doc = json!({});
        set_path(&mut doc, "fields.status.name", json!("Done"));
        set_path(&mut doc, "fields.summary", json!("Title"));
        assert_eq!(doc, json!({"fields": {"status": {"name": "Done"}, "summary": "Title"}}));
    }

    #[test]
    fn test_set_path_replaces_scalar_intermediate() {
        let mut doc = json!({"fields": "oops"});
        set_path(&mut doc, "fields.summary", json!("Title"));
        assert_eq!(doc, json!({"fields": {"summary": "Title"}}));
    }

    #[test]
    fn test_set_path_replaces_scalar_root() {
        let mut doc = json!(["not", "an", "object"]);
        set_path(&mut doc, "key", json!("PROJ-1"));
        assert_eq!(doc, json!({"key": "PROJ-1"}));

        let mut doc = Value::Null;
        set_path(&mut doc, "fields.status.name", json!("Done"));
        assert_eq!(doc, json!({"fields": {"status": {"name": "Done"}}}));
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&json!("High")), "High");
        assert_eq!(stringify(&json!(3)), "3");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&Value::Null), "");
    }
}
