//! Normalization of schema-less store payloads into [`Metric`] trees.
//!
//! Every raw value is classified before it is used: mappings and sequences
//! become child nodes, anything else becomes a scalar field on the node
//! being built. Sequences are treated as mappings keyed by index, which is
//! how the store itself exposes them.

use serde_json::{Map, Value};

use crate::error::{MetricsError, Result};
use crate::model::{Metric, TITLE_KEY};

/// How a raw value participates in the tree.
enum Shape<'a> {
    Mapping(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Scalar,
}

impl<'a> Shape<'a> {
    fn of(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Shape::Mapping(map),
            Value::Array(items) => Shape::Sequence(items),
            _ => Shape::Scalar,
        }
    }
}

/// Normalize a raw payload into a tree rooted at a node named `id`.
///
/// Fails with [`MetricsError::DataShape`] only when `raw` itself is a scalar
/// (including `null`); nested data of any depth and key names is accepted.
pub fn normalize(id: &str, raw: &Value) -> Result<Metric> {
    match Shape::of(raw) {
        Shape::Mapping(map) => Ok(normalize_map(id, map)),
        Shape::Sequence(items) => Ok(normalize_sequence(id, items)),
        Shape::Scalar => Err(MetricsError::DataShape(id.to_string())),
    }
}

/// Normalize a mapping. Infallible, since a mapping is always a valid root.
pub fn normalize_map(id: &str, map: &Map<String, Value>) -> Metric {
    build(id, map.iter().map(|(key, value)| (key.clone(), value)))
}

fn normalize_sequence(id: &str, items: &[Value]) -> Metric {
    build(
        id,
        items
            .iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), value)),
    )
}

fn build<'a>(id: &str, entries: impl Iterator<Item = (String, &'a Value)>) -> Metric {
    let mut metric = Metric::new(id);

    for (key, value) in entries {
        match Shape::of(value) {
            Shape::Mapping(map) => metric.metrics.push(normalize_map(&key, map)),
            Shape::Sequence(items) => metric.metrics.push(normalize_sequence(&key, items)),
            Shape::Scalar => match value {
                Value::String(title) if key == TITLE_KEY => metric.title = Some(title.clone()),
                _ => {
                    metric.fields.insert(key, value.clone());
                }
            },
        }
    }

    metric
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Node-for-node comparison of ids, titles and scalar fields.
    fn assert_isomorphic(a: &Metric, b: &Metric) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.title, b.title);
        assert_eq!(a.fields, b.fields);
        assert_eq!(a.metrics.len(), b.metrics.len(), "children of '{}'", a.id);
        for (left, right) in a.metrics.iter().zip(&b.metrics) {
            assert_isomorphic(left, right);
        }
    }

    #[test]
    fn test_flat_mapping_is_a_leaf() {
        let metric = normalize("root", &json!({ "count": 3, "last": "2024-01-02" })).unwrap();

        assert_eq!(metric.id, "root");
        assert!(metric.is_leaf());
        assert_eq!(metric.field("count"), Some(&json!(3)));
        assert_eq!(metric.str_field("last"), Some("2024-01-02"));
    }

    #[test]
    fn test_nested_mappings_become_children_in_order() {
        let raw = json!({
            "nickname": "ada",
            "usage": { "count": 1 },
            "topic-01": {
                "title": "Topic One",
                "unit-1": { "title": "Unit One", "duration": 40 }
            },
            "calendar": { "2024-01-01": 3 }
        });

        let metric = normalize("root", &raw).unwrap();

        let ids: Vec<_> = metric.metrics.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["usage", "topic-01", "calendar"]);
        assert_eq!(metric.str_field("nickname"), Some("ada"));

        let topic = &metric.metrics[1];
        assert_eq!(topic.title.as_deref(), Some("Topic One"));
        assert!(topic.fields.is_empty());
        assert_eq!(topic.metrics[0].title.as_deref(), Some("Unit One"));
        assert_eq!(topic.metrics[0].count_field("duration"), Some(40));
    }

    #[test]
    fn test_mixed_node_keeps_fields_and_children() {
        let metric = normalize("lab", &json!({ "count": 2, "step-1": { "count": 1 } })).unwrap();

        assert_eq!(metric.count_field("count"), Some(2));
        assert_eq!(metric.metrics.len(), 1);
        assert_eq!(metric.metrics[0].id, "step-1");
    }

    #[test]
    fn test_non_string_title_stays_a_field() {
        let metric = normalize("node", &json!({ "title": 42 })).unwrap();

        assert_eq!(metric.title, None);
        assert_eq!(metric.field("title"), Some(&json!(42)));
    }

    #[test]
    fn test_sequences_are_keyed_by_index() {
        let metric = normalize("root", &json!({ "visits": [{ "count": 1 }, 5] })).unwrap();

        let visits = &metric.metrics[0];
        assert_eq!(visits.id, "visits");
        assert_eq!(visits.metrics[0].id, "0");
        assert_eq!(visits.field("1"), Some(&json!(5)));
    }

    #[test]
    fn test_scalar_root_is_rejected() {
        assert_eq!(
            normalize("root", &json!("offline")),
            Err(MetricsError::DataShape("root".to_string()))
        );
        assert_eq!(
            normalize("root", &Value::Null),
            Err(MetricsError::DataShape("root".to_string()))
        );
    }

    #[test]
    fn test_deep_nesting() {
        let mut raw = json!({ "count": 1 });
        for depth in 0..64 {
            raw = json!({ format!("level-{depth}"): raw });
        }

        let mut node = &normalize("root", &raw).unwrap();
        let mut levels = 0;
        while let Some(child) = node.metrics.first() {
            node = child;
            levels += 1;
        }
        assert_eq!(levels, 64);
        assert_eq!(node.count_field("count"), Some(1));
    }

    #[test]
    fn test_renormalizing_mapping_form_is_isomorphic() {
        let raw = json!({
            "email": "ada@example.com",
            "nickname": "ada",
            "onlineStatus": "online",
            "topic-01": {
                "title": "Topic One",
                "count": 4,
                "book-1": { "title": "Lab 1", "count": 2, "duration": 100 }
            },
            "calendar": { "2024-01-01": 3, "2024-01-02": 5 },
            "flag": true,
            "note": null
        });

        let first = normalize("root", &raw).unwrap();
        let second = normalize("root", &first.to_value()).unwrap();

        assert_isomorphic(&first, &second);
    }
}
