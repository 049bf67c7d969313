//! Turning JSON rows into facts.
//!
//! Each row becomes one entity `<type>:<id>`, where `id` is the row's `id`
//! field (string or number) or its index. Scalars become facts, nested
//! objects become dotted attributes (`author.name`), and arrays become one
//! fact per element under the same attribute. The reserved `type` fact is
//! added for every row.

use delve_store::{Atom, Fact, TYPE_ATTRIBUTE};
use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, Result};

/// Flatten `rows` into facts for entities of `entity_type`.
pub fn flatten_rows(rows: &[Value], entity_type: &str) -> Result<Vec<Fact>> {
    let mut facts = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        facts.extend(flatten_row(row, entity_type, index)?);
    }
    debug!(rows = rows.len(), facts = facts.len(), entity_type, "rows flattened");
    Ok(facts)
}

/// Flatten one row. `index` names the entity when the row has no usable `id`.
pub fn flatten_row(row: &Value, entity_type: &str, index: usize) -> Result<Vec<Fact>> {
    let Value::Object(fields) = row else {
        return Err(EngineError::InvalidRow { index });
    };

    let local_id = match fields.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => index.to_string(),
    };
    let entity = format!("{}:{}", entity_type, local_id);

    let mut facts = vec![Fact::type_of(&entity, entity_type)];
    for (key, value) in fields {
        if key == TYPE_ATTRIBUTE {
            continue;
        }
        flatten_value(&entity, key, value, &mut facts);
    }
    Ok(facts)
}

fn flatten_value(entity: &str, attribute: &str, value: &Value, facts: &mut Vec<Fact>) {
    match value {
        Value::Object(fields) => {
            for (key, nested) in fields {
                flatten_value(entity, &format!("{}.{}", attribute, key), nested, facts);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_value(entity, attribute, item, facts);
            }
        }
        scalar => {
            if let Some(atom) = Atom::from_json(scalar) {
                facts.push(Fact::new(entity, attribute, atom));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn triples(facts: &[Fact]) -> Vec<(String, String, String)> {
        facts
            .iter()
            .map(|f| (f.entity.clone(), f.attribute.clone(), f.value.canonical()))
            .collect()
    }

    #[test]
    fn test_flatten_row_shapes() {
        let row = json!({
            "id": 7,
            "title": "Hello",
            "author": { "name": "ann", "karma": 3 },
            "tags": ["rust", "db"],
            "draft": null
        });
        let facts = flatten_row(&row, "post", 0).unwrap();
        let mut got = triples(&facts);
        got.sort();
        let mut expected = vec![
            ("post:7", "type", "s:post"),
            ("post:7", "id", "n:7"),
            ("post:7", "title", "s:Hello"),
            ("post:7", "author.name", "s:ann"),
            ("post:7", "author.karma", "n:3"),
            ("post:7", "tags", "s:rust"),
            ("post:7", "tags", "s:db"),
            ("post:7", "draft", "null"),
        ]
        .into_iter()
        .map(|(e, a, v)| (e.to_string(), a.to_string(), v.to_string()))
        .collect::<Vec<_>>();
        expected.sort();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_row_index_names_entity_without_id() {
        let facts = flatten_rows(&[json!({"a": 1}), json!({"a": 2})], "item").unwrap();
        assert!(facts.iter().any(|f| f.entity == "item:1"));
    }

    #[test]
    fn test_row_type_field_is_ignored() {
        let facts = flatten_row(&json!({"type": "other"}), "post", 0).unwrap();
        assert_eq!(facts, vec![Fact::type_of("post:0", "post")]);
    }

    #[test]
    fn test_non_object_row_rejected() {
        let err = flatten_rows(&[json!({"a": 1}), json!(3)], "item").unwrap_err();
        assert!(matches!(err, EngineError::InvalidRow { index: 1 }));
    }
}
