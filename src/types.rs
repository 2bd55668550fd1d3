//! Core types for the entity store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute value. `Value::Null` is the absent value.
pub type Value = serde_json::Value;

/// Attribute name to value mapping, used for inserts and updates.
pub type AttributeMap = BTreeMap<String, Value>;

/// Unique identifier for a persisted object (assigned by the backend).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A handle to one object of an entity, carrying a snapshot of its attributes.
///
/// The snapshot reflects the context at the time the record was produced by
/// an insert or fetch, and is refreshed by `RecordStore::update`.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    /// Object identifier within the container.
    pub id: ObjectId,

    /// Entity this object belongs to.
    pub entity: String,

    /// Declared attributes and their values.
    pub attributes: AttributeMap,
}

impl Record {
    /// Get an attribute value. Returns `None` for undeclared keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Whether the attribute is declared but holds no value.
    pub fn is_null(&self, key: &str) -> bool {
        matches!(self.attributes.get(key), Some(Value::Null))
    }
}

/// Build an `AttributeMap` from key/value pairs.
pub fn attributes<K, V, I>(pairs: I) -> AttributeMap
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes_builder() {
        let map = attributes([("title", json!("buy milk")), ("done", json!(false))]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["title"], json!("buy milk"));
    }

    #[test]
    fn test_record_null_check() {
        let record = Record {
            id: ObjectId(1),
            entity: "Task".into(),
            attributes: attributes([("title", Value::Null), ("done", json!(true))]),
        };
        assert!(record.is_null("title"));
        assert!(!record.is_null("done"));
        assert!(!record.is_null("missing"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId(42).to_string(), "42");
        assert_eq!(format!("{:?}", ObjectId(42)), "ObjectId(42)");
    }
}
