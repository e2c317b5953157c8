use std::collections::BTreeMap;

use crate::firestore::model::Timestamp;

/// A single Firestore field value.
///
/// Covers the value kinds document writes carry; write-time sentinels,
/// references and binary blobs live in the full SDK surface, not here.
#[derive(Clone, Debug, PartialEq)]
pub struct FirestoreValue {
    kind: ValueKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(Timestamp),
    String(String),
    Array(Vec<FirestoreValue>),
    Map(MapValue),
}

impl FirestoreValue {
    pub fn null() -> Self {
        Self {
            kind: ValueKind::Null,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            kind: ValueKind::Boolean(value),
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self {
            kind: ValueKind::Integer(value),
        }
    }

    pub fn from_double(value: f64) -> Self {
        Self {
            kind: ValueKind::Double(value),
        }
    }

    pub fn from_timestamp(value: Timestamp) -> Self {
        Self {
            kind: ValueKind::Timestamp(value),
        }
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::String(value.into()),
        }
    }

    pub fn from_array(values: Vec<FirestoreValue>) -> Self {
        Self {
            kind: ValueKind::Array(values),
        }
    }

    pub fn from_map(fields: BTreeMap<String, FirestoreValue>) -> Self {
        Self {
            kind: ValueKind::Map(MapValue::new(fields)),
        }
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }
}

/// An ordered map of named fields, the shape of a whole document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapValue {
    fields: BTreeMap<String, FirestoreValue>,
}

impl MapValue {
    pub fn new(fields: BTreeMap<String, FirestoreValue>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, FirestoreValue> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FirestoreValue> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FirestoreValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_basic_values() {
        let value = FirestoreValue::from_string("hello");
        match value.kind() {
            ValueKind::String(inner) => assert_eq!(inner, "hello"),
            _ => panic!("unexpected kind"),
        }
    }

    #[test]
    fn map_round_trips_fields() {
        let mut map = MapValue::default();
        map.insert("population", FirestoreValue::from_integer(870_000));
        assert_eq!(
            map.get("population"),
            Some(&FirestoreValue::from_integer(870_000))
        );
        assert!(!map.is_empty());
    }
}
