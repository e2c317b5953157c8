use std::collections::{BTreeMap, HashSet};

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::{DocumentKey, Timestamp};
use crate::firestore::remote::WriteOperation;
use crate::firestore::value::{FirestoreValue, MapValue};

/// Options that configure the behaviour of `set` writes.
///
/// `merge` folds the provided data into the existing document instead of
/// replacing it; `merge_fields` restricts the merge to an explicit list
/// of top-level field names and takes precedence over the `merge` flag.
#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    pub merge: bool,
    pub merge_fields: Option<Vec<String>>,
}

impl SetOptions {
    /// Builds set options that merge every field present in the provided data.
    pub fn merge_all() -> Self {
        Self {
            merge: true,
            merge_fields: None,
        }
    }

    /// Builds set options that merge only the named fields.
    pub fn merge_fields<I, S>(fields: I) -> FirestoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for field in fields {
            let field = field.into();
            if seen.insert(field.clone()) {
                unique.push(field);
            }
        }
        if unique.is_empty() {
            return Err(invalid_argument(
                "merge_fields requires at least one field name",
            ));
        }
        Ok(Self {
            merge: false,
            merge_fields: Some(unique),
        })
    }

    pub fn is_merge(&self) -> bool {
        self.merge || self.merge_fields.is_some()
    }
}

/// Server-checked condition a write must satisfy before it is applied.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Precondition {
    pub exists: Option<bool>,
    pub update_time: Option<Timestamp>,
}

impl Precondition {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn exists(exists: bool) -> Self {
        Self {
            exists: Some(exists),
            update_time: None,
        }
    }

    pub fn updated_at(update_time: Timestamp) -> Self {
        Self {
            exists: None,
            update_time: Some(update_time),
        }
    }

    pub fn is_none(&self) -> bool {
        self.exists.is_none() && self.update_time.is_none()
    }
}

/// Builds the wire-level write for a `create` call. Creates fail on the
/// server when the document already exists.
pub fn create_write(
    key: DocumentKey,
    data: BTreeMap<String, FirestoreValue>,
) -> WriteOperation {
    WriteOperation::Create {
        key,
        data: MapValue::new(data),
    }
}

/// Builds the wire-level write for a `set` call, validating any merge
/// mask against the provided data.
pub fn set_write(
    key: DocumentKey,
    data: BTreeMap<String, FirestoreValue>,
    options: &SetOptions,
) -> FirestoreResult<WriteOperation> {
    let mask = match &options.merge_fields {
        Some(fields) => {
            for field in fields {
                if !data.contains_key(field) {
                    return Err(invalid_argument(format!(
                        "merge_fields entry '{field}' is not present in the provided data"
                    )));
                }
            }
            Some(fields.clone())
        }
        None if options.merge => Some(data.keys().cloned().collect()),
        None => None,
    };
    Ok(WriteOperation::Set {
        key,
        data: MapValue::new(data),
        mask,
    })
}

/// Builds the wire-level write for an `update` call. Updates require the
/// document to exist unless the precondition says otherwise.
pub fn update_write(
    key: DocumentKey,
    data: BTreeMap<String, FirestoreValue>,
    precondition: Precondition,
) -> FirestoreResult<WriteOperation> {
    if data.is_empty() {
        return Err(invalid_argument("update requires at least one field"));
    }
    if precondition.exists == Some(false) {
        return Err(invalid_argument(
            "update cannot require the document to be absent",
        ));
    }
    Ok(WriteOperation::Update {
        key,
        data: MapValue::new(data),
        precondition,
    })
}

/// Builds the wire-level write for a `delete` call.
pub fn delete_write(key: DocumentKey, precondition: Precondition) -> WriteOperation {
    WriteOperation::Delete { key, precondition }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DocumentKey {
        DocumentKey::from_string("cities/sf").unwrap()
    }

    fn data() -> BTreeMap<String, FirestoreValue> {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), FirestoreValue::from_string("SF"));
        map
    }

    #[test]
    fn merge_fields_must_be_present_in_data() {
        let options = SetOptions::merge_fields(["population"]).unwrap();
        let err = set_write(key(), data(), &options).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[test]
    fn merge_fields_deduplicates_and_rejects_empty() {
        let options = SetOptions::merge_fields(["name", "name"]).unwrap();
        assert_eq!(options.merge_fields.as_deref(), Some(&["name".to_string()][..]));
        assert!(SetOptions::merge_fields(Vec::<String>::new()).is_err());
    }

    #[test]
    fn merge_all_masks_provided_fields() {
        let write = set_write(key(), data(), &SetOptions::merge_all()).unwrap();
        match write {
            WriteOperation::Set { mask, .. } => {
                assert_eq!(mask.as_deref(), Some(&["name".to_string()][..]))
            }
            _ => panic!("expected set write"),
        }
    }

    #[test]
    fn update_rejects_empty_data() {
        let err = update_write(key(), BTreeMap::new(), Precondition::none()).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[test]
    fn update_rejects_absence_precondition() {
        let err = update_write(key(), data(), Precondition::exists(false)).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }
}
