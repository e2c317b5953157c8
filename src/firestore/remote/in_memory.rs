use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::firestore::api::operations::Precondition;
use crate::firestore::error::{
    already_exists, failed_precondition, not_found, FirestoreError, FirestoreResult,
};
use crate::firestore::model::{DocumentKey, Timestamp};
use crate::firestore::value::MapValue;

use super::datastore::{BatchWriteBackend, WriteOperation, WriteOutcome, WriteResult};

#[derive(Clone, Debug)]
struct StoredDocument {
    data: MapValue,
    update_time: Timestamp,
}

/// In-process backend applying writes to a `BTreeMap`, used by tests and
/// local experiments. Enforces create/update/delete preconditions the
/// way the live service does and stamps each applied write with a
/// commit time.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    documents: Arc<Mutex<BTreeMap<String, StoredDocument>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().unwrap().len()
    }

    pub fn document(&self, key: &DocumentKey) -> Option<MapValue> {
        self.documents
            .lock()
            .unwrap()
            .get(&key.canonical_string())
            .map(|doc| doc.data.clone())
    }

    fn apply(
        store: &mut BTreeMap<String, StoredDocument>,
        write: WriteOperation,
        commit_time: Timestamp,
    ) -> Result<(), FirestoreError> {
        match write {
            WriteOperation::Create { key, data } => {
                let canonical = key.canonical_string();
                if store.contains_key(&canonical) {
                    return Err(already_exists(format!(
                        "Document {canonical} already exists"
                    )));
                }
                store.insert(
                    canonical,
                    StoredDocument {
                        data,
                        update_time: commit_time,
                    },
                );
                Ok(())
            }
            WriteOperation::Set { key, data, mask } => {
                let canonical = key.canonical_string();
                let data = match mask {
                    Some(mask) => {
                        let mut fields = store
                            .get(&canonical)
                            .map(|existing| existing.data.clone())
                            .unwrap_or_default();
                        for field in mask {
                            if let Some(value) = data.get(&field) {
                                fields.insert(field, value.clone());
                            }
                        }
                        fields
                    }
                    None => data,
                };
                store.insert(
                    canonical,
                    StoredDocument {
                        data,
                        update_time: commit_time,
                    },
                );
                Ok(())
            }
            WriteOperation::Update {
                key,
                data,
                precondition,
            } => {
                let canonical = key.canonical_string();
                let current = store
                    .get(&canonical)
                    .ok_or_else(|| not_found(format!("Document {canonical} does not exist")))?;
                Self::check_precondition(&canonical, Some(current), &precondition)?;

                let mut fields = current.data.clone();
                for (field, value) in data.fields() {
                    fields.insert(field.clone(), value.clone());
                }
                store.insert(
                    canonical,
                    StoredDocument {
                        data: fields,
                        update_time: commit_time,
                    },
                );
                Ok(())
            }
            WriteOperation::Delete { key, precondition } => {
                let canonical = key.canonical_string();
                Self::check_precondition(&canonical, store.get(&canonical), &precondition)?;
                store.remove(&canonical);
                Ok(())
            }
        }
    }

    fn check_precondition(
        canonical: &str,
        current: Option<&StoredDocument>,
        precondition: &Precondition,
    ) -> Result<(), FirestoreError> {
        if let Some(required) = precondition.exists {
            if required != current.is_some() {
                return Err(failed_precondition(format!(
                    "Existence precondition failed for document {canonical}"
                )));
            }
        }
        if let Some(required_time) = precondition.update_time {
            match current {
                Some(doc) if doc.update_time == required_time => {}
                _ => {
                    return Err(failed_precondition(format!(
                        "Update-time precondition failed for document {canonical}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl BatchWriteBackend for InMemoryBackend {
    async fn batch_write(
        &self,
        writes: Vec<WriteOperation>,
    ) -> FirestoreResult<Vec<WriteOutcome>> {
        let commit_time = Timestamp::now();
        let mut store = self.documents.lock().unwrap();
        Ok(writes
            .into_iter()
            .map(|write| match Self::apply(&mut store, write, commit_time) {
                Ok(()) => WriteOutcome::Success(WriteResult::new(Some(commit_time))),
                Err(err) => WriteOutcome::Failure(err),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::value::FirestoreValue;

    fn doc(fields: &[(&str, i64)]) -> MapValue {
        let mut map = MapValue::default();
        for (name, value) in fields {
            map.insert(*name, FirestoreValue::from_integer(*value));
        }
        map
    }

    #[tokio::test]
    async fn create_fails_when_document_exists() {
        let backend = InMemoryBackend::new();
        let key = DocumentKey::from_string("cities/sf").unwrap();
        let first = WriteOperation::Create {
            key: key.clone(),
            data: doc(&[("population", 870_000)]),
        };
        let second = WriteOperation::Create {
            key,
            data: doc(&[("population", 1)]),
        };

        let outcomes = backend.batch_write(vec![first, second]).await.unwrap();
        assert!(matches!(outcomes[0], WriteOutcome::Success(_)));
        match &outcomes[1] {
            WriteOutcome::Failure(err) => {
                assert_eq!(err.code_str(), "firestore/already-exists")
            }
            _ => panic!("expected second create to fail"),
        }
    }

    #[tokio::test]
    async fn set_with_mask_merges_into_existing() {
        let backend = InMemoryBackend::new();
        let key = DocumentKey::from_string("cities/sf").unwrap();
        backend
            .batch_write(vec![WriteOperation::Set {
                key: key.clone(),
                data: doc(&[("population", 870_000), ("area", 121)]),
                mask: None,
            }])
            .await
            .unwrap();
        backend
            .batch_write(vec![WriteOperation::Set {
                key: key.clone(),
                data: doc(&[("population", 900_000)]),
                mask: Some(vec!["population".to_string()]),
            }])
            .await
            .unwrap();

        let stored = backend.document(&key).unwrap();
        assert_eq!(
            stored.get("population"),
            Some(&FirestoreValue::from_integer(900_000))
        );
        assert_eq!(stored.get("area"), Some(&FirestoreValue::from_integer(121)));
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let backend = InMemoryBackend::new();
        let key = DocumentKey::from_string("cities/sf").unwrap();
        let outcomes = backend
            .batch_write(vec![WriteOperation::Update {
                key,
                data: doc(&[("population", 1)]),
                precondition: Precondition::none(),
            }])
            .await
            .unwrap();
        match &outcomes[0] {
            WriteOutcome::Failure(err) => assert_eq!(err.code_str(), "firestore/not-found"),
            _ => panic!("expected update of missing document to fail"),
        }
    }

    #[tokio::test]
    async fn delete_precondition_checks_existence() {
        let backend = InMemoryBackend::new();
        let key = DocumentKey::from_string("cities/sf").unwrap();
        let outcomes = backend
            .batch_write(vec![WriteOperation::Delete {
                key,
                precondition: Precondition::exists(true),
            }])
            .await
            .unwrap();
        match &outcomes[0] {
            WriteOutcome::Failure(err) => {
                assert_eq!(err.code_str(), "firestore/failed-precondition")
            }
            _ => panic!("expected delete precondition to fail"),
        }
    }
}
