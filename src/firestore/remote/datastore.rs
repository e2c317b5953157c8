use std::sync::Arc;

use async_trait::async_trait;

use crate::firestore::api::operations::Precondition;
use crate::firestore::error::{FirestoreError, FirestoreResult};
use crate::firestore::model::{DocumentKey, Timestamp};
use crate::firestore::value::MapValue;

/// One wire-level write against one document.
#[derive(Clone, Debug)]
pub enum WriteOperation {
    Create {
        key: DocumentKey,
        data: MapValue,
    },
    Set {
        key: DocumentKey,
        data: MapValue,
        mask: Option<Vec<String>>,
    },
    Update {
        key: DocumentKey,
        data: MapValue,
        precondition: Precondition,
    },
    Delete {
        key: DocumentKey,
        precondition: Precondition,
    },
}

impl WriteOperation {
    pub fn key(&self) -> &DocumentKey {
        match self {
            WriteOperation::Create { key, .. }
            | WriteOperation::Set { key, .. }
            | WriteOperation::Update { key, .. }
            | WriteOperation::Delete { key, .. } => key,
        }
    }
}

/// Acknowledgement of a single applied write.
#[derive(Clone, Debug)]
pub struct WriteResult {
    /// Commit time the backend assigned to the write, when it reports one.
    pub update_time: Option<Timestamp>,
}

impl WriteResult {
    pub fn new(update_time: Option<Timestamp>) -> Self {
        Self { update_time }
    }
}

/// Per-write result of a batch write call, positionally aligned with the
/// submitted writes.
#[derive(Clone, Debug)]
pub enum WriteOutcome {
    Success(WriteResult),
    Failure(FirestoreError),
}

/// The transport collaborator: applies a group of writes in one RPC.
///
/// The returned vector must contain exactly one outcome per submitted
/// write, in submission order. An `Err` return means the whole call
/// failed (network outage, auth rejection) before any per-write status
/// was produced.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait BatchWriteBackend: Send + Sync + 'static {
    async fn batch_write(
        &self,
        writes: Vec<WriteOperation>,
    ) -> FirestoreResult<Vec<WriteOutcome>>;
}

pub type BatchWriteBackendArc = Arc<dyn BatchWriteBackend>;
