use std::sync::Arc;

use crate::firestore::error::internal_error;
use crate::firestore::remote::{BatchWriteBackend, WriteOperation, WriteOutcome};

use super::operation::BulkWriterOperation;
use super::MAX_BATCH_SIZE;

/// A bounded group of operations dispatched to the backend in one call.
///
/// The i-th outcome the backend returns always resolves the i-th
/// operation that was pushed; that positional correspondence is the one
/// hard ordering guarantee the writer makes.
pub(crate) struct CommitBatch {
    backend: Arc<dyn BatchWriteBackend>,
    operations: Vec<BulkWriterOperation>,
}

impl CommitBatch {
    pub fn new(backend: Arc<dyn BatchWriteBackend>) -> Self {
        Self {
            backend,
            operations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn has_capacity(&self) -> bool {
        self.operations.len() < MAX_BATCH_SIZE
    }

    pub fn push(&mut self, operation: BulkWriterOperation) {
        debug_assert!(self.has_capacity(), "commit batch overfilled");
        self.operations.push(operation);
    }

    /// Sends the batch to the backend and applies each per-write outcome
    /// to its operation. A whole-call failure is treated as a failed
    /// attempt for every contained operation, so retry budgets keep
    /// advancing even when the transport is down.
    pub async fn commit(mut self) -> Vec<BulkWriterOperation> {
        let writes: Vec<WriteOperation> = self
            .operations
            .iter()
            .map(|operation| operation.write().clone())
            .collect();

        match self.backend.batch_write(writes).await {
            Ok(outcomes) => {
                for (index, operation) in self.operations.iter_mut().enumerate() {
                    match outcomes.get(index) {
                        Some(WriteOutcome::Success(result)) => operation.on_success(result.clone()),
                        Some(WriteOutcome::Failure(error)) => operation.on_failure(error.clone()),
                        None => operation.on_failure(internal_error(
                            "backend returned fewer outcomes than submitted writes",
                        )),
                    }
                }
            }
            Err(error) => {
                log::warn!(
                    "batch write of {} operations failed: {error}",
                    self.operations.len()
                );
                for operation in self.operations.iter_mut() {
                    operation.on_failure(error.clone());
                }
            }
        }

        self.operations
    }
}
