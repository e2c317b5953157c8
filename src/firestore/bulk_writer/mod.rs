//! High-throughput document writing.
//!
//! [`BulkWriter`] accepts individual create/set/update/delete calls and
//! turns them into bounded batch-write RPCs in the background: a
//! dispatch loop groups pending operations into batches of at most
//! [`MAX_BATCH_SIZE`], paces them through a ramping rate limiter, keeps
//! at most a configured number of batches in flight, and retries failed
//! writes with quadratic backoff until they succeed or exhaust
//! [`MAX_RETRY_ATTEMPTS`].
//!
//! Unlike an atomic `WriteBatch`, operations commit independently: one
//! failing write never affects its batch siblings.

mod commit_batch;
mod operation;
mod rate_limiter;
mod scheduler;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::firestore::api::operations::{self, Precondition, SetOptions};
use crate::firestore::error::FirestoreResult;
use crate::firestore::model::DocumentKey;
use crate::firestore::remote::BatchWriteBackend;
use crate::firestore::value::FirestoreValue;

pub use operation::PendingWrite;

use scheduler::Scheduler;

/// Most operations a single batch-write RPC may carry.
pub const MAX_BATCH_SIZE: usize = 20;

/// Attempts a single operation may consume before it fails terminally.
pub const MAX_RETRY_ATTEMPTS: u32 = 15;

/// Tuning knobs for a [`BulkWriter`].
#[derive(Clone, Debug)]
pub struct BulkWriterOptions {
    /// Upper bound on concurrently in-flight batch-write RPCs.
    pub max_in_flight_batches: usize,
    /// Time unit of the quadratic retry backoff (`attempts²` units).
    /// One second matches the backend's pacing expectations; tests
    /// shrink it to keep retry scenarios fast.
    pub retry_backoff_unit: Duration,
}

impl Default for BulkWriterOptions {
    fn default() -> Self {
        Self {
            max_in_flight_batches: 4,
            retry_backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Batches, paces and retries document writes against a
/// [`BatchWriteBackend`].
///
/// Each write call registers one pending operation and returns a
/// [`PendingWrite`] future resolving to the write's final outcome.
/// At most one operation may be pending per document at a time; a
/// second write to the same document must wait for the first to
/// resolve, or for an intervening [`flush`](BulkWriter::flush).
///
/// Writers should be [`close`](BulkWriter::close)d when done; an
/// unclosed writer keeps its background dispatch task alive.
#[derive(Clone)]
pub struct BulkWriter {
    scheduler: Arc<Scheduler>,
}

impl BulkWriter {
    pub fn new(backend: Arc<dyn BatchWriteBackend>) -> Self {
        Self::with_options(backend, BulkWriterOptions::default())
    }

    pub fn with_options(backend: Arc<dyn BatchWriteBackend>, options: BulkWriterOptions) -> Self {
        Self {
            scheduler: Scheduler::start(backend, &options),
        }
    }

    /// Enqueues a create; the write fails if the document already exists.
    pub async fn create(
        &self,
        path: &str,
        data: BTreeMap<String, FirestoreValue>,
    ) -> FirestoreResult<PendingWrite> {
        let key = DocumentKey::from_string(path)?;
        let write = operations::create_write(key.clone(), data);
        self.scheduler.enqueue(key, write).await
    }

    /// Enqueues a set, replacing the document or merging into it per
    /// `options`.
    pub async fn set(
        &self,
        path: &str,
        data: BTreeMap<String, FirestoreValue>,
        options: Option<SetOptions>,
    ) -> FirestoreResult<PendingWrite> {
        let key = DocumentKey::from_string(path)?;
        let write = operations::set_write(key.clone(), data, &options.unwrap_or_default())?;
        self.scheduler.enqueue(key, write).await
    }

    /// Enqueues an update of the named fields on an existing document.
    pub async fn update(
        &self,
        path: &str,
        data: BTreeMap<String, FirestoreValue>,
        precondition: Option<Precondition>,
    ) -> FirestoreResult<PendingWrite> {
        let key = DocumentKey::from_string(path)?;
        let write = operations::update_write(key.clone(), data, precondition.unwrap_or_default())?;
        self.scheduler.enqueue(key, write).await
    }

    /// Enqueues a delete.
    pub async fn delete(
        &self,
        path: &str,
        precondition: Option<Precondition>,
    ) -> FirestoreResult<PendingWrite> {
        let key = DocumentKey::from_string(path)?;
        let write = operations::delete_write(key.clone(), precondition.unwrap_or_default());
        self.scheduler.enqueue(key, write).await
    }

    /// Waits until every currently enqueued operation has resolved,
    /// then resumes accepting writes. While the flush runs, new writes
    /// are rejected.
    pub async fn flush(&self) -> FirestoreResult<()> {
        self.scheduler.flush().await
    }

    /// Drains all outstanding operations and permanently shuts the
    /// writer down. Further write calls fail; closing twice is a no-op.
    pub async fn close(&self) -> FirestoreResult<()> {
        self.scheduler.close().await
    }

    /// Operations enqueued but not yet resolved (buffered, awaiting
    /// retry or in flight).
    pub async fn pending_operation_count(&self) -> usize {
        self.scheduler.outstanding_operations().await
    }
}
