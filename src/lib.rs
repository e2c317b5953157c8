//! Client-side batching, rate limiting and retry scheduling for
//! high-throughput Firestore document writes.
//!
//! The [`firestore::bulk_writer::BulkWriter`] facade accepts
//! create/set/update/delete calls, groups them into bounded commit
//! batches, paces dispatch through a ramping rate limiter and retries
//! failed writes with quadratic backoff until they succeed or exhaust
//! their retry budget. The actual RPC is abstracted behind the
//! [`firestore::remote::BatchWriteBackend`] trait so the engine can be
//! driven against gRPC, REST or an in-process store.

pub mod firestore;
pub mod platform;

pub use firestore::bulk_writer::{
    BulkWriter, BulkWriterOptions, PendingWrite, MAX_BATCH_SIZE, MAX_RETRY_ATTEMPTS,
};
pub use firestore::error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use firestore::remote::{BatchWriteBackend, InMemoryBackend, WriteOutcome, WriteResult};
