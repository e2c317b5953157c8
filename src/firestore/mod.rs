pub mod api;
pub mod bulk_writer;
pub mod error;
pub mod model;
pub mod remote;
pub mod value;

pub use bulk_writer::{BulkWriter, BulkWriterOptions, PendingWrite};
pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use model::{DocumentKey, ResourcePath, Timestamp};
pub use value::{FirestoreValue, MapValue, ValueKind};
