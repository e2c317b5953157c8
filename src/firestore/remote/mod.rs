pub mod datastore;
pub mod in_memory;

pub use datastore::{BatchWriteBackend, WriteOperation, WriteOutcome, WriteResult};
pub use in_memory::InMemoryBackend;
