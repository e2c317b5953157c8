pub mod operations;

pub use operations::{Precondition, SetOptions};
