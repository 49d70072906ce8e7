//! Storage traits and in-memory implementations

mod memory;
mod traits;

pub use memory::{MemoryCacheStore, MemoryProgressStore};
pub use traits::{CacheStore, ProgressStore};
