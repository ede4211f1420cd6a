//! In-memory artifact cache.

mod store;

pub use store::MemoryArtifactCache;
