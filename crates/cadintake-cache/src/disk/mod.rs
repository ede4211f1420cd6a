//! On-disk artifact cache.

mod store;

pub use store::{ArtifactMetadata, DiskArtifactCache};
