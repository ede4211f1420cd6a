//! Trait seams shared across the intake crates.

pub mod cache;

pub use cache::ArtifactCache;
