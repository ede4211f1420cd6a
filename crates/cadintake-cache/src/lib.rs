//! # cadintake-cache
//!
//! Artifact cache providers for converted GLB meshes. Supports three modes:
//!
//! - **disk**: one file per content hash under a cache root, written
//!   atomically (temp file + rename)
//! - **memory**: in-process cache using [moka](https://crates.io/crates/moka)
//! - **layered**: memory L1 in front of disk L2
//!
//! The provider is selected at runtime based on configuration.

pub mod disk;
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;

pub use disk::DiskArtifactCache;
pub use provider::{CacheManager, LayeredArtifactCache};
