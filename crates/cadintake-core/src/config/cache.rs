//! Artifact cache configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache provider type: `"disk"`, `"memory"`, or `"layered"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Root directory for on-disk artifacts.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// In-memory cache configuration (used by `memory` and `layered`).
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            root: default_root(),
            memory: MemoryCacheConfig::default(),
        }
    }
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum total size of cached artifacts, in bytes.
    #[serde(default = "default_max_capacity_bytes")]
    pub max_capacity_bytes: u64,
    /// TTL for in-memory entries in seconds.
    #[serde(default = "default_memory_ttl")]
    pub time_to_live_seconds: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity_bytes: default_max_capacity_bytes(),
            time_to_live_seconds: default_memory_ttl(),
        }
    }
}

fn default_provider() -> String {
    "disk".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from("data/cache/glb")
}

fn default_max_capacity_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_memory_ttl() -> u64 {
    3600
}
