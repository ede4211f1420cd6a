//! In-memory artifact cache using the moka crate.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use cadintake_core::config::cache::MemoryCacheConfig;
use cadintake_core::error::AppError;
use cadintake_core::result::AppResult;
use cadintake_core::traits::cache::ArtifactCache;

use crate::keys;

/// A cached GLB together with the name of the file that produced it.
#[derive(Debug, Clone)]
struct CachedArtifact {
    glb: Bytes,
    origin_file_name: String,
}

/// In-memory artifact cache, bounded by total artifact size.
#[derive(Debug, Clone)]
pub struct MemoryArtifactCache {
    /// The underlying moka cache, weighted by artifact length.
    cache: Cache<String, CachedArtifact>,
}

impl MemoryArtifactCache {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity_bytes)
            .weigher(|_key: &String, value: &CachedArtifact| {
                u32::try_from(value.glb.len()).unwrap_or(u32::MAX)
            })
            .time_to_live(Duration::from_secs(config.time_to_live_seconds))
            .build();

        Self { cache }
    }

    /// Name of the source file recorded for `hash`, if cached.
    pub async fn origin_file_name(&self, hash: &str) -> Option<String> {
        self.cache
            .get(hash)
            .await
            .map(|entry| entry.origin_file_name)
    }
}

#[async_trait]
impl ArtifactCache for MemoryArtifactCache {
    async fn try_get_glb(
        &self,
        hash: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Option<Bytes>> {
        keys::validate_key(hash)?;
        if cancel.is_cancelled() {
            return Err(AppError::cancelled("Cache read was cancelled"));
        }
        Ok(self.cache.get(hash).await.map(|entry| entry.glb))
    }

    async fn save_glb(
        &self,
        hash: &str,
        glb: Bytes,
        origin_file_name: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        keys::validate_key(hash)?;
        if cancel.is_cancelled() {
            return Err(AppError::cancelled("Cache write was cancelled"));
        }
        debug!(hash, bytes = glb.len(), "Caching artifact in memory");
        self.cache
            .insert(
                hash.to_string(),
                CachedArtifact {
                    glb,
                    origin_file_name: origin_file_name.to_string(),
                },
            )
            .await;
        Ok(())
    }

    async fn contains(&self, hash: &str) -> AppResult<bool> {
        keys::validate_key(hash)?;
        Ok(self.cache.contains_key(hash))
    }

    async fn remove(&self, hash: &str) -> AppResult<()> {
        keys::validate_key(hash)?;
        self.cache.invalidate(hash).await;
        Ok(())
    }

    fn provider_type(&self) -> &str {
        "memory"
    }
}
