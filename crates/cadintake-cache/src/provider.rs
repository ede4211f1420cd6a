//! Cache manager that dispatches to the configured provider.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cadintake_core::config::cache::CacheConfig;
use cadintake_core::error::AppError;
use cadintake_core::result::AppResult;
use cadintake_core::traits::cache::ArtifactCache;

use crate::disk::DiskArtifactCache;

/// Cache manager that wraps the configured artifact cache.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// The inner cache provider.
    inner: Arc<dyn ArtifactCache>,
}

impl CacheManager {
    /// Create a new cache manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let inner: Arc<dyn ArtifactCache> = match config.provider.as_str() {
            "disk" => {
                info!(root = %config.root.display(), "Initializing disk artifact cache");
                Arc::new(DiskArtifactCache::new(&config.root).await?)
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory artifact cache");
                Arc::new(crate::memory::MemoryArtifactCache::new(&config.memory))
            }
            #[cfg(feature = "memory")]
            "layered" => {
                info!(root = %config.root.display(), "Initializing layered artifact cache");
                let l1 = crate::memory::MemoryArtifactCache::new(&config.memory);
                let l2 = DiskArtifactCache::new(&config.root).await?;
                Arc::new(LayeredArtifactCache::new(Arc::new(l1), Arc::new(l2)))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: disk, memory, layered"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a cache manager from an existing provider (for testing).
    pub fn from_provider(provider: Arc<dyn ArtifactCache>) -> Self {
        Self { inner: provider }
    }

    /// Get a reference to the inner provider.
    pub fn provider(&self) -> &dyn ArtifactCache {
        self.inner.as_ref()
    }
}

#[async_trait]
impl ArtifactCache for CacheManager {
    async fn try_get_glb(
        &self,
        hash: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Option<Bytes>> {
        self.inner.try_get_glb(hash, cancel).await
    }

    async fn save_glb(
        &self,
        hash: &str,
        glb: Bytes,
        origin_file_name: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.inner
            .save_glb(hash, glb, origin_file_name, cancel)
            .await
    }

    async fn contains(&self, hash: &str) -> AppResult<bool> {
        self.inner.contains(hash).await
    }

    async fn remove(&self, hash: &str) -> AppResult<()> {
        self.inner.remove(hash).await
    }

    fn provider_type(&self) -> &str {
        self.inner.provider_type()
    }
}

/// A fast cache in front of a durable one.
///
/// Reads try the front first and backfill it from the back on a hit.
/// Writes go to the back first so the front never holds an artifact the
/// back refused.
#[derive(Debug, Clone)]
pub struct LayeredArtifactCache {
    front: Arc<dyn ArtifactCache>,
    back: Arc<dyn ArtifactCache>,
}

impl LayeredArtifactCache {
    /// Layer `front` over `back`.
    pub fn new(front: Arc<dyn ArtifactCache>, back: Arc<dyn ArtifactCache>) -> Self {
        Self { front, back }
    }
}

#[async_trait]
impl ArtifactCache for LayeredArtifactCache {
    async fn try_get_glb(
        &self,
        hash: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Option<Bytes>> {
        if let Some(glb) = self.front.try_get_glb(hash, cancel).await? {
            return Ok(Some(glb));
        }
        let Some(glb) = self.back.try_get_glb(hash, cancel).await? else {
            return Ok(None);
        };
        // Origin name is not carried by the read path. The back already
        // served the bytes, so a failed backfill only costs the next read.
        if let Err(e) = self.front.save_glb(hash, glb.clone(), "", cancel).await {
            warn!(
                hash,
                front = self.front.provider_type(),
                error = %e,
                "Failed to backfill front cache"
            );
        }
        Ok(Some(glb))
    }

    async fn save_glb(
        &self,
        hash: &str,
        glb: Bytes,
        origin_file_name: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        self.back
            .save_glb(hash, glb.clone(), origin_file_name, cancel)
            .await?;
        self.front
            .save_glb(hash, glb, origin_file_name, cancel)
            .await
    }

    async fn contains(&self, hash: &str) -> AppResult<bool> {
        if self.front.contains(hash).await? {
            return Ok(true);
        }
        self.back.contains(hash).await
    }

    async fn remove(&self, hash: &str) -> AppResult<()> {
        self.front.remove(hash).await?;
        self.back.remove(hash).await
    }

    fn provider_type(&self) -> &str {
        "layered"
    }
}
