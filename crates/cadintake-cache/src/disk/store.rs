//! Filesystem-backed artifact cache.
//!
//! Artifacts are written to a staging file, flushed, then renamed into
//! place, so readers never observe a partially written GLB.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use cadintake_core::error::{AppError, ErrorKind};
use cadintake_core::result::AppResult;
use cadintake_core::traits::cache::ArtifactCache;

use crate::keys;

/// Debug metadata stored next to each artifact. Not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// The content hash the artifact is stored under.
    pub hash: String,
    /// Name of the source file that produced the artifact.
    pub origin_file_name: String,
    /// Artifact size in bytes.
    pub size_bytes: u64,
    /// When the artifact was published.
    pub saved_at: DateTime<Utc>,
}

/// On-disk artifact cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct DiskArtifactCache {
    /// Root directory for all artifacts.
    root: PathBuf,
}

impl DiskArtifactCache {
    /// Create a cache rooted at the given path, creating it if needed.
    pub async fn new(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(keys::STAGING_DIR))
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Cache,
                    format!("Failed to create cache root: {}", root.display()),
                    e,
                )
            })?;
        Ok(Self { root })
    }

    /// The cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the metadata sidecar for `hash`, if present.
    pub async fn metadata(&self, hash: &str) -> AppResult<Option<ArtifactMetadata>> {
        keys::validate_key(hash)?;
        let path = keys::metadata_path(&self.root, hash);
        match fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to read cache metadata: {hash}"),
                e,
            )),
        }
    }

    /// Write `data` to `final_path` via a staging file and an atomic rename.
    async fn write_atomic(
        &self,
        final_path: &Path,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let staging = keys::staging_path(&self.root);
        let stage_error = |e: std::io::Error| {
            AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to stage cache write: {}", final_path.display()),
                e,
            )
        };

        // Created outside the race so a cancelled write always leaves a file
        // for discard_staging to remove, never one that appears afterwards.
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await.map_err(stage_error)?;
        }
        let mut file = fs::File::create(&staging).await.map_err(stage_error)?;

        let write = async {
            file.write_all(data).await?;
            file.sync_all().await
        };

        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::cancelled("Cache write was cancelled")),
            result = write => result.map_err(stage_error),
        };
        drop(file);

        if let Err(e) = written {
            discard_staging(&staging).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, final_path).await {
            discard_staging(&staging).await;
            return Err(AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to publish cache entry: {}", final_path.display()),
                e,
            ));
        }

        Ok(())
    }
}

/// Remove a staging file left behind by a failed or cancelled write.
async fn discard_staging(staging: &Path) {
    if let Err(e) = fs::remove_file(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %staging.display(), error = %e, "Failed to remove staging file");
        }
    }
}

#[async_trait]
impl ArtifactCache for DiskArtifactCache {
    async fn try_get_glb(
        &self,
        hash: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Option<Bytes>> {
        keys::validate_key(hash)?;
        if cancel.is_cancelled() {
            return Err(AppError::cancelled("Cache read was cancelled"));
        }

        let path = keys::artifact_path(&self.root, hash);
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::cancelled("Cache read was cancelled")),
            result = fs::read(&path) => result,
        };

        match read {
            Ok(data) => {
                debug!(hash, bytes = data.len(), "Cache hit");
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(hash, "Cache miss");
                Ok(None)
            }
            Err(e) => Err(AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to read cache entry: {hash}"),
                e,
            )),
        }
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

        let artifact = keys::artifact_path(&self.root, hash);
        self.write_atomic(&artifact, &glb, cancel).await?;

        let metadata = ArtifactMetadata {
            hash: hash.to_string(),
            origin_file_name: origin_file_name.to_string(),
            size_bytes: glb.len() as u64,
            saved_at: Utc::now(),
        };
        let sidecar = serde_json::to_vec_pretty(&metadata)?;
        // The artifact is already published; the sidecar is debug data only.
        if let Err(e) = self
            .write_atomic(
                &keys::metadata_path(&self.root, hash),
                &sidecar,
                &CancellationToken::new(),
            )
            .await
        {
            warn!(hash, error = %e, "Failed to write cache metadata sidecar");
        }

        debug!(hash, bytes = glb.len(), origin = origin_file_name, "Cached artifact");
        Ok(())
    }

    async fn contains(&self, hash: &str) -> AppResult<bool> {
        keys::validate_key(hash)?;
        let path = keys::artifact_path(&self.root, hash);
        fs::try_exists(&path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Cache,
                format!("Failed to probe cache entry: {hash}"),
                e,
            )
        })
    }

    async fn remove(&self, hash: &str) -> AppResult<()> {
        keys::validate_key(hash)?;
        for path in [
            keys::artifact_path(&self.root, hash),
            keys::metadata_path(&self.root, hash),
        ] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Cache,
                        format!("Failed to remove cache entry: {hash}"),
                        e,
                    ));
                }
            }
        }
        Ok(())
    }

    fn provider_type(&self) -> &str {
        "disk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_cache() -> (tempfile::TempDir, DiskArtifactCache) {
        let temp = tempfile::tempdir().expect("tempdir");
        let cache = DiskArtifactCache::new(temp.path().join("glb"))
            .await
            .expect("create cache");
        (temp, cache)
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let (_temp, cache) = make_cache().await;
        let cancel = CancellationToken::new();
        let payload = Bytes::from_static(&[1, 2, 3, 4]);

        cache
            .save_glb("ABC123", payload.clone(), "sample.step", &cancel)
            .await
            .expect("save");
        let loaded = cache.try_get_glb("ABC123", &cancel).await.expect("load");

        assert_eq!(loaded, Some(payload));
    }

    #[tokio::test]
    async fn test_unused_hash_is_not_found() {
        let (_temp, cache) = make_cache().await;
        let loaded = cache
            .try_get_glb("FFFF", &CancellationToken::new())
            .await
            .expect("load");
        assert!(loaded.is_none());
        assert!(!cache.contains("FFFF").await.expect("contains"));
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let (_temp, cache) = make_cache().await;
        let cancel = CancellationToken::new();
        cache
            .save_glb("AA11", Bytes::from_static(b"first"), "a.step", &cancel)
            .await
            .expect("save first");
        cache
            .save_glb("AA11", Bytes::from_static(b"second"), "b.step", &cancel)
            .await
            .expect("save second");

        let loaded = cache.try_get_glb("AA11", &cancel).await.expect("load");
        assert_eq!(loaded.as_deref(), Some(&b"second"[..]));
        let meta = cache.metadata("AA11").await.expect("meta").expect("present");
        assert_eq!(meta.origin_file_name, "b.step");
        assert_eq!(meta.size_bytes, 6);
    }

    #[tokio::test]
    async fn test_cancelled_write_publishes_nothing() {
        let (_temp, cache) = make_cache().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cache
            .save_glb("BEEF", Bytes::from_static(b"glb"), "part.step", &cancel)
            .await;

        assert!(result.expect_err("cancelled").is_cancelled());
        assert!(!cache.contains("BEEF").await.expect("contains"));

        let mut staged = fs::read_dir(cache.root().join(keys::STAGING_DIR))
            .await
            .expect("read staging");
        assert!(staged.next_entry().await.expect("entry").is_none());
    }

    async fn staged_file_count(cache: &DiskArtifactCache) -> usize {
        let mut staged = fs::read_dir(cache.root().join(keys::STAGING_DIR))
            .await
            .expect("read staging");
        let mut count = 0;
        while staged.next_entry().await.expect("entry").is_some() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_cancelled_staged_write_is_discarded() {
        let (_temp, cache) = make_cache().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let target = keys::artifact_path(cache.root(), "D00D");

        let result = cache.write_atomic(&target, b"glTF", &cancel).await;

        assert!(result.expect_err("cancelled").is_cancelled());
        assert!(!target.exists());
        assert_eq!(staged_file_count(&cache).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_write_cancelled_midway_leaves_no_files() {
        let (_temp, cache) = make_cache().await;
        let cancel = CancellationToken::new();
        let staging_dir = cache.root().join(keys::STAGING_DIR);

        // Cancel as soon as the staging file shows up.
        let trigger = cancel.clone();
        let watcher = tokio::spawn(async move {
            loop {
                let mut entries = fs::read_dir(&staging_dir).await.expect("read staging");
                if entries.next_entry().await.expect("entry").is_some() {
                    trigger.cancel();
                    return;
                }
                tokio::task::yield_now().await;
            }
        });

        let payload = Bytes::from(vec![0x5A_u8; 128 * 1024 * 1024]);
        let result = cache.save_glb("F00D", payload, "huge.step", &cancel).await;
        watcher.await.expect("watcher");

        assert!(result.expect_err("cancelled").is_cancelled());
        assert!(!cache.contains("F00D").await.expect("contains"));
        assert_eq!(staged_file_count(&cache).await, 0);
    }

    #[tokio::test]
    async fn test_cancelled_read_returns_no_result() {
        let (_temp, cache) = make_cache().await;
        let cancel = CancellationToken::new();
        cache
            .save_glb("CAFE", Bytes::from_static(b"glb"), "part.step", &cancel)
            .await
            .expect("save");

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let result = cache.try_get_glb("CAFE", &cancelled).await;
        assert!(result.expect_err("cancelled").is_cancelled());
    }

    #[tokio::test]
    async fn test_remove_deletes_artifact_and_sidecar() {
        let (_temp, cache) = make_cache().await;
        let cancel = CancellationToken::new();
        cache
            .save_glb("D00D", Bytes::from_static(b"glb"), "part.step", &cancel)
            .await
            .expect("save");

        cache.remove("D00D").await.expect("remove");
        cache.remove("D00D").await.expect("remove twice");

        assert!(!cache.contains("D00D").await.expect("contains"));
        assert!(cache.metadata("D00D").await.expect("meta").is_none());
    }

    #[tokio::test]
    async fn test_unsafe_key_is_refused() {
        let (_temp, cache) = make_cache().await;
        let result = cache
            .save_glb("../escape", Bytes::from_static(b"x"), "x", &CancellationToken::new())
            .await;
        assert_eq!(result.expect_err("refused").kind, ErrorKind::Validation);
    }
}
