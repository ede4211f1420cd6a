//! Artifact cache trait for pluggable mesh caching backends.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::result::AppResult;

/// Content-addressed store of converted mesh (GLB) artifacts.
///
/// Keys are content hashes computed by the caller; implementations never
/// hash on their own. Every operation accepts a cancellation token and
/// returns a [`crate::error::ErrorKind::Cancelled`] error once it fires.
#[async_trait]
pub trait ArtifactCache: Send + Sync + std::fmt::Debug + 'static {
    /// Load the artifact stored under `hash`. Returns `None` for an absent key.
    async fn try_get_glb(&self, hash: &str, cancel: &CancellationToken) -> AppResult<Option<Bytes>>;

    /// Store `glb` under `hash`. A completed save is visible to later reads;
    /// a cancelled save never becomes visible.
    async fn save_glb(
        &self,
        hash: &str,
        glb: Bytes,
        origin_file_name: &str,
        cancel: &CancellationToken,
    ) -> AppResult<()>;

    /// Check whether an artifact exists for `hash`.
    async fn contains(&self, hash: &str) -> AppResult<bool>;

    /// Remove the artifact stored under `hash`, if any.
    async fn remove(&self, hash: &str) -> AppResult<()>;

    /// Name of the backing provider, for logs.
    fn provider_type(&self) -> &str;
}
