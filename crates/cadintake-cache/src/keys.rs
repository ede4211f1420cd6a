//! Cache key validation and on-disk layout.
//!
//! Keys are caller-supplied content hashes. They are never rewritten here;
//! a key that could escape the cache root is refused instead.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use cadintake_core::error::AppError;
use cadintake_core::result::AppResult;

/// Number of leading key characters used as the shard directory name.
const SHARD_WIDTH: usize = 2;

/// File extension of stored artifacts.
pub const ARTIFACT_EXTENSION: &str = "glb";

/// File extension of the metadata sidecar.
pub const METADATA_EXTENSION: &str = "json";

/// Directory (inside the root) holding in-progress writes.
pub const STAGING_DIR: &str = ".staging";

/// Refuse keys that are empty or could address a path outside the root.
pub fn validate_key(hash: &str) -> AppResult<()> {
    if hash.is_empty() {
        return Err(AppError::validation("Cache key must not be empty"));
    }
    if hash.starts_with('.') {
        return Err(AppError::validation(format!(
            "Cache key must not start with '.': {hash}"
        )));
    }
    if hash
        .chars()
        .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control())
    {
        return Err(AppError::validation(format!(
            "Cache key is not filesystem-safe: {hash}"
        )));
    }
    Ok(())
}

/// Shard directory name for a key.
pub fn shard(hash: &str) -> String {
    hash.chars().take(SHARD_WIDTH).collect()
}

/// Final location of the artifact for `hash`.
pub fn artifact_path(root: &Path, hash: &str) -> PathBuf {
    root.join(shard(hash))
        .join(format!("{hash}.{ARTIFACT_EXTENSION}"))
}

/// Location of the metadata sidecar for `hash`.
pub fn metadata_path(root: &Path, hash: &str) -> PathBuf {
    root.join(shard(hash))
        .join(format!("{hash}.{METADATA_EXTENSION}"))
}

/// A fresh, unique staging file path for an in-progress write.
pub fn staging_path(root: &Path) -> PathBuf {
    root.join(STAGING_DIR)
        .join(format!("{}.partial", Uuid::now_v7().simple()))
}
