//! Artifact cache commands.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;

use cadintake_cache::{CacheManager, DiskArtifactCache};
use cadintake_core::config::AppConfig;
use cadintake_core::error::AppError;
use cadintake_core::traits::cache::ArtifactCache;

use crate::output::{self, OutputFormat};

/// Arguments for cache commands
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Cache subcommand
    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Cache subcommands
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Copy a cached GLB to a file
    Get {
        /// Content hash
        hash: String,
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show what is stored for a hash
    Stat {
        /// Content hash
        hash: String,
    },
    /// Remove a cached GLB
    Remove {
        /// Content hash
        hash: String,
    },
}

/// Execute cache commands
pub async fn execute(args: &CacheArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let cache = CacheManager::new(&config.cache).await?;

    match &args.command {
        CacheCommand::Get { hash, output: out } => {
            let glb = cache
                .try_get_glb(hash, &CancellationToken::new())
                .await?
                .ok_or_else(|| AppError::not_found(format!("No artifact cached for {hash}")))?;
            tokio::fs::write(out, &glb).await?;
            output::print_success(&format!("{} bytes written to '{}'", glb.len(), out.display()));
        }
        CacheCommand::Stat { hash } => {
            if !cache.contains(hash).await? {
                return Err(AppError::not_found(format!("No artifact cached for {hash}")));
            }
            // Sidecar metadata only exists for disk-backed providers.
            let metadata = match config.cache.provider.as_str() {
                "disk" | "layered" => DiskArtifactCache::new(&config.cache.root).await?.metadata(hash).await?,
                _ => None,
            };
            match metadata {
                Some(meta) => output::print_item(&meta, format),
                None => output::print_kv("Cached", "true"),
            }
        }
        CacheCommand::Remove { hash } => {
            cache.remove(hash).await?;
            output::print_success(&format!("Removed {hash} from {} cache", cache.provider_type()));
        }
    }
    Ok(())
}
