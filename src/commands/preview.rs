//! GLB preview command.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use cadintake_cache::CacheManager;
use cadintake_core::config::AppConfig;
use cadintake_core::error::AppError;
use cadintake_pipeline::diagnostics::DiagnosticsLog;
use cadintake_pipeline::{PreviewRequest, PreviewService, SubprocessConverter};

use crate::output::{self, OutputFormat};

/// Arguments for the preview command
#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// CAD file to preview
    pub path: PathBuf,

    /// Write the GLB here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Source tag recorded in diagnostics
    #[arg(long, default_value = "preview")]
    pub source: String,
}

/// Execute the preview command
pub async fn execute(args: &PreviewArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let bytes = Bytes::from(super::read_input(&args.path).await?);
    let name = super::file_name_of(&args.path);

    let cache = CacheManager::new(&config.cache).await?;
    let converter = SubprocessConverter::new(&config.converter);
    let service = PreviewService::new(
        config,
        Arc::new(cache),
        Arc::new(converter),
        DiagnosticsLog::from_config(&config.diagnostics),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling preview");
            on_interrupt.cancel();
        }
    });

    let request = PreviewRequest::new(args.path.display().to_string()).with_source(&args.source);
    let outcome = service.get_or_create_glb(bytes, &name, request, cancel).await;

    if let (Some(path), Some(glb)) = (&args.output, &outcome.glb) {
        tokio::fs::write(path, glb).await?;
    }

    match format {
        OutputFormat::Json => output::print_item(&outcome, format),
        OutputFormat::Table => {
            output::print_kv("Content hash", &outcome.content_hash);
            output::print_kv("Type", outcome.detection.file_type.as_str());
            if let Some(parse) = &outcome.parse {
                output::print_kv("STEP entities", &parse.entity_count.to_string());
            }
            if outcome.is_success() {
                output::print_kv("GLB bytes", &outcome.glb_bytes.to_string());
                output::print_kv("Cache hit", &outcome.cache_hit.to_string());
                if let Some(path) = &args.output {
                    output::print_success(&format!("GLB written to '{}'", path.display()));
                }
            }
        }
    }

    match &outcome.error_code {
        None => Ok(()),
        Some(code) => Err(AppError::validation(format!("{code}: {}", outcome.message))),
    }
}
