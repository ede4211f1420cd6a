//! File type detection command.

use std::path::PathBuf;

use clap::Args;

use cadintake_core::config::AppConfig;
use cadintake_core::error::AppError;
use cadintake_pipeline::FileTypeDetector;

use crate::output::{self, OutputFormat};

/// Arguments for the detect command
#[derive(Debug, Args)]
pub struct DetectArgs {
    /// File to classify
    pub path: PathBuf,

    /// File name to use for extension fallback instead of the path's own
    #[arg(long)]
    pub name: Option<String>,
}

/// Execute the detect command
pub async fn execute(args: &DetectArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let bytes = super::read_input(&args.path).await?;
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| super::file_name_of(&args.path));

    let result = FileTypeDetector::new(&config.detection).detect(&bytes, Some(&name));

    match format {
        OutputFormat::Json => output::print_item(&result, format),
        OutputFormat::Table => {
            output::print_kv("File", &name);
            output::print_kv("Type", result.file_type.as_str());
            output::print_kv("Detected by", &format!("{:?}", result.detection_source).to_lowercase());
            output::print_kv("Extension", &result.normalized_extension);
            output::print_kv("Renderable", &result.is_supported_for_rendering.to_string());
        }
    }
    Ok(())
}
