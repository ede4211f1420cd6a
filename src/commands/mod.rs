//! CLI command definitions and dispatch.

pub mod cache;
pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod locate;
pub mod parse;
pub mod preview;

use std::path::Path;

use clap::{Parser, Subcommand};

use cadintake_core::config::AppConfig;
use cadintake_core::error::AppError;

use crate::output::OutputFormat;

/// CAD intake: file detection, STEP validation and cached GLB previews
#[derive(Debug, Parser)]
#[command(name = "cadintake", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify a file by content and extension
    Detect(detect::DetectArgs),
    /// Validate STEP structure and print the entity census
    Parse(parse::ParseArgs),
    /// Produce a GLB preview, converting on cache miss
    Preview(preview::PreviewArgs),
    /// Show where the converter executable resolves to
    Locate(locate::LocateArgs),
    /// Artifact cache inspection
    Cache(cache::CacheArgs),
    /// Diagnostics journal
    Diagnostics(diagnostics::DiagnosticsArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Detect(args) => detect::execute(args, &config, self.format).await,
            Commands::Parse(args) => parse::execute(args, &config, self.format).await,
            Commands::Preview(args) => preview::execute(args, &config, self.format).await,
            Commands::Locate(args) => locate::execute(args, &config, self.format),
            Commands::Cache(args) => cache::execute(args, &config, self.format).await,
            Commands::Diagnostics(args) => diagnostics::execute(args, &config, self.format),
            Commands::Config(args) => config::execute(args, &config, &self.config, self.format),
        }
    }
}

/// Helper: load configuration from file. The `.toml` suffix is optional.
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    let stem = config_path.strip_suffix(".toml").unwrap_or(config_path);
    AppConfig::load(stem)
}

/// Helper: read an input file, mapping failures to a readable error.
pub async fn read_input(path: &Path) -> Result<Vec<u8>, AppError> {
    tokio::fs::read(path).await.map_err(|e| {
        AppError::with_source(
            cadintake_core::error::ErrorKind::NotFound,
            format!("Failed to read '{}'", path.display()),
            e,
        )
    })
}

/// Helper: the file name component of `path`, or an empty string.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
