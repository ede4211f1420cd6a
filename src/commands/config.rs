//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use cadintake_core::config::AppConfig;
use cadintake_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration and summarize it
    Validate,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config: &AppConfig,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => output::print_item(config, format),
        ConfigCommand::Validate => {
            config.validate()?;
            output::print_success(&format!("Configuration '{config_path}' is valid"));
            output::print_kv("Cache", &format!("{} ({})", config.cache.provider, config.cache.root.display()));
            output::print_kv(
                "Converter",
                &config
                    .converter
                    .executable_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "search".to_string()),
            );
            output::print_kv(
                "Diagnostics journal",
                &config
                    .diagnostics
                    .journal_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "in-memory".to_string()),
            );
        }
    }
    Ok(())
}
