//! Converter discovery command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use cadintake_core::config::AppConfig;
use cadintake_core::error::AppError;
use cadintake_pipeline::ConverterLocator;

use crate::output::{self, OutputFormat};

/// Arguments for the locate command
#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Also list every search candidate
    #[arg(long)]
    pub candidates: bool,
}

/// Search candidate row
#[derive(Debug, Serialize, Tabled)]
struct CandidateRow {
    /// Candidate path
    path: String,
    /// Exists on disk
    exists: bool,
}

/// Execute the locate command
pub fn execute(args: &LocateArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let locator = ConverterLocator::new(config.converter.clone());
    let resolved = locator.resolve();

    output::print_item(&resolved, format);
    if format == OutputFormat::Table && !resolved.path.is_file() {
        output::print_warning("Resolved converter does not exist");
    }

    if args.candidates {
        let rows: Vec<CandidateRow> = locator
            .get_converter_path_candidates(locator.base_dir())
            .into_iter()
            .map(|path| CandidateRow {
                exists: path.is_file(),
                path: path.display().to_string(),
            })
            .collect();
        output::print_list(&rows, format);
    }
    Ok(())
}
