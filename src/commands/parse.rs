//! STEP structural validation command.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use cadintake_core::config::AppConfig;
use cadintake_core::error::AppError;
use cadintake_pipeline::StepStructuralParser;
use cadintake_pipeline::diagnostics::{AttemptRecord, DiagnosticsLog};

use crate::output::{self, OutputFormat};

/// Arguments for the parse command
#[derive(Debug, Args)]
pub struct ParseArgs {
    /// STEP file to validate
    pub path: PathBuf,

    /// Do not record the attempt in the diagnostics journal
    #[arg(long)]
    pub no_record: bool,
}

/// Entity census row
#[derive(Debug, Serialize, Tabled)]
struct EntityRow {
    /// Entity type
    entity_type: String,
    /// Occurrences
    count: usize,
}

/// Execute the parse command
pub async fn execute(args: &ParseArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let bytes = super::read_input(&args.path).await?;
    let name = super::file_name_of(&args.path);
    let result = StepStructuralParser::new().parse(&bytes);

    if !args.no_record {
        let log = DiagnosticsLog::from_config(&config.diagnostics);
        let attempt = match result.error_code {
            None => AttemptRecord::success(&name),
            Some(code) => {
                AttemptRecord::failure(&name, code.as_str()).with_category(code.failure_category())
            }
        };
        log.record_attempt(
            attempt
                .with_path(args.path.display().to_string())
                .with_size(bytes.len() as u64)
                .with_message(&result.message)
                .with_details(format!(
                    "entities={} solids={} surfaces={}",
                    result.entity_count, result.solid_entity_count, result.surface_entity_count
                )),
        );
    }

    match format {
        OutputFormat::Json => output::print_item(&result, format),
        OutputFormat::Table => {
            if result.is_success {
                output::print_success(&result.message);
            } else {
                output::print_warning(&format!(
                    "{}: {}",
                    result.error_code_str().unwrap_or_default(),
                    result.message
                ));
            }
            output::print_kv("Entities", &result.entity_count.to_string());
            output::print_kv("Solid entities", &result.solid_entity_count.to_string());
            output::print_kv("Surface entities", &result.surface_entity_count.to_string());

            let rows: Vec<EntityRow> = result
                .distinct_entity_types
                .iter()
                .map(|(name, count)| EntityRow {
                    entity_type: name.clone(),
                    count: *count,
                })
                .collect();
            if !rows.is_empty() {
                output::print_list(&rows, format);
            }
        }
    }
    Ok(())
}
