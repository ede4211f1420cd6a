//! Diagnostics journal commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use cadintake_core::config::AppConfig;
use cadintake_core::error::AppError;
use cadintake_pipeline::diagnostics::DiagnosticsLog;

use crate::output::{self, OutputFormat};

/// Arguments for diagnostics commands
#[derive(Debug, Args)]
pub struct DiagnosticsArgs {
    /// Diagnostics subcommand
    #[command(subcommand)]
    pub command: DiagnosticsCommand,
}

/// Diagnostics subcommands
#[derive(Debug, Subcommand)]
pub enum DiagnosticsCommand {
    /// List recorded attempts, newest last
    Show {
        /// Only the most recent N entries
        #[arg(short, long)]
        limit: Option<usize>,
        /// Only failed attempts
        #[arg(long)]
        failures: bool,
    },
    /// Remove every recorded attempt
    Clear,
}

/// Diagnostics display row
#[derive(Debug, Serialize, Tabled)]
struct EntryRow {
    /// Sequence
    seq: u64,
    /// Recorded at
    recorded: String,
    /// File
    file: String,
    /// Outcome
    outcome: String,
    /// Category
    category: String,
    /// Source
    source: String,
    /// Message
    message: String,
}

/// Execute diagnostics commands
pub fn execute(args: &DiagnosticsArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let Some(journal) = &config.diagnostics.journal_path else {
        return Err(AppError::configuration(
            "diagnostics.journal_path is not set; nothing is persisted between runs",
        ));
    };
    let log = DiagnosticsLog::from_config(&config.diagnostics);

    match &args.command {
        DiagnosticsCommand::Show { limit, failures } => {
            let mut entries = log.get_entries();
            if *failures {
                entries.retain(|e| !e.is_success);
            }
            if let Some(limit) = limit {
                let skip = entries.len().saturating_sub(*limit);
                entries.drain(..skip);
            }

            match format {
                OutputFormat::Json => output::print_item(&entries, format),
                OutputFormat::Table => {
                    let rows: Vec<EntryRow> = entries
                        .into_iter()
                        .map(|e| EntryRow {
                            seq: e.sequence,
                            recorded: e.recorded_utc.format("%Y-%m-%d %H:%M:%S").to_string(),
                            file: e.file_name,
                            outcome: e.error_code.unwrap_or_else(|| "ok".to_string()),
                            category: e
                                .failure_category
                                .map(|c| c.to_string())
                                .unwrap_or_default(),
                            source: e.source,
                            message: e.message,
                        })
                        .collect();
                    output::print_list(&rows, format);
                }
            }
        }
        DiagnosticsCommand::Clear => {
            let count = log.len();
            log.clear();
            output::print_success(&format!(
                "Cleared {count} entries from '{}'",
                journal.display()
            ));
        }
    }
    Ok(())
}
