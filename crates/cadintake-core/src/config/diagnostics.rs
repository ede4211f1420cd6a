//! Diagnostics log configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for the parse/convert diagnostics log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Optional JSON-lines journal that survives restarts.
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
    /// Source tag used when a caller records an attempt without one.
    #[serde(default = "default_source")]
    pub default_source: String,
    /// Buffer size of the async event feed.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            journal_path: None,
            default_source: default_source(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_source() -> String {
    "step-parse".to_string()
}

fn default_channel_capacity() -> usize {
    256
}
