//! File type detection configuration.

use serde::{Deserialize, Serialize};

/// Content sniffing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Number of leading (and trailing) bytes inspected by content sniffers.
    #[serde(default = "default_sniff_window")]
    pub sniff_window_bytes: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sniff_window_bytes: default_sniff_window(),
        }
    }
}

fn default_sniff_window() -> usize {
    4096
}
