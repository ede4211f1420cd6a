//! Configuration for the external STEP→GLB converter.
//!
//! The converter executable is resolved in this order: the override
//! environment variable, an explicitly configured path, then a search of
//! conventional `Tools/` folders relative to the application directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Environment variable that overrides every other converter location.
pub const DEFAULT_OVERRIDE_ENV_VAR: &str = "CADINTAKE_STEP2GLB_PATH";

/// Settings for locating and invoking the mesh converter.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Name of the environment variable holding an absolute converter path.
    #[validate(length(min = 1))]
    pub override_env_var: String,

    /// Explicit converter path. Skips the candidate search when set.
    pub executable_path: Option<PathBuf>,

    /// Application folder probed below each ancestor of the base directory.
    pub app_folder_name: String,

    /// Converter locations relative to a probed root, in priority order.
    #[validate(length(min = 1))]
    pub candidate_relative_paths: Vec<PathBuf>,

    /// How many ancestors of the base directory are probed.
    #[validate(range(max = 16))]
    pub ancestor_depth: usize,

    /// Timeout in seconds for a single converter invocation.
    #[validate(range(min = 1, max = 3600))]
    pub timeout_seconds: u64,

    /// Maximum retry attempts for failed (non-timeout) conversions.
    #[validate(range(max = 5))]
    pub max_retries: u32,

    /// Delay in milliseconds between retry attempts.
    pub retry_delay_ms: u64,

    /// Minimum output size (bytes) for a conversion to count as successful.
    #[validate(range(min = 1))]
    pub min_output_bytes: u64,

    /// Root directory for per-job working files.
    pub temp_root: Option<PathBuf>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            override_env_var: DEFAULT_OVERRIDE_ENV_VAR.to_string(),
            executable_path: None,
            app_folder_name: "CadIntake".to_string(),
            candidate_relative_paths: default_candidate_relative_paths(),
            ancestor_depth: 6,
            timeout_seconds: 90,
            max_retries: 1,
            retry_delay_ms: 150,
            min_output_bytes: 1,
            temp_root: None,
        }
    }
}

/// The conventional `Tools/` locations of the converter executable.
pub fn default_candidate_relative_paths() -> Vec<PathBuf> {
    let suffix = std::env::consts::EXE_SUFFIX;
    vec![
        PathBuf::from("Tools")
            .join("step2glb")
            .join(format!("step2glb{suffix}")),
        PathBuf::from("Tools")
            .join("x64")
            .join(format!("step-to-glb-converter{suffix}")),
    ]
}

impl ConverterConfig {
    /// Resolve the effective temp root directory.
    pub fn effective_temp_root(&self) -> PathBuf {
        self.temp_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cadintake-step-glb"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ConverterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.override_env_var, DEFAULT_OVERRIDE_ENV_VAR);
        assert_eq!(config.timeout_seconds, 90);
        assert_eq!(config.candidate_relative_paths.len(), 2);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ConverterConfig {
            timeout_seconds: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_candidates_rejected() {
        let config = ConverterConfig {
            candidate_relative_paths: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_partial_section_uses_defaults() {
        let config: ConverterConfig =
            toml::from_str("timeout_seconds = 30\nmax_retries = 0\n").expect("parse toml");
        assert_eq!(config.timeout_seconds, 30);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.app_folder_name, "CadIntake");
        assert!(config.executable_path.is_none());
    }

    #[test]
    fn test_effective_temp_root_prefers_configured() {
        let config = ConverterConfig {
            temp_root: Some(PathBuf::from("/var/tmp/intake")),
            ..Default::default()
        };
        assert_eq!(config.effective_temp_root(), PathBuf::from("/var/tmp/intake"));
    }
}
