//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section; every section has defaults so an absent file is valid.

pub mod cache;
pub mod converter;
pub mod detection;
pub mod diagnostics;
pub mod logging;

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::cache::CacheConfig;
use self::converter::ConverterConfig;
use self::detection::DetectionConfig;
use self::diagnostics::DiagnosticsConfig;
use self::logging::LoggingConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (base file + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Artifact cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Mesh converter settings.
    #[serde(default)]
    pub converter: ConverterConfig,
    /// Diagnostics log settings.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    /// Content sniffing settings.
    #[serde(default)]
    pub detection: DetectionConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Merges the given file with an environment-specific overlay
    /// (`config/{CADINTAKE_ENV}.toml`) and environment variables prefixed
    /// with `CADINTAKE__`, e.g. `CADINTAKE__CACHE__ROOT`.
    pub fn load(config_file: &str) -> Result<Self, AppError> {
        let env = std::env::var("CADINTAKE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name(config_file).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CADINTAKE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate the sections that carry range rules.
    pub fn validate(&self) -> Result<(), AppError> {
        self.converter.validate()?;
        if self.detection.sniff_window_bytes == 0 {
            return Err(AppError::configuration(
                "detection.sniff_window_bytes must be greater than zero",
            ));
        }
        Ok(())
    }
}
