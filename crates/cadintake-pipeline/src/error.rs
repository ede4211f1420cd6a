//! Error type for converter invocation.
//!
//! Every variant carries a stable, kebab-case code (see [`codes`]) that is
//! stored in diagnostics entries and compared as data by callers.

use std::path::PathBuf;

use cadintake_core::error::{AppError, ErrorKind};
use thiserror::Error;

/// Stable outcome codes recorded in diagnostics and preview outcomes.
pub mod codes {
    /// The STEP container markers are missing or out of order.
    pub const INVALID_STEP_HEADER: &str = "invalid-step-header";
    /// The STEP data section has no solid or surface geometry.
    pub const UNSUPPORTED_STEP_ENTITIES: &str = "unsupported-step-entities";
    /// The file is not a renderable solid-model type.
    pub const UNSUPPORTED_FILE_TYPE: &str = "unsupported-file-type";
    /// The converter executable does not exist.
    pub const CONVERTER_NOT_FOUND: &str = "converter-not-found";
    /// The converter exited unsuccessfully.
    pub const CONVERTER_FAILED: &str = "converter-failed";
    /// The converter exceeded its time budget.
    pub const CONVERTER_TIMEOUT: &str = "converter-timeout";
    /// The converter succeeded but wrote no usable output.
    pub const CONVERTER_EMPTY_OUTPUT: &str = "converter-empty-output";
    /// The caller cancelled the conversion.
    pub const CONVERSION_CANCELLED: &str = "conversion-cancelled";
    /// The artifact cache failed.
    pub const CACHE_FAILURE: &str = "cache-failure";
    /// Local file I/O around the conversion failed.
    pub const IO_FAILURE: &str = "io-failure";
    /// The preview task panicked before producing an outcome.
    pub const PREVIEW_ABORTED: &str = "preview-aborted";
}

/// Errors raised while converting a file to a mesh.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Converter executable not found at the resolved path.
    #[error("Converter executable not found: {path}")]
    ConverterNotFound {
        /// The resolved path that does not exist.
        path: PathBuf,
    },

    /// Converter exited with a non-zero status.
    #[error("Converter exited with code {code}: {stderr}")]
    ConverterFailed {
        /// The exit code.
        code: i32,
        /// Captured stdout output.
        stdout: String,
        /// Captured stderr output.
        stderr: String,
    },

    /// Converter was terminated by a signal.
    #[error("Converter was killed (signal termination)")]
    ConverterKilled,

    /// Converter did not finish in time.
    #[error("Converter timed out after {timeout_seconds}s")]
    ConverterTimeout {
        /// The timeout that was exceeded.
        timeout_seconds: u64,
    },

    /// Output missing or below the minimum size.
    #[error("Converter output is missing or too small ({size} bytes): {path}")]
    EmptyOutput {
        /// Expected output path.
        path: PathBuf,
        /// Observed size in bytes (0 when missing).
        size: u64,
    },

    /// Conversion was cancelled via cancellation token.
    #[error("Conversion was cancelled")]
    Cancelled,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// The stable outcome code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConverterNotFound { .. } => codes::CONVERTER_NOT_FOUND,
            Self::ConverterFailed { .. } | Self::ConverterKilled => codes::CONVERTER_FAILED,
            Self::ConverterTimeout { .. } => codes::CONVERTER_TIMEOUT,
            Self::EmptyOutput { .. } => codes::CONVERTER_EMPTY_OUTPUT,
            Self::Cancelled => codes::CONVERSION_CANCELLED,
            Self::Io(_) => codes::IO_FAILURE,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled | Self::ConverterTimeout { .. } | Self::ConverterNotFound { .. }
        )
    }
}

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Cancelled => AppError::cancelled(err.to_string()),
            ConversionError::ConverterNotFound { .. } => AppError::not_found(err.to_string()),
            ConversionError::Io(io) => {
                AppError::with_source(ErrorKind::Storage, format!("IO error: {io}"), io)
            }
            _ => AppError::external(err.to_string()),
        }
    }
}
