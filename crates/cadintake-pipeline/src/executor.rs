//! External converter execution.
//!
//! Runs the STEP-to-GLB converter as a child process with timeout,
//! cancellation and retry handling, then reads back its output.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cadintake_core::config::converter::ConverterConfig;

use crate::error::ConversionError;
use crate::locator::ConverterLocator;

/// Converts a CAD file on disk into GLB bytes.
#[async_trait]
pub trait MeshConverter: Send + Sync + Debug + 'static {
    /// Convert the file at `input`, honoring `cancel`.
    async fn convert(
        &self,
        input: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConversionError>;
}

/// [`MeshConverter`] backed by the external converter executable.
///
/// Invoked as `<exe> <input> <output>`; exit code 0 plus an output file
/// of at least `min_output_bytes` counts as success.
#[derive(Debug, Clone)]
pub struct SubprocessConverter {
    locator: ConverterLocator,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
    min_output_bytes: u64,
}

impl SubprocessConverter {
    /// Create a converter that discovers its executable from configuration.
    pub fn new(config: &ConverterConfig) -> Self {
        Self::with_locator(config, ConverterLocator::new(config.clone()))
    }

    /// Create a converter using an explicit locator.
    pub fn with_locator(config: &ConverterConfig, locator: ConverterLocator) -> Self {
        Self {
            locator,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            min_output_bytes: config.min_output_bytes,
        }
    }

    /// The locator used to find the executable.
    pub fn locator(&self) -> &ConverterLocator {
        &self.locator
    }

    /// Run one attempt: spawn, race completion against timeout and cancellation.
    async fn run_once(
        &self,
        exe: &Path,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), ConversionError> {
        let mut cmd = Command::new(exe);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            converter = %exe.display(),
            input = %input.display(),
            output = %output.display(),
            timeout_s = self.timeout.as_secs(),
            "Spawning converter process"
        );

        let start = Instant::now();
        let child = cmd.spawn()?;

        // Dropping the output future drops the child, and kill_on_drop kills it.
        tokio::select! {
            result = child.wait_with_output() => {
                let out = result?;
                let elapsed_ms = start.elapsed().as_millis() as u64;
                let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&out.stderr).into_owned();

                if !stderr.is_empty() {
                    debug!(stderr = %stderr, "Converter stderr output");
                }

                if out.status.success() {
                    info!(elapsed_ms, "Converter completed");
                    return Ok(());
                }

                match out.status.code() {
                    Some(code) => {
                        error!(code, elapsed_ms, stderr = %stderr, "Converter failed");
                        Err(ConversionError::ConverterFailed { code, stdout, stderr })
                    }
                    None => {
                        error!(elapsed_ms, "Converter terminated by signal");
                        Err(ConversionError::ConverterKilled)
                    }
                }
            }
            _ = tokio::time::sleep(self.timeout) => {
                error!(timeout_s = self.timeout.as_secs(), "Converter timed out, killing");
                Err(ConversionError::ConverterTimeout {
                    timeout_seconds: self.timeout.as_secs(),
                })
            }
            _ = cancel.cancelled() => {
                info!("Conversion cancelled, killing converter");
                Err(ConversionError::Cancelled)
            }
        }
    }

    /// Read the output file, enforcing the minimum size.
    async fn read_output(&self, output: &Path) -> Result<Vec<u8>, ConversionError> {
        let size = match tokio::fs::metadata(output).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if size < self.min_output_bytes {
            return Err(ConversionError::EmptyOutput {
                path: output.to_path_buf(),
                size,
            });
        }
        Ok(tokio::fs::read(output).await?)
    }
}

/// Output path written next to the input.
fn output_path_for(input: &Path) -> PathBuf {
    input.with_extension("glb")
}

#[async_trait]
impl MeshConverter for SubprocessConverter {
    async fn convert(
        &self,
        input: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConversionError> {
        let resolved = self.locator.resolve();
        if !resolved.path.is_file() {
            return Err(ConversionError::ConverterNotFound {
                path: resolved.path,
            });
        }

        let output = output_path_for(input);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if cancel.is_cancelled() {
                return Err(ConversionError::Cancelled);
            }

            if attempt > 0 {
                info!(attempt, max = self.max_retries, "Retrying converter");
                tokio::select! {
                    _ = tokio::time::sleep(self.retry_delay) => {}
                    _ = cancel.cancelled() => return Err(ConversionError::Cancelled),
                }
            }

            let result = match self.run_once(&resolved.path, input, &output, cancel).await {
                Ok(()) => self.read_output(&output).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(glb) => return Ok(glb),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "Converter attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ConversionError::ConverterKilled))
    }
}
