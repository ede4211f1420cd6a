//! Preview pipeline: bytes in, cached GLB out.
//!
//! [`PreviewService::get_or_create_glb`] classifies the payload, validates
//! STEP structure, serves the cache by content hash and otherwise runs the
//! converter once per hash. Every computed outcome is recorded in the
//! [`DiagnosticsLog`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use cadintake_core::config::AppConfig;
use cadintake_core::traits::cache::ArtifactCache;

use crate::detect::FileTypeDetector;
use crate::diagnostics::{AttemptRecord, DiagnosticsLog, stack_trace_of};
use crate::error::{ConversionError, codes};
use crate::executor::MeshConverter;
use crate::metrics::{PreviewMetrics, PreviewMetricsSnapshot};
use crate::models::{DetectionResult, FailureCategory, StepParseResult};
use crate::step::StepStructuralParser;

/// Source tag recorded for preview attempts when the caller gives none.
pub const PREVIEW_SOURCE: &str = "preview";

/// Uppercase hex SHA-256 of `bytes`; the cache key for a payload.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(bytes))
}

/// Caller context carried into diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRequest {
    /// Where the payload came from, recorded verbatim.
    pub file_path: String,
    /// Subsystem tag for the diagnostics entry.
    pub source: String,
}

impl PreviewRequest {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            source: PREVIEW_SOURCE.to_string(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

impl Default for PreviewRequest {
    fn default() -> Self {
        Self::new("")
    }
}

/// Result of a preview request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewOutcome {
    pub content_hash: String,
    pub detection: DetectionResult,
    /// Present for STEP-family payloads.
    pub parse: Option<StepParseResult>,
    /// The GLB bytes on success.
    #[serde(skip)]
    pub glb: Option<Bytes>,
    pub glb_bytes: u64,
    /// Whether the GLB came from the cache.
    pub cache_hit: bool,
    pub error_code: Option<String>,
    pub failure_category: Option<FailureCategory>,
    pub message: String,
}

impl PreviewOutcome {
    /// Whether a GLB was produced.
    pub fn is_success(&self) -> bool {
        self.error_code.is_none() && self.glb.is_some()
    }

    fn success(
        content_hash: String,
        detection: DetectionResult,
        parse: Option<StepParseResult>,
        glb: Bytes,
        cache_hit: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            content_hash,
            detection,
            parse,
            glb_bytes: glb.len() as u64,
            glb: Some(glb),
            cache_hit,
            error_code: None,
            failure_category: None,
            message: message.into(),
        }
    }

    fn failure(
        content_hash: String,
        detection: DetectionResult,
        parse: Option<StepParseResult>,
        error_code: &str,
        failure_category: Option<FailureCategory>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            content_hash,
            detection,
            parse,
            glb: None,
            glb_bytes: 0,
            cache_hit: false,
            error_code: Some(error_code.to_string()),
            failure_category,
            message: message.into(),
        }
    }
}

type InFlight = Shared<BoxFuture<'static, PreviewOutcome>>;

/// Orchestrates detection, validation, caching and conversion.
///
/// Cloning is cheap; clones share the cache, converter, log and the
/// in-flight table.
#[derive(Clone)]
pub struct PreviewService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    detector: FileTypeDetector,
    parser: StepStructuralParser,
    cache: Arc<dyn ArtifactCache>,
    converter: Arc<dyn MeshConverter>,
    diagnostics: DiagnosticsLog,
    metrics: PreviewMetrics,
    temp_root: PathBuf,
    in_flight: DashMap<String, InFlight>,
}

/// Clears the in-flight slot when the computation task ends, panics included.
struct InFlightSlot {
    inner: Arc<ServiceInner>,
    hash: String,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.hash);
    }
}

/// Everything one computation needs, owned so it can outlive the caller.
struct PreviewJob {
    hash: String,
    bytes: Bytes,
    file_name: String,
    request: PreviewRequest,
    cancel: CancellationToken,
}

impl fmt::Debug for PreviewService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewService")
            .field("cache", &self.inner.cache.provider_type())
            .field("converter", &self.inner.converter)
            .field("temp_root", &self.inner.temp_root)
            .field("in_flight", &self.inner.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl PreviewService {
    pub fn new(
        config: &AppConfig,
        cache: Arc<dyn ArtifactCache>,
        converter: Arc<dyn MeshConverter>,
        diagnostics: DiagnosticsLog,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                detector: FileTypeDetector::new(&config.detection),
                parser: StepStructuralParser::new(),
                cache,
                converter,
                diagnostics,
                metrics: PreviewMetrics::new(),
                temp_root: config.converter.effective_temp_root(),
                in_flight: DashMap::new(),
            }),
        }
    }

    /// The log this service records into.
    pub fn diagnostics(&self) -> &DiagnosticsLog {
        &self.inner.diagnostics
    }

    pub fn metrics(&self) -> PreviewMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Number of distinct payloads currently being computed.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Produce a GLB for `bytes`, from the cache when possible.
    ///
    /// Concurrent calls with identical content share a single computation
    /// and receive its outcome; that computation observes the first
    /// caller's `file_name`, `request` and `cancel` token.
    ///
    /// The computation runs as its own task. Dropping this future stops the
    /// wait, not the work: the conversion still finishes, is cached and is
    /// recorded. Use `cancel` to stop it.
    #[instrument(skip(self, bytes, request, cancel), fields(size = bytes.len()))]
    pub async fn get_or_create_glb(
        &self,
        bytes: Bytes,
        file_name: &str,
        request: PreviewRequest,
        cancel: CancellationToken,
    ) -> PreviewOutcome {
        self.inner.metrics.record_request(bytes.len() as u64);
        let hash = content_hash(&bytes);

        let shared = match self.inner.in_flight.entry(hash.clone()) {
            Entry::Occupied(existing) => {
                debug!(hash = %hash, "Joining in-flight preview");
                self.inner.metrics.record_coalesced();
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let inner = Arc::clone(&self.inner);
                let job = PreviewJob {
                    hash: hash.clone(),
                    bytes,
                    file_name: file_name.to_string(),
                    request,
                    cancel,
                };
                let task = tokio::spawn(async move {
                    let _slot = InFlightSlot {
                        inner: Arc::clone(&inner),
                        hash: job.hash.clone(),
                    };
                    inner.run(job).await
                });
                let computation = async move {
                    match task.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(hash = %hash, error = %e, "Preview task aborted");
                            PreviewOutcome::failure(
                                hash,
                                DetectionResult::unknown(String::new()),
                                None,
                                codes::PREVIEW_ABORTED,
                                None,
                                format!("Preview computation did not complete: {e}"),
                            )
                        }
                    }
                }
                .boxed()
                .shared();
                slot.insert(computation.clone());
                computation
            }
        };

        shared.await
    }
}

impl ServiceInner {
    async fn run(&self, job: PreviewJob) -> PreviewOutcome {
        let detection = self.detector.detect(&job.bytes, Some(&job.file_name));

        if !detection.is_supported_for_rendering {
            self.metrics.record_rejected();
            let message = format!(
                "File type '{}' is not supported for rendering.",
                detection.file_type
            );
            self.record(
                &job,
                AttemptRecord::failure(&job.file_name, codes::UNSUPPORTED_FILE_TYPE)
                    .with_message(&message)
                    .with_details(format!(
                        "type={} source={:?} extension={}",
                        detection.file_type, detection.detection_source, detection.normalized_extension
                    )),
            );
            return PreviewOutcome::failure(
                job.hash,
                detection,
                None,
                codes::UNSUPPORTED_FILE_TYPE,
                None,
                message,
            );
        }

        let parse = if detection.file_type.is_step_family() {
            let parsed = self.parser.parse(&job.bytes);
            if let Some(code) = parsed.error_code {
                self.metrics.record_rejected();
                self.record(
                    &job,
                    AttemptRecord::failure(&job.file_name, code.as_str())
                        .with_category(code.failure_category())
                        .with_message(&parsed.message)
                        .with_details(census_details(&parsed)),
                );
                return PreviewOutcome::failure(
                    job.hash,
                    detection,
                    Some(parsed.clone()),
                    code.as_str(),
                    Some(code.failure_category()),
                    parsed.message,
                );
            }
            Some(parsed)
        } else {
            None
        };

        let cached = self.cache.try_get_glb(&job.hash, &job.cancel).await;
        match cached {
            Ok(Some(glb)) => {
                self.metrics.record_cache_hit(glb.len() as u64);
                info!(hash = %job.hash, size = glb.len(), "Preview served from cache");
                self.record(
                    &job,
                    AttemptRecord::success(&job.file_name)
                        .with_message("GLB served from cache.")
                        .with_details(format!("hash={} glb_bytes={}", job.hash, glb.len())),
                );
                return PreviewOutcome::success(job.hash, detection, parse, glb, true, "GLB served from cache.");
            }
            Ok(None) => self.metrics.record_cache_miss(),
            Err(e) if e.is_cancelled() => {
                self.metrics.record_conversion_cancelled();
                return self.cancelled(job, detection, parse);
            }
            Err(e) => {
                warn!(hash = %job.hash, error = %e, "Artifact cache read failed");
                self.record(
                    &job,
                    AttemptRecord::failure(&job.file_name, codes::CACHE_FAILURE)
                        .with_category(FailureCategory::Cache)
                        .with_message(e.to_string())
                        .with_details(format!("provider={} hash={}", self.cache.provider_type(), job.hash))
                        .with_stack_trace(stack_trace_of(&e)),
                );
                return PreviewOutcome::failure(
                    job.hash,
                    detection,
                    parse,
                    codes::CACHE_FAILURE,
                    Some(FailureCategory::Cache),
                    e.to_string(),
                );
            }
        }

        self.metrics.record_conversion_started();
        let started = Instant::now();
        let work_dir = self.temp_root.join(uuid::Uuid::now_v7().to_string());
        let converted = self
            .convert_in(&work_dir, &job.bytes, &detection, &job.cancel)
            .await;
        remove_work_dir(&work_dir).await;

        let glb = match converted {
            Ok(glb) => Bytes::from(glb),
            Err(ConversionError::Cancelled) => {
                self.metrics.record_conversion_cancelled();
                return self.cancelled(job, detection, parse);
            }
            Err(e) => {
                if matches!(e, ConversionError::ConverterTimeout { .. }) {
                    self.metrics.record_conversion_timed_out();
                } else {
                    self.metrics.record_conversion_failed();
                }
                warn!(hash = %job.hash, code = e.code(), error = %e, "Conversion failed");
                let mut record = AttemptRecord::failure(&job.file_name, e.code())
                    .with_category(FailureCategory::Conversion)
                    .with_message(e.to_string())
                    .with_stack_trace(stack_trace_of(&e));
                if let ConversionError::ConverterFailed { stdout, stderr, .. } = &e {
                    record = record.with_details(format!("stdout:\n{stdout}\nstderr:\n{stderr}"));
                }
                self.record(&job, record);
                return PreviewOutcome::failure(
                    job.hash,
                    detection,
                    parse,
                    e.code(),
                    Some(FailureCategory::Conversion),
                    e.to_string(),
                );
            }
        };

        let elapsed = started.elapsed();
        self.metrics
            .record_conversion_succeeded(elapsed, glb.len() as u64);

        if let Err(e) = self
            .cache
            .save_glb(&job.hash, glb.clone(), &job.file_name, &job.cancel)
            .await
        {
            warn!(hash = %job.hash, error = %e, "Failed to cache converted GLB");
        }

        info!(
            hash = %job.hash,
            size = glb.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Preview converted"
        );
        self.record(
            &job,
            AttemptRecord::success(&job.file_name)
                .with_message("GLB converted.")
                .with_details(format!(
                    "hash={} glb_bytes={} elapsed_ms={}",
                    job.hash,
                    glb.len(),
                    elapsed.as_millis()
                )),
        );
        PreviewOutcome::success(job.hash, detection, parse, glb, false, "GLB converted.")
    }

    /// Write the payload into `work_dir` and run the converter on it.
    async fn convert_in(
        &self,
        work_dir: &Path,
        bytes: &[u8],
        detection: &DetectionResult,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConversionError> {
        tokio::fs::create_dir_all(work_dir).await?;
        let input = work_dir.join(format!("input.{}", detection.file_type.as_str()));
        tokio::fs::write(&input, bytes).await?;
        self.converter.convert(&input, cancel).await
    }

    fn cancelled(
        &self,
        job: PreviewJob,
        detection: DetectionResult,
        parse: Option<StepParseResult>,
    ) -> PreviewOutcome {
        let message = ConversionError::Cancelled.to_string();
        self.record(
            &job,
            AttemptRecord::failure(&job.file_name, codes::CONVERSION_CANCELLED).with_message(&message),
        );
        PreviewOutcome::failure(
            job.hash,
            detection,
            parse,
            codes::CONVERSION_CANCELLED,
            None,
            message,
        )
    }

    fn record(&self, job: &PreviewJob, attempt: AttemptRecord) {
        self.diagnostics.record_attempt(
            attempt
                .with_path(&job.request.file_path)
                .with_size(job.bytes.len() as u64)
                .with_source(&job.request.source),
        );
    }
}

fn census_details(parsed: &StepParseResult) -> String {
    format!(
        "entities={} solids={} surfaces={} types={}",
        parsed.entity_count,
        parsed.solid_entity_count,
        parsed.surface_entity_count,
        parsed.distinct_entity_types.len()
    )
}

async fn remove_work_dir(work_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %work_dir.display(), error = %e, "Failed to remove preview work directory");
        }
    }
}
