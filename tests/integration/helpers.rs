//! Shared test helpers for integration tests.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use cadintake_cache::CacheManager;
use cadintake_core::config::AppConfig;
use cadintake_pipeline::diagnostics::DiagnosticsLog;
use cadintake_pipeline::{ConversionError, MeshConverter, PreviewOutcome, PreviewRequest, PreviewService};

/// A solid STEP part with one B-rep and one face.
pub const SOLID_STEP: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('Bracket'),'2;1');
FILE_NAME('bracket.step','2024-01-01T00:00:00',(''),(''),'','','');
ENDSEC;
DATA;
#10=MANIFOLD_SOLID_BREP('SOLID',#40);
#11=ADVANCED_FACE('',(),#50,.T.);
ENDSEC;
END-ISO-10303-21;
";

/// Converter double that records calls and echoes a fixed GLB.
#[derive(Debug, Default)]
pub struct FakeConverter {
    pub calls: AtomicUsize,
}

impl FakeConverter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeshConverter for FakeConverter {
    async fn convert(
        &self,
        input: &Path,
        _cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let source = tokio::fs::read(input).await?;
        let mut glb = b"glTF".to_vec();
        glb.extend_from_slice(&(source.len() as u32).to_le_bytes());
        Ok(glb)
    }
}

/// Test application context rooted in a temporary directory.
pub struct TestApp {
    /// Keeps the cache, journal and work directories alive.
    pub dir: TempDir,
    /// Application config pointing into `dir`.
    pub config: AppConfig,
    pub converter: Arc<FakeConverter>,
    pub service: PreviewService,
}

impl TestApp {
    /// Create a test application with a disk cache and a journaled log.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = AppConfig::default();
        config.cache.provider = "disk".to_string();
        config.cache.root = dir.path().join("cache");
        config.converter.temp_root = Some(dir.path().join("work"));
        config.diagnostics.journal_path = Some(dir.path().join("diagnostics.jsonl"));

        let converter = Arc::new(FakeConverter::default());
        let service = Self::build_service(&config, converter.clone()).await;

        Self {
            dir,
            config,
            converter,
            service,
        }
    }

    /// A fresh service over the same directories, as after a restart.
    pub async fn restart(&self) -> PreviewService {
        Self::build_service(&self.config, self.converter.clone()).await
    }

    async fn build_service(config: &AppConfig, converter: Arc<FakeConverter>) -> PreviewService {
        let cache = CacheManager::new(&config.cache)
            .await
            .expect("Failed to init cache");
        PreviewService::new(
            config,
            Arc::new(cache),
            converter,
            DiagnosticsLog::from_config(&config.diagnostics),
        )
    }

    /// Run a preview with a default request.
    pub async fn preview(&self, content: &str, file_name: &str) -> PreviewOutcome {
        self.service
            .get_or_create_glb(
                Bytes::copy_from_slice(content.as_bytes()),
                file_name,
                PreviewRequest::new(format!("/uploads/{file_name}")),
                CancellationToken::new(),
            )
            .await
    }
}
