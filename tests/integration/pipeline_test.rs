//! End-to-end preview pipeline tests.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use cadintake_core::traits::cache::ArtifactCache;
use cadintake_pipeline::diagnostics::DiagnosticsLog;
use cadintake_pipeline::error::codes;
use cadintake_pipeline::preview::content_hash;
use cadintake_pipeline::{FailureCategory, PreviewRequest, SolidModelFileType};

use crate::helpers::{SOLID_STEP, TestApp};

#[tokio::test]
async fn test_step_preview_converts_then_hits_cache() {
    let app = TestApp::new().await;

    let first = app.preview(SOLID_STEP, "bracket.step").await;
    assert!(first.is_success(), "{first:?}");
    assert!(!first.cache_hit);
    assert_eq!(first.detection.file_type, SolidModelFileType::Step);
    assert!(first.parse.as_ref().is_some_and(|p| p.has_solids));

    let second = app.preview(SOLID_STEP, "bracket-copy.stp").await;
    assert!(second.cache_hit);
    assert_eq!(second.glb, first.glb);
    assert_eq!(app.converter.calls(), 1);
}

#[tokio::test]
async fn test_disk_cache_survives_restart() {
    let app = TestApp::new().await;
    let first = app.preview(SOLID_STEP, "bracket.step").await;
    assert!(first.is_success());

    let restarted = app.restart().await;
    let outcome = restarted
        .get_or_create_glb(
            Bytes::from_static(SOLID_STEP.as_bytes()),
            "bracket.step",
            PreviewRequest::default(),
            CancellationToken::new(),
        )
        .await;
    assert!(outcome.cache_hit);
    assert_eq!(app.converter.calls(), 1);
}

#[tokio::test]
async fn test_cached_artifact_is_keyed_by_content_hash() {
    let app = TestApp::new().await;
    let outcome = app.preview(SOLID_STEP, "bracket.step").await;
    assert_eq!(outcome.content_hash, content_hash(SOLID_STEP.as_bytes()));

    let cache = cadintake_cache::DiskArtifactCache::new(&app.config.cache.root)
        .await
        .expect("open cache");
    assert!(cache.contains(&outcome.content_hash).await.expect("contains"));
    let meta = cache
        .metadata(&outcome.content_hash)
        .await
        .expect("metadata")
        .expect("sidecar present");
    assert_eq!(meta.origin_file_name, "bracket.step");
}

#[tokio::test]
async fn test_diagnostics_journal_survives_restart() {
    let app = TestApp::new().await;
    app.preview(SOLID_STEP, "bracket.step").await;
    app.preview("solid x\nendsolid x\n", "part.dat").await;
    app.preview("ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n#1=PERSON('a');\nENDSEC;\nEND-ISO-10303-21;\n", "admin.step").await;

    let reopened = DiagnosticsLog::from_config(&app.config.diagnostics);
    let entries = reopened.get_entries();
    assert_eq!(entries.len(), 3);
    assert!(entries.windows(2).all(|w| w[0].sequence < w[1].sequence));

    assert!(entries[0].is_success);
    assert_eq!(entries[0].file_path, "/uploads/bracket.step");

    // ASCII STL is recognized by content regardless of extension.
    assert!(entries[1].is_success);

    assert_eq!(entries[2].error_code.as_deref(), Some(codes::UNSUPPORTED_STEP_ENTITIES));
    assert_eq!(entries[2].failure_category, Some(FailureCategory::Body));
}

#[tokio::test]
async fn test_known_but_unrenderable_type() {
    let app = TestApp::new().await;
    let outcome = app.preview("not really iges", "part.IGES").await;

    assert_eq!(outcome.detection.file_type, SolidModelFileType::Iges);
    assert!(!outcome.detection.is_supported_for_rendering);
    assert_eq!(outcome.error_code.as_deref(), Some(codes::UNSUPPORTED_FILE_TYPE));
    assert_eq!(app.converter.calls(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn test_subprocess_converter_end_to_end() {
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    use cadintake_cache::CacheManager;
    use cadintake_pipeline::{PreviewService, SubprocessConverter};

    let app = TestApp::new().await;
    let exe = app.dir.path().join("step2glb.sh");
    std::fs::write(&exe, "#!/bin/sh\nprintf 'glTF' > \"$2\"\n").expect("write script");
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let mut config = app.config.clone();
    config.converter.override_env_var = "CADINTAKE_INTEGRATION_UNSET_OVERRIDE".to_string();
    config.converter.executable_path = Some(exe);

    let cache = CacheManager::new(&config.cache).await.expect("cache");
    let service = PreviewService::new(
        &config,
        Arc::new(cache),
        Arc::new(SubprocessConverter::new(&config.converter)),
        DiagnosticsLog::new(),
    );

    let outcome = service
        .get_or_create_glb(
            Bytes::from_static(SOLID_STEP.as_bytes()),
            "bracket.step",
            PreviewRequest::default(),
            CancellationToken::new(),
        )
        .await;
    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(outcome.glb.as_deref(), Some(&b"glTF"[..]));

    let work_root = config.converter.effective_temp_root();
    assert_eq!(std::fs::read_dir(work_root).expect("work root").count(), 0);
}

#[tokio::test]
async fn test_missing_converter_is_conversion_failure() {
    use std::sync::Arc;

    use cadintake_cache::CacheManager;
    use cadintake_pipeline::{PreviewService, SubprocessConverter};

    let app = TestApp::new().await;
    let mut config = app.config.clone();
    config.converter.override_env_var = "CADINTAKE_INTEGRATION_UNSET_OVERRIDE".to_string();
    config.converter.executable_path = Some(app.dir.path().join("missing-converter"));

    let cache = CacheManager::new(&config.cache).await.expect("cache");
    let service = PreviewService::new(
        &config,
        Arc::new(cache),
        Arc::new(SubprocessConverter::new(&config.converter)),
        DiagnosticsLog::new(),
    );

    let outcome = service
        .get_or_create_glb(
            Bytes::from_static(SOLID_STEP.as_bytes()),
            "bracket.step",
            PreviewRequest::default(),
            CancellationToken::new(),
        )
        .await;
    assert_eq!(outcome.error_code.as_deref(), Some(codes::CONVERTER_NOT_FOUND));
    assert_eq!(outcome.failure_category, Some(FailureCategory::Conversion));
    assert_eq!(service.diagnostics().len(), 1);
}
