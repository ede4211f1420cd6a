//! STEP-to-GLB converter discovery.
//!
//! Locates the converter executable by checking, in order:
//! 1. The override environment variable (returned verbatim, unchecked)
//! 2. An explicitly configured executable path
//! 3. Conventional `Tools/` folders around the application directory
//!
//! When no candidate exists the first candidate is returned, so callers
//! always get a deterministic path to report. The locator never spawns
//! the converter.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use cadintake_core::config::converter::ConverterConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// How the converter path was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Taken from the override environment variable.
    Environment,
    /// Taken from `converter.executable_path`.
    Configured,
    /// An existing search candidate.
    Candidate,
    /// No candidate exists; the first candidate is reported.
    Fallback,
}

/// A resolved converter location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConverter {
    /// Path to the converter executable.
    pub path: PathBuf,
    /// How the path was found.
    pub method: ResolutionMethod,
}

/// Converter discovery engine.
#[derive(Debug, Clone)]
pub struct ConverterLocator {
    config: ConverterConfig,
    base_dir: PathBuf,
}

impl ConverterLocator {
    /// Create a locator searching around the running executable's directory.
    pub fn new(config: ConverterConfig) -> Self {
        Self::with_base_dir(config, application_base_dir())
    }

    /// Create a locator searching around an explicit base directory.
    pub fn with_base_dir(config: ConverterConfig, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            base_dir: base_dir.into(),
        }
    }

    /// The directory the candidate search starts from.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve the converter path against the process environment.
    pub fn resolve_converter_path(&self) -> PathBuf {
        self.resolve().path
    }

    /// Resolve the converter against the process environment, reporting how.
    pub fn resolve(&self) -> ResolvedConverter {
        self.resolve_with(|name| std::env::var_os(name))
    }

    /// Resolve using `lookup` in place of the process environment.
    pub fn resolve_with<F>(&self, lookup: F) -> ResolvedConverter
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let overridden = lookup(&self.config.override_env_var)
            .filter(|value| !value.to_string_lossy().trim().is_empty());
        if let Some(value) = overridden {
            info!(
                var = %self.config.override_env_var,
                path = %value.to_string_lossy(),
                "Using converter from environment override"
            );
            return ResolvedConverter {
                path: PathBuf::from(value),
                method: ResolutionMethod::Environment,
            };
        }

        if let Some(path) = &self.config.executable_path {
            debug!(path = %path.display(), "Using configured converter path");
            return ResolvedConverter {
                path: path.clone(),
                method: ResolutionMethod::Configured,
            };
        }

        let candidates = self.get_converter_path_candidates(&self.base_dir);
        if let Some(found) = candidates.iter().find(|c| c.is_file()) {
            info!(path = %found.display(), "Found converter in search candidates");
            return ResolvedConverter {
                path: found.clone(),
                method: ResolutionMethod::Candidate,
            };
        }

        debug!(
            searched = candidates.len(),
            base = %self.base_dir.display(),
            "No converter candidate exists, reporting the first"
        );
        ResolvedConverter {
            path: candidates.into_iter().next().unwrap_or_default(),
            method: ResolutionMethod::Fallback,
        }
    }

    /// Candidate converter paths around `base`, closest first.
    ///
    /// For `base` and each of its first `ancestor_depth` ancestors, every
    /// relative path is tried both directly and below the application
    /// folder. Duplicates are removed case-insensitively.
    pub fn get_converter_path_candidates(&self, base: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for dir in base.ancestors().take(self.config.ancestor_depth + 1) {
            for rel in &self.config.candidate_relative_paths {
                for path in [dir.join(rel), dir.join(&self.config.app_folder_name).join(rel)] {
                    if seen.insert(path.to_string_lossy().to_lowercase()) {
                        candidates.push(path);
                    }
                }
            }
        }

        candidates
    }
}

/// Directory of the running executable, falling back to the working directory.
pub fn application_base_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
