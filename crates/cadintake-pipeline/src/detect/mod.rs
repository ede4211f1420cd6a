//! Solid-model file type detection.
//!
//! Content is sniffed first through an ordered chain of classifiers; the
//! file extension is consulted only when no classifier matches. Detection
//! never fails: anything unrecognized is reported as `Unknown`.

pub mod sniff;

use std::path::Path;

use cadintake_core::config::detection::DetectionConfig;

use crate::models::{DetectionResult, SolidModelFileType};

pub use sniff::Sniff;

/// A pure content classifier. Returns a type when its signature matches.
pub type Classifier = fn(&Sniff<'_>) -> Option<SolidModelFileType>;

/// The built-in classifiers, in priority order.
pub const DEFAULT_CLASSIFIERS: &[Classifier] = &[sniff::classify_step, sniff::classify_ascii_stl];

/// Default size of the head and tail sniff windows.
pub const DEFAULT_SNIFF_WINDOW: usize = 4096;

/// Classifies raw bytes (plus an optional file name) into a file type.
#[derive(Debug, Clone)]
pub struct FileTypeDetector {
    window: usize,
    classifiers: Vec<Classifier>,
}

impl FileTypeDetector {
    /// Create a detector from configuration.
    pub fn new(config: &DetectionConfig) -> Self {
        Self::with_window(config.sniff_window_bytes)
    }

    /// Create a detector with an explicit sniff window size.
    pub fn with_window(window: usize) -> Self {
        Self {
            window: window.max(1),
            classifiers: DEFAULT_CLASSIFIERS.to_vec(),
        }
    }

    /// Append a classifier to the end of the chain.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifiers.push(classifier);
        self
    }

    /// Classify `bytes`, falling back to the extension of `file_name`.
    pub fn detect(&self, bytes: &[u8], file_name: Option<&str>) -> DetectionResult {
        let extension = normalize_extension(file_name);
        let sniff = Sniff::new(bytes, self.window);

        if let Some(file_type) = self.classifiers.iter().find_map(|classify| classify(&sniff)) {
            return DetectionResult::from_content(file_type, extension);
        }

        match SolidModelFileType::from_extension(&extension) {
            Some(file_type) => DetectionResult::from_extension(file_type, extension),
            None => DetectionResult::unknown(extension),
        }
    }
}

impl Default for FileTypeDetector {
    fn default() -> Self {
        Self::with_window(DEFAULT_SNIFF_WINDOW)
    }
}

/// Lowercase extension of `file_name` with a leading dot, or empty.
pub fn normalize_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name.trim()).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}
