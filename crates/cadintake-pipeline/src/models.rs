//! Domain models: file types, detection results, STEP parse results.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::codes;

// ---------------------------------------------------------------------------
// Extension map macro
// ---------------------------------------------------------------------------

macro_rules! define_file_types {
    ($($variant:ident => $ext:literal),* $(,)?) => {
        static EXTENSION_MAP: LazyLock<HashMap<&'static str, SolidModelFileType>> =
            LazyLock::new(|| HashMap::from([$(($ext, SolidModelFileType::$variant),)*]));
    };
}

define_file_types! {
    Step   => "step",
    Stp    => "stp",
    Iges   => "igs",
    Iges   => "iges",
    SldPrt => "sldprt",
    SldAsm => "sldasm",
    Stl    => "stl",
}

/// Solid-model file types known to the intake pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolidModelFileType {
    /// STEP (.step)
    Step,
    /// STEP short extension (.stp)
    Stp,
    /// IGES (.igs / .iges)
    Iges,
    /// SolidWorks Part (.sldprt)
    SldPrt,
    /// SolidWorks Assembly (.sldasm)
    SldAsm,
    /// Stereolithography (.stl)
    Stl,
    /// Unrecognized by both content and extension
    Unknown,
}

impl SolidModelFileType {
    /// Look up a type by extension, with or without a leading dot.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        EXTENSION_MAP.get(ext.as_str()).copied()
    }

    /// Returns `true` for the STEP family.
    pub fn is_step_family(&self) -> bool {
        matches!(self, Self::Step | Self::Stp)
    }

    /// Returns `true` if the converter can turn this type into a mesh.
    pub fn is_supported_for_rendering(&self) -> bool {
        self.is_step_family() || matches!(self, Self::Stl)
    }

    /// Lowercase name used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Stp => "stp",
            Self::Iges => "iges",
            Self::SldPrt => "sldprt",
            Self::SldAsm => "sldasm",
            Self::Stl => "stl",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SolidModelFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What decided a detection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    /// A content signature matched.
    Content,
    /// Content was inconclusive; the extension matched.
    Extension,
    /// Neither content nor extension matched.
    Unknown,
}

/// Outcome of classifying a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// The detected type.
    pub file_type: SolidModelFileType,
    /// How the type was decided.
    pub detection_source: DetectionSource,
    /// Whether the type can be converted for preview.
    pub is_supported_for_rendering: bool,
    /// Lowercase extension with a leading dot, empty when absent.
    pub normalized_extension: String,
}

impl DetectionResult {
    /// A result decided by a content signature.
    pub fn from_content(file_type: SolidModelFileType, normalized_extension: String) -> Self {
        Self::build(file_type, DetectionSource::Content, normalized_extension)
    }

    /// A result decided by the file extension.
    pub fn from_extension(file_type: SolidModelFileType, normalized_extension: String) -> Self {
        Self::build(file_type, DetectionSource::Extension, normalized_extension)
    }

    /// An unrecognized file.
    pub fn unknown(normalized_extension: String) -> Self {
        Self::build(
            SolidModelFileType::Unknown,
            DetectionSource::Unknown,
            normalized_extension,
        )
    }

    fn build(
        file_type: SolidModelFileType,
        detection_source: DetectionSource,
        normalized_extension: String,
    ) -> Self {
        Self {
            file_type,
            detection_source,
            is_supported_for_rendering: file_type.is_supported_for_rendering(),
            normalized_extension,
        }
    }

    /// Returns `true` unless the type is [`SolidModelFileType::Unknown`].
    pub fn is_known_type(&self) -> bool {
        self.file_type != SolidModelFileType::Unknown
    }
}

/// Closed set of STEP parse failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepErrorCode {
    /// Container markers missing or out of order.
    InvalidStepHeader,
    /// No solid or surface entity in the data section.
    UnsupportedStepEntities,
}

impl StepErrorCode {
    /// The wire string for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidStepHeader => codes::INVALID_STEP_HEADER,
            Self::UnsupportedStepEntities => codes::UNSUPPORTED_STEP_ENTITIES,
        }
    }

    /// The diagnostics category this failure belongs to.
    pub fn failure_category(&self) -> FailureCategory {
        match self {
            Self::InvalidStepHeader => FailureCategory::Header,
            Self::UnsupportedStepEntities => FailureCategory::Body,
        }
    }
}

impl fmt::Display for StepErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the pipeline an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCategory {
    /// STEP container structure.
    Header,
    /// STEP data section content.
    Body,
    /// The external converter.
    Conversion,
    /// The artifact cache.
    Cache,
}

impl FailureCategory {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Body => "body",
            Self::Conversion => "conversion",
            Self::Cache => "cache",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural summary of a STEP payload.
///
/// `is_success` implies `has_solids || has_surfaces`, and `error_code` is
/// present exactly when `is_success` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepParseResult {
    /// Whether the payload is a usable STEP file.
    pub is_success: bool,
    /// Failure code, present iff `!is_success`.
    pub error_code: Option<StepErrorCode>,
    /// Human-readable outcome.
    pub message: String,
    /// Number of entity instances in the data section.
    pub entity_count: usize,
    /// Entity type name to occurrence count.
    pub distinct_entity_types: BTreeMap<String, usize>,
    /// Occurrences of solid entity types.
    pub solid_entity_count: usize,
    /// Occurrences of surface entity types.
    pub surface_entity_count: usize,
    /// `solid_entity_count > 0`.
    pub has_solids: bool,
    /// `surface_entity_count > 0`.
    pub has_surfaces: bool,
}

impl StepParseResult {
    /// A failed parse with no census.
    pub fn failure(code: StepErrorCode, message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            error_code: Some(code),
            message: message.into(),
            entity_count: 0,
            distinct_entity_types: BTreeMap::new(),
            solid_entity_count: 0,
            surface_entity_count: 0,
            has_solids: false,
            has_surfaces: false,
        }
    }

    /// Build a result from an entity census, deciding success from the counts.
    pub fn from_census(
        entity_count: usize,
        distinct_entity_types: BTreeMap<String, usize>,
        solid_entity_count: usize,
        surface_entity_count: usize,
    ) -> Self {
        let has_solids = solid_entity_count > 0;
        let has_surfaces = surface_entity_count > 0;
        let is_success = has_solids || has_surfaces;

        let (error_code, message) = if is_success {
            (None, "STEP structure validated.".to_string())
        } else if entity_count == 0 {
            (
                Some(StepErrorCode::UnsupportedStepEntities),
                "DATA section does not contain parseable STEP entities.".to_string(),
            )
        } else {
            (
                Some(StepErrorCode::UnsupportedStepEntities),
                "STEP file contains entities, but no supported surface or solid geometry entities."
                    .to_string(),
            )
        };

        Self {
            is_success,
            error_code,
            message,
            entity_count,
            distinct_entity_types,
            solid_entity_count,
            surface_entity_count,
            has_solids,
            has_surfaces,
        }
    }

    /// The failure code as a wire string.
    pub fn error_code_str(&self) -> Option<&'static str> {
        self.error_code.map(|c| c.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup() {
        assert_eq!(
            SolidModelFileType::from_extension(".STEP"),
            Some(SolidModelFileType::Step)
        );
        assert_eq!(
            SolidModelFileType::from_extension("stp"),
            Some(SolidModelFileType::Stp)
        );
        assert_eq!(
            SolidModelFileType::from_extension("iges"),
            Some(SolidModelFileType::Iges)
        );
        assert_eq!(SolidModelFileType::from_extension(".x_t"), None);
    }

    #[test]
    fn test_rendering_support() {
        assert!(SolidModelFileType::Step.is_supported_for_rendering());
        assert!(SolidModelFileType::Stp.is_supported_for_rendering());
        assert!(SolidModelFileType::Stl.is_supported_for_rendering());
        assert!(!SolidModelFileType::SldPrt.is_supported_for_rendering());
        assert!(!SolidModelFileType::Iges.is_supported_for_rendering());
        assert!(!SolidModelFileType::Unknown.is_supported_for_rendering());
    }

    #[test]
    fn test_error_code_serializes_kebab_case() {
        let json = serde_json::to_string(&StepErrorCode::InvalidStepHeader).expect("serialize");
        assert_eq!(json, "\"invalid-step-header\"");
    }

    #[test]
    fn test_census_without_geometry_fails() {
        let mut types = BTreeMap::new();
        types.insert("PERSON".to_string(), 1);
        let result = StepParseResult::from_census(1, types, 0, 0);
        assert!(!result.is_success);
        assert_eq!(result.error_code, Some(StepErrorCode::UnsupportedStepEntities));
    }

    #[test]
    fn test_census_with_surfaces_succeeds() {
        let result = StepParseResult::from_census(2, BTreeMap::new(), 0, 2);
        assert!(result.is_success);
        assert!(result.error_code.is_none());
        assert!(result.has_surfaces && !result.has_solids);
    }
}
