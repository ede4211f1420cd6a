//! # CAD Intake Pipeline
//!
//! Classifies uploaded CAD exchange files, validates STEP structure,
//! drives the external STEP-to-GLB converter and records every attempt
//! in an observable diagnostics log.
//!
//! ## Converter discovery
//!
//! The converter executable is resolved by [`ConverterLocator`]: an
//! environment override first, then an explicitly configured path, then
//! a deterministic search of `Tools/` folders around the application
//! directory.

pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod locator;
pub mod metrics;
pub mod models;
pub mod preview;
pub mod step;

pub use detect::FileTypeDetector;
pub use diagnostics::{DiagnosticEvent, DiagnosticsLog, StepParsingDiagnosticEntry, Subscription};
pub use error::ConversionError;
pub use executor::{MeshConverter, SubprocessConverter};
pub use locator::{ConverterLocator, ResolutionMethod, ResolvedConverter};
pub use models::{
    DetectionResult, DetectionSource, FailureCategory, SolidModelFileType, StepErrorCode,
    StepParseResult,
};
pub use preview::{PreviewOutcome, PreviewRequest, PreviewService};
pub use step::StepStructuralParser;
