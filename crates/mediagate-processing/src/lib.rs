//! Mediagate Processing Library
//!
//! The untrusted-file admission pipeline and the transcoding engine:
//! - Signature detection and structural validation ([`validator`])
//! - Heuristic threat scanning with loadable rule sets ([`scanner`])
//! - The phase-tagged admission state machine ([`pipeline`])
//! - Raster and document transcoding ([`transcode`], [`compression`])
//! - Target-service suitability lookup ([`suitability`])
//!
//! PDF pages are rasterised through PDFium only with the `pdfium` feature.
//! Without it [`default_renderer`] is an [`UnavailableRenderer`], so every
//! document transcode ends in [`DocumentOutcome::FallbackPreserved`].
//!
//! [`DocumentOutcome::FallbackPreserved`]: mediagate_core::DocumentOutcome::FallbackPreserved

pub mod compression;
pub mod filename;
pub mod pipeline;
pub mod scanner;
pub mod signature;
pub mod suitability;
pub mod transcode;
pub mod validator;

pub use filename::suggest_output_filename;
pub use pipeline::{
    AdmissionPipeline, Decision, FixedDecision, Phase, PhaseEvent, PhaseObserver,
    PipelineOutput, RecordingObserver, TracingObserver, WarningDecision,
};
pub use scanner::{RuleDocument, RuleKind, RuleSet, ScanRules, ThreatScanner};
pub use signature::SignatureCatalog;
pub use suitability::TargetCatalog;
pub use transcode::{
    default_renderer, fit_dimensions, DocumentTranscoder, MediaTranscoder, NoProgress,
    PageRenderer, ProgressSink, RasterTranscoder, TranscodeSession, UnavailableRenderer,
};
pub use validator::{StructuralValidator, ValidationError};

#[cfg(feature = "pdfium")]
pub use transcode::PdfiumRenderer;
