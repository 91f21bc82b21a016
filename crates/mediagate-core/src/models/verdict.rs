//! Admission verdicts

use serde::{Deserialize, Serialize};

use crate::models::AcceptedMediaType;

/// Result of the decode probe run on accepted images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageProbe {
    pub width: u32,
    pub height: u32,
}

/// Outcome of structural validation. Produced fresh per input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub media_type: Option<AcceptedMediaType>,
    pub rejection_reason: Option<String>,
    /// Dimensions reported by the decode probe (images only).
    pub image_probe: Option<ImageProbe>,
    /// Set when the caller-declared type disagrees with the signature. Advisory only.
    pub declared_type_mismatch: Option<String>,
}

impl ValidationVerdict {
    pub fn accepted(media_type: AcceptedMediaType) -> Self {
        Self {
            accepted: true,
            media_type: Some(media_type),
            rejection_reason: None,
            image_probe: None,
            declared_type_mismatch: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            media_type: None,
            rejection_reason: Some(reason.into()),
            image_probe: None,
            declared_type_mismatch: None,
        }
    }

    pub fn with_image_probe(mut self, probe: Option<ImageProbe>) -> Self {
        self.image_probe = probe;
        self
    }

    pub fn with_declared_type_mismatch(mut self, note: Option<String>) -> Self {
        self.declared_type_mismatch = note;
        self
    }
}

/// Outcome of the heuristic threat scan.
///
/// `safe` is false exactly when at least one threat was recorded; warnings never
/// affect it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub safe: bool,
    pub threats: Vec<String>,
    pub warnings: Vec<String>,
}

impl ScanVerdict {
    pub fn from_findings(threats: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            safe: threats.is_empty(),
            threats,
            warnings,
        }
    }
}

/// Single value returned by the admission pipeline.
///
/// `scan` is `None` whenever validation rejected the file: the scanner is never
/// run on structurally invalid input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionResult {
    pub validation: ValidationVerdict,
    pub scan: Option<ScanVerdict>,
    pub media_type: Option<AcceptedMediaType>,
}

impl AdmissionResult {
    pub fn rejected(validation: ValidationVerdict) -> Self {
        Self {
            validation,
            scan: None,
            media_type: None,
        }
    }

    pub fn scanned(validation: ValidationVerdict, scan: ScanVerdict) -> Self {
        let media_type = validation.media_type;
        Self {
            validation,
            scan: Some(scan),
            media_type,
        }
    }

    /// Accepted structurally and no threats found. Warnings may still be present.
    pub fn is_admissible(&self) -> bool {
        self.validation.accepted && self.scan.as_ref().is_some_and(|s| s.safe)
    }

    pub fn warnings(&self) -> &[String] {
        self.scan.as_ref().map(|s| s.warnings.as_slice()).unwrap_or(&[])
    }
}
