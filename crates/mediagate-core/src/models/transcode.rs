//! Transcoder input and output records

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::AdmissionError;
use crate::models::AcceptedMediaType;

pub const MIN_QUALITY: u8 = 10;
pub const MAX_QUALITY: u8 = 100;

/// Lossy codec used for every non-PNG raster output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossyCodec {
    #[default]
    Jpeg,
    WebP,
}

impl LossyCodec {
    pub fn parse(s: &str) -> Result<Self, AdmissionError> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(LossyCodec::Jpeg),
            "webp" => Ok(LossyCodec::WebP),
            other => Err(AdmissionError::Config(format!(
                "Invalid lossy codec: {} (expected jpeg or webp)",
                other
            ))),
        }
    }

    pub fn media_type(self) -> AcceptedMediaType {
        match self {
            LossyCodec::Jpeg => AcceptedMediaType::Jpeg,
            LossyCodec::WebP => AcceptedMediaType::WebP,
        }
    }
}

/// Immutable input to a transcoder.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub source_bytes: Bytes,
    pub media_type: AcceptedMediaType,
    quality_percent: u8,
}

impl TranscodeRequest {
    pub fn new(
        source_bytes: Bytes,
        media_type: AcceptedMediaType,
        quality_percent: u8,
    ) -> Result<Self, AdmissionError> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality_percent) {
            return Err(AdmissionError::InvalidQuality(quality_percent));
        }
        Ok(Self {
            source_bytes,
            media_type,
            quality_percent,
        })
    }

    pub fn quality_percent(&self) -> u8 {
        self.quality_percent
    }
}

/// How the document transcoder produced its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DocumentOutcome {
    /// Every page was rasterised and recompressed.
    Optimized { page_count: usize },
    /// A page failed; the original document was re-serialised without recompression.
    FallbackPreserved { reason: String },
}

/// Output of a transcoder.
///
/// `dimensions` is set for raster output only; documents report per-page sizes
/// inside the document itself.
#[derive(Debug, Clone)]
pub struct TranscodeResult {
    pub output_bytes: Bytes,
    pub output_media_type: AcceptedMediaType,
    pub dimensions: Option<(u32, u32)>,
    pub document_outcome: Option<DocumentOutcome>,
}

impl TranscodeResult {
    pub fn size_bytes(&self) -> u64 {
        self.output_bytes.len() as u64
    }
}
