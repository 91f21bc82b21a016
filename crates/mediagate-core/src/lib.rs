//! Mediagate Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! the admission pipeline, the transcoders and the command line front-end.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{AdmissionConfig, Config, TranscodeConfig};
pub use error::{AdmissionError, ErrorMetadata, LogLevel};
pub use models::{
    AcceptedMediaType, AdmissionResult, DocumentOutcome, FileSignature, ImageProbe,
    IncomingFile, LossyCodec, ScanVerdict, TargetService, TranscodeRequest, TranscodeResult,
    ValidationVerdict, MAX_QUALITY, MIN_QUALITY,
};
