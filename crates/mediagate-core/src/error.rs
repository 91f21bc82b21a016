//! Error types module
//!
//! All failures that reach the caller of the admission pipeline or a transcoder
//! are unified under [`AdmissionError`]. Recoverable document rendering problems
//! are not errors: they surface as [`DocumentOutcome::FallbackPreserved`].
//!
//! [`DocumentOutcome::FallbackPreserved`]: crate::models::DocumentOutcome::FallbackPreserved

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like rejected input
    Debug,
    /// Warning level - for threats and declined warnings
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Describes how an error should be presented to the caller.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "REJECTED_INPUT")
    fn error_code(&self) -> &'static str;

    /// Whether retrying (with the same file) can succeed
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("File rejected: {0}")]
    RejectedInput(String),

    #[error("Threats detected: {}", threats.join("; "))]
    ThreatDetected { threats: Vec<String> },

    #[error("Aborted after warnings: {}", warnings.join("; "))]
    WarningsDeclined { warnings: Vec<String> },

    #[error("Transcoding failed: {0}")]
    TranscodeFailure(String),

    #[error("Transcode superseded by a newer request")]
    Cancelled,

    #[error("Quality must be between 10 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AdmissionError {
    fn from(err: anyhow::Error) -> Self {
        AdmissionError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AdmissionError {
    fn from(err: io::Error) -> Self {
        AdmissionError::TranscodeFailure(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn admission_error_static_metadata(
    err: &AdmissionError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        AdmissionError::RejectedInput(_) => (
            "REJECTED_INPUT",
            false,
            Some("Choose a different file"),
            LogLevel::Debug,
        ),
        AdmissionError::ThreatDetected { .. } => (
            "THREAT_DETECTED",
            false,
            Some("Do not process this file"),
            LogLevel::Warn,
        ),
        AdmissionError::WarningsDeclined { .. } => (
            "WARNINGS_DECLINED",
            false,
            Some("Review the warnings and retry if the file is trusted"),
            LogLevel::Debug,
        ),
        AdmissionError::TranscodeFailure(_) => (
            "TRANSCODE_FAILURE",
            true,
            Some("Retry with a different quality or another file"),
            LogLevel::Warn,
        ),
        AdmissionError::Cancelled => ("CANCELLED", true, None, LogLevel::Debug),
        AdmissionError::InvalidQuality(_) => (
            "INVALID_QUALITY",
            false,
            Some("Use a quality between 10 and 100"),
            LogLevel::Debug,
        ),
        AdmissionError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Fix the configuration and restart"),
            LogLevel::Error,
        ),
        AdmissionError::InternalWithSource { .. } => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for AdmissionError {
    fn error_code(&self) -> &'static str {
        admission_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        admission_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        admission_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        admission_error_static_metadata(self).3
    }
}

impl AdmissionError {
    /// Emit this error through `tracing` at its configured level.
    pub fn log(&self) {
        match self.log_level() {
            LogLevel::Debug => {
                tracing::debug!(code = self.error_code(), error = %self, "Admission error")
            }
            LogLevel::Warn => {
                tracing::warn!(code = self.error_code(), error = %self, "Admission error")
            }
            LogLevel::Error => {
                tracing::error!(code = self.error_code(), error = ?self, "Admission error")
            }
        }
    }
}
