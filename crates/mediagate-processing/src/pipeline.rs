//! Admission pipeline
//!
//! An explicit state machine over five phases run in strict order:
//! `file-check -> virus-scan -> content-scan -> transcoding -> complete`.
//! Every transition is published to a [`PhaseObserver`] with a monotonically
//! increasing progress percentage. Observers only watch; the decision logic
//! lives here and in the [`WarningDecision`] the caller supplies.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mediagate_core::{
    AdmissionError, AdmissionResult, Config, IncomingFile, ScanVerdict, TranscodeResult,
    MAX_QUALITY, MIN_QUALITY,
};
use serde::Serialize;

use crate::scanner::{ScanRules, ThreatScanner};
use crate::transcode::{MediaTranscoder, ProgressSink, TranscodeSession};
use crate::validator::StructuralValidator;

const FILE_CHECK_PROGRESS: u8 = 10;
const VIRUS_SCAN_PROGRESS: u8 = 30;
const CONTENT_SCAN_PROGRESS: u8 = 50;
const TRANSCODE_START_PROGRESS: u8 = 60;
const TRANSCODE_SPAN: u32 = 35;
const COMPLETE_PROGRESS: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    FileCheck,
    VirusScan,
    ContentScan,
    Transcoding,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::FileCheck => "file-check",
            Phase::VirusScan => "virus-scan",
            Phase::ContentScan => "content-scan",
            Phase::Transcoding => "transcoding",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseEvent {
    pub phase: Phase,
    pub progress: u8,
    pub status: String,
}

/// Subscriber to phase transitions. Must not block.
pub trait PhaseObserver: Send + Sync {
    fn on_event(&self, event: &PhaseEvent);
}

/// Keeps every event in order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PhaseEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PhaseEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl PhaseObserver for RecordingObserver {
    fn on_event(&self, event: &PhaseEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Logs each transition at `info`.
pub struct TracingObserver;

impl PhaseObserver for TracingObserver {
    fn on_event(&self, event: &PhaseEvent) {
        tracing::info!(
            phase = %event.phase,
            progress = event.progress,
            status = %event.status,
            "Admission progress"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Abort,
}

/// The single user-facing decision point: asked only when the scan found no
/// threats but did raise warnings.
#[async_trait]
pub trait WarningDecision: Send + Sync {
    async fn decide(&self, warnings: &[String]) -> Decision;
}

/// Always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub Decision);

#[async_trait]
impl WarningDecision for FixedDecision {
    async fn decide(&self, _warnings: &[String]) -> Decision {
        self.0
    }
}

pub struct PipelineOutput {
    pub admission: AdmissionResult,
    pub output: TranscodeResult,
    /// Re-run the transcoder at another quality without re-admitting the file.
    pub session: Arc<TranscodeSession>,
}

/// Maps transcoder progress (0-100) into the transcoding band of the pipeline.
struct TranscodeProgress {
    observer: Arc<dyn PhaseObserver>,
}

impl ProgressSink for TranscodeProgress {
    fn report(&self, percent: u8, status: &str) {
        let scaled = u32::from(percent.min(100)) * TRANSCODE_SPAN / 100;
        self.observer.on_event(&PhaseEvent {
            phase: Phase::Transcoding,
            progress: TRANSCODE_START_PROGRESS + scaled as u8,
            status: status.to_string(),
        });
    }
}

pub struct AdmissionPipeline {
    validator: StructuralValidator,
    scanner: ThreatScanner,
    transcoder: Arc<MediaTranscoder>,
    observer: Arc<dyn PhaseObserver>,
    phase: Option<Phase>,
}

impl AdmissionPipeline {
    pub fn new(
        validator: StructuralValidator,
        scanner: ThreatScanner,
        transcoder: Arc<MediaTranscoder>,
        observer: Arc<dyn PhaseObserver>,
    ) -> Self {
        Self {
            validator,
            scanner,
            transcoder,
            observer,
            phase: None,
        }
    }

    pub fn from_config(
        config: &Config,
        rules: Arc<ScanRules>,
        observer: Arc<dyn PhaseObserver>,
    ) -> Self {
        Self::with_transcoder(
            config,
            rules,
            Arc::new(MediaTranscoder::from_config(config.transcode.clone())),
            observer,
        )
    }

    pub fn with_transcoder(
        config: &Config,
        rules: Arc<ScanRules>,
        transcoder: Arc<MediaTranscoder>,
        observer: Arc<dyn PhaseObserver>,
    ) -> Self {
        Self::new(
            StructuralValidator::new(config.admission.clone(), &rules),
            ThreatScanner::new(config.admission.clone(), rules),
            transcoder,
            observer,
        )
    }

    /// Last phase entered, `None` before the first file.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = None;
    }

    fn enter(&mut self, phase: Phase, progress: u8, status: impl Into<String>) {
        self.phase = Some(phase);
        self.observer.on_event(&PhaseEvent {
            phase,
            progress,
            status: status.into(),
        });
    }

    /// Validate then scan. The scan never runs on a rejected file.
    pub async fn evaluate(&mut self, file: &IncomingFile) -> AdmissionResult {
        self.reset();

        self.enter(Phase::FileCheck, FILE_CHECK_PROGRESS, "Checking file structure");
        let validation = self.validator.validate(file).await;
        if !validation.accepted {
            tracing::debug!(
                filename = %file.name,
                reason = validation.rejection_reason.as_deref().unwrap_or_default(),
                "Admission stopped at file check"
            );
            return AdmissionResult::rejected(validation);
        }

        self.enter(Phase::VirusScan, VIRUS_SCAN_PROGRESS, "Scanning for threats");
        let scanner = self.scanner.clone();
        let scanned = file.clone();
        let scan = tokio::task::spawn_blocking(move || scanner.scan(&scanned))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Threat scan task failed");
                ScanVerdict::from_findings(
                    Vec::new(),
                    vec![format!("Threat scan did not complete: {}", e)],
                )
            });

        let status = if !scan.safe {
            format!("{} threat(s) found", scan.threats.len())
        } else if scan.warnings.is_empty() {
            "No issues found".to_string()
        } else {
            format!("{} warning(s) need review", scan.warnings.len())
        };
        self.enter(Phase::ContentScan, CONTENT_SCAN_PROGRESS, status);

        AdmissionResult::scanned(validation, scan)
    }

    /// Evaluate and turn every stop condition into an error. Warnings are put
    /// to `decider`; `Decision::Abort` ends the admission.
    pub async fn admit(
        &mut self,
        file: &IncomingFile,
        decider: &dyn WarningDecision,
    ) -> Result<AdmissionResult, AdmissionError> {
        let result = self.evaluate(file).await;

        if !result.validation.accepted {
            let reason = result
                .validation
                .rejection_reason
                .clone()
                .unwrap_or_else(|| "File rejected".to_string());
            return Err(AdmissionError::RejectedInput(reason));
        }

        if let Some(scan) = &result.scan {
            if !scan.safe {
                return Err(AdmissionError::ThreatDetected {
                    threats: scan.threats.clone(),
                });
            }
            if !scan.warnings.is_empty()
                && decider.decide(&scan.warnings).await == Decision::Abort
            {
                tracing::info!(
                    filename = %file.name,
                    warnings = scan.warnings.len(),
                    "Admission aborted after warnings"
                );
                return Err(AdmissionError::WarningsDeclined {
                    warnings: scan.warnings.clone(),
                });
            }
        }

        Ok(result)
    }

    /// Admit the file and transcode it at `quality_percent`. An out-of-range
    /// quality fails before any phase is entered.
    pub async fn process(
        &mut self,
        file: &IncomingFile,
        quality_percent: u8,
        decider: &dyn WarningDecision,
    ) -> Result<PipelineOutput, AdmissionError> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality_percent) {
            self.reset();
            return Err(AdmissionError::InvalidQuality(quality_percent));
        }
        let admission = self.admit(file, decider).await?;
        let media_type = admission.media_type.ok_or_else(|| {
            AdmissionError::RejectedInput("No media type resolved".to_string())
        })?;

        self.enter(Phase::Transcoding, TRANSCODE_START_PROGRESS, "Transcoding");
        let session = Arc::new(TranscodeSession::new(
            self.transcoder.clone(),
            file.bytes(),
            media_type,
        ));
        let progress = Arc::new(TranscodeProgress {
            observer: self.observer.clone(),
        });
        let output = session.transcode(quality_percent, progress).await?;

        self.enter(Phase::Complete, COMPLETE_PROGRESS, "Complete");
        Ok(PipelineOutput {
            admission,
            output,
            session,
        })
    }
}
