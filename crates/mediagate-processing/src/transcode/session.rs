use std::sync::Arc;

use bytes::Bytes;
use mediagate_core::{AcceptedMediaType, AdmissionError, TranscodeRequest, TranscodeResult};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{MediaTranscoder, ProgressSink};

struct InFlight {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct SessionState {
    generation: u64,
    in_flight: Option<InFlight>,
    latest: Option<TranscodeResult>,
}

/// Re-runs the transcoder over one accepted source at changing quality values.
///
/// Every call starts from the original bytes. A new call cancels the one
/// still in flight, which then returns [`AdmissionError::Cancelled`]; only the
/// newest call publishes its result to [`TranscodeSession::latest`].
pub struct TranscodeSession {
    transcoder: Arc<MediaTranscoder>,
    source: Bytes,
    media_type: AcceptedMediaType,
    state: Mutex<SessionState>,
}

impl TranscodeSession {
    pub fn new(
        transcoder: Arc<MediaTranscoder>,
        source: Bytes,
        media_type: AcceptedMediaType,
    ) -> Self {
        Self {
            transcoder,
            source,
            media_type,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn media_type(&self) -> AcceptedMediaType {
        self.media_type
    }

    pub fn source_size(&self) -> u64 {
        self.source.len() as u64
    }

    pub async fn transcode(
        &self,
        quality_percent: u8,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<TranscodeResult, AdmissionError> {
        let request = TranscodeRequest::new(self.source.clone(), self.media_type, quality_percent)?;

        let cancel = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            let generation = state.generation;
            let superseded = state.in_flight.replace(InFlight {
                generation,
                cancel: cancel.clone(),
            });
            if let Some(previous) = superseded {
                tracing::debug!(
                    generation = previous.generation,
                    "Superseding in-flight transcode"
                );
                previous.cancel.cancel();
            }
            generation
        };

        let transcoder = self.transcoder.clone();
        let task_cancel = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            transcoder.transcode(&request, progress.as_ref(), &task_cancel)
        })
        .await
        .map_err(|e| AdmissionError::TranscodeFailure(format!("Transcode task failed: {}", e)));

        let mut state = self.state.lock().await;
        if state
            .in_flight
            .as_ref()
            .is_some_and(|current| current.generation == generation)
        {
            state.in_flight = None;
        }

        if cancel.is_cancelled() {
            return Err(AdmissionError::Cancelled);
        }

        let result = outcome??;
        state.latest = Some(result.clone());
        Ok(result)
    }

    /// Cancel the in-flight request, if any.
    pub async fn cancel(&self) {
        if let Some(in_flight) = self.state.lock().await.in_flight.take() {
            in_flight.cancel.cancel();
        }
    }

    /// Result of the newest completed request.
    pub async fn latest(&self) -> Option<TranscodeResult> {
        self.state.lock().await.latest.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::test_support::{sample_pdf, SlowRenderer};
    use crate::transcode::NoProgress;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use mediagate_core::{DocumentOutcome, TranscodeConfig};
    use std::io::Cursor;
    use std::time::Duration;

    fn png_source() -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(48, 32, |x, y| {
            Rgb([(x * 5) as u8, (y * 7) as u8, 40])
        }));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png).unwrap();
        Bytes::from(buffer)
    }

    fn slow_document_session(pages: usize) -> Arc<TranscodeSession> {
        let transcoder = MediaTranscoder::with_renderer(
            TranscodeConfig::default(),
            Arc::new(SlowRenderer {
                delay: Duration::from_millis(60),
            }),
        );
        Arc::new(TranscodeSession::new(
            Arc::new(transcoder),
            Bytes::from(sample_pdf(&vec![(40, 40); pages])),
            AcceptedMediaType::Pdf,
        ))
    }

    #[tokio::test]
    async fn test_repeated_calls_start_from_source() {
        let session = TranscodeSession::new(
            Arc::new(MediaTranscoder::from_config(TranscodeConfig::default())),
            png_source(),
            AcceptedMediaType::Png,
        );
        let first = session.transcode(20, Arc::new(NoProgress)).await.unwrap();
        let second = session.transcode(90, Arc::new(NoProgress)).await.unwrap();
        assert_eq!(first.output_bytes, second.output_bytes);
        assert_eq!(session.latest().await.unwrap().output_bytes, second.output_bytes);
    }

    #[tokio::test]
    async fn test_invalid_quality_is_rejected() {
        let session = TranscodeSession::new(
            Arc::new(MediaTranscoder::from_config(TranscodeConfig::default())),
            png_source(),
            AcceptedMediaType::Png,
        );
        let err = session.transcode(5, Arc::new(NoProgress)).await.unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidQuality(5)));
        assert!(session.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_new_request_supersedes_in_flight() {
        let session = slow_document_session(6);

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.transcode(30, Arc::new(NoProgress)).await })
        };
        tokio::time::sleep(Duration::from_millis(90)).await;

        let second = session.transcode(80, Arc::new(NoProgress)).await.unwrap();
        let first = first.await.unwrap();

        assert!(matches!(first, Err(AdmissionError::Cancelled)));
        assert_eq!(
            second.document_outcome,
            Some(DocumentOutcome::Optimized { page_count: 6 })
        );
        assert_eq!(
            session.latest().await.unwrap().output_bytes,
            second.output_bytes
        );
    }

    #[tokio::test]
    async fn test_explicit_cancel() {
        let session = slow_document_session(6);
        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.transcode(50, Arc::new(NoProgress)).await })
        };
        tokio::time::sleep(Duration::from_millis(90)).await;
        session.cancel().await;

        assert!(matches!(running.await.unwrap(), Err(AdmissionError::Cancelled)));
        assert!(session.latest().await.is_none());
    }
}
