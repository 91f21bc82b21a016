//! Transcoding engine
//!
//! [`RasterTranscoder`] re-samples and re-encodes images, [`DocumentTranscoder`]
//! re-rasterises PDF pages into a new document. [`MediaTranscoder`] dispatches
//! on the validated media type and [`TranscodeSession`] re-runs it from the
//! original accepted bytes whenever the quality changes.

mod document;
mod raster;
mod renderer;
mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use document::DocumentTranscoder;
pub use raster::{fit_dimensions, RasterTranscoder};
pub use renderer::{default_renderer, PageRenderer, UnavailableRenderer};
pub use session::TranscodeSession;

#[cfg(feature = "pdfium")]
pub use renderer::PdfiumRenderer;

use std::sync::Arc;

use mediagate_core::{
    AcceptedMediaType, AdmissionError, TranscodeConfig, TranscodeRequest, TranscodeResult,
};
use tokio_util::sync::CancellationToken;

/// Receives transcoder progress in percent (0-100) with a short status line.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, status: &str);
}

/// Discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _status: &str) {}
}

/// Routes a request to the raster or document transcoder.
#[derive(Clone)]
pub struct MediaTranscoder {
    raster: RasterTranscoder,
    document: DocumentTranscoder,
}

impl MediaTranscoder {
    pub fn new(raster: RasterTranscoder, document: DocumentTranscoder) -> Self {
        Self { raster, document }
    }

    /// Transcoder with the given output settings and the default page renderer.
    pub fn from_config(config: TranscodeConfig) -> Self {
        Self::new(
            RasterTranscoder::new(config),
            DocumentTranscoder::new(default_renderer()),
        )
    }

    pub fn with_renderer(config: TranscodeConfig, renderer: Arc<dyn PageRenderer>) -> Self {
        Self::new(RasterTranscoder::new(config), DocumentTranscoder::new(renderer))
    }

    /// Blocking; call from `spawn_blocking` inside async code.
    pub fn transcode(
        &self,
        request: &TranscodeRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TranscodeResult, AdmissionError> {
        match request.media_type {
            AcceptedMediaType::Pdf => self.document.transcode(request, progress, cancel),
            _ => self.raster.transcode(request, progress, cancel),
        }
    }
}
