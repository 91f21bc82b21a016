use bytes::Bytes;
use image::imageops::FilterType;
use image::GenericImageView;
use mediagate_core::{
    AcceptedMediaType, AdmissionError, TranscodeConfig, TranscodeRequest, TranscodeResult,
};
use tokio_util::sync::CancellationToken;

use super::ProgressSink;
use crate::compression::{decode_image, ImageCompressor};

/// Fit `width`x`height` into the bounding box.
///
/// Width is clamped first, then the height is re-clamped against its bound.
/// Each step rounds to the nearest pixel, so the final aspect ratio may drift
/// by a pixel from the source. Callers depend on these exact numbers.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let (mut w, mut h) = (f64::from(width), f64::from(height));

    if w > f64::from(max_width) {
        h = (h * f64::from(max_width) / w).round();
        w = f64::from(max_width);
    }
    if h > f64::from(max_height) {
        w = (w * f64::from(max_height) / h).round();
        h = f64::from(max_height);
    }

    ((w as u32).max(1), (h as u32).max(1))
}

/// Decodes an accepted image, fits it into the output bounds and re-encodes it.
///
/// PNG stays PNG and is always written losslessly. Every other input is
/// normalised to the configured lossy codec at the requested quality.
#[derive(Debug, Clone)]
pub struct RasterTranscoder {
    config: TranscodeConfig,
}

impl RasterTranscoder {
    pub fn new(config: TranscodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    pub fn transcode(
        &self,
        request: &TranscodeRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<TranscodeResult, AdmissionError> {
        let img = decode_image(&request.source_bytes, request.media_type)
            .map_err(|e| AdmissionError::TranscodeFailure(format!("{:#}", e)))?;
        let (src_width, src_height) = img.dimensions();
        progress.report(30, "Image decoded");

        if cancel.is_cancelled() {
            return Err(AdmissionError::Cancelled);
        }

        let (width, height) = fit_dimensions(
            src_width,
            src_height,
            self.config.max_output_width,
            self.config.max_output_height,
        );
        let img = if (width, height) != (src_width, src_height) {
            tracing::debug!(
                src_width = src_width,
                src_height = src_height,
                width = width,
                height = height,
                "Resizing image to fit output bounds"
            );
            img.resize_exact(width, height, FilterType::Lanczos3)
        } else {
            img
        };
        progress.report(60, "Image resized");

        if cancel.is_cancelled() {
            return Err(AdmissionError::Cancelled);
        }

        let quality = request.quality_percent();
        let (output_bytes, output_media_type): (Bytes, AcceptedMediaType) =
            if request.media_type == AcceptedMediaType::Png {
                let data = ImageCompressor::compress_png(&img).map_err(|e| {
                    tracing::error!(error = %e, "PNG encode failed");
                    AdmissionError::TranscodeFailure(e.to_string())
                })?;
                (data, AcceptedMediaType::Png)
            } else {
                let codec = self.config.lossy_codec;
                let data = ImageCompressor::compress_lossy(&img, codec, quality).map_err(|e| {
                    tracing::error!(error = %e, codec = ?codec, "Lossy encode failed");
                    AdmissionError::TranscodeFailure(e.to_string())
                })?;
                (data, codec.media_type())
            };
        progress.report(100, "Image encoded");

        tracing::info!(
            input_type = %request.media_type,
            output_type = %output_media_type,
            quality = quality,
            input_size = request.source_bytes.len(),
            output_size = output_bytes.len(),
            width = width,
            height = height,
            "Raster transcode complete"
        );

        Ok(TranscodeResult {
            output_bytes,
            output_media_type,
            dimensions: Some((width, height)),
            document_outcome: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::NoProgress;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use mediagate_core::LossyCodec;
    use std::io::Cursor;
    use std::sync::Mutex;

    fn encode(img: &DynamicImage, format: ImageFormat) -> Bytes {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format).unwrap();
        Bytes::from(buffer)
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn noisy(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x9E37_79B9;
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            Rgb([state as u8, (state >> 8) as u8, (state >> 16) as u8])
        }))
    }

    fn run(
        transcoder: &RasterTranscoder,
        data: Bytes,
        media_type: AcceptedMediaType,
        quality: u8,
    ) -> TranscodeResult {
        let request = TranscodeRequest::new(data, media_type, quality).unwrap();
        transcoder
            .transcode(&request, &NoProgress, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn test_fit_dimensions_within_bounds_is_unchanged() {
        assert_eq!(fit_dimensions(800, 600, 1920, 1080), (800, 600));
        assert_eq!(fit_dimensions(1920, 1080, 1920, 1080), (1920, 1080));
    }

    #[test]
    fn test_fit_dimensions_two_step_clamp() {
        assert_eq!(fit_dimensions(3840, 2160, 1920, 1080), (1920, 1080));
        assert_eq!(fit_dimensions(4000, 1000, 1920, 1080), (1920, 480));
        assert_eq!(fit_dimensions(1000, 3000, 1920, 1080), (360, 1080));
        // Width clamp gives 1920x1440, height re-clamp gives 1440x1080.
        assert_eq!(fit_dimensions(2000, 1500, 1920, 1080), (1440, 1080));
        // Second step rounds from the already rounded first-step height.
        assert_eq!(fit_dimensions(2999, 2001, 1920, 1080), (1619, 1080));
        assert_eq!(fit_dimensions(100_000, 1, 1920, 1080), (1920, 1));
    }

    #[test]
    fn test_large_image_is_bounded() {
        let transcoder = RasterTranscoder::new(TranscodeConfig::default());
        let source = encode(&gradient(2400, 900), ImageFormat::Png);
        let result = run(&transcoder, source, AcceptedMediaType::Png, 80);
        let (w, h) = result.dimensions.unwrap();
        assert!(w <= 1920 && h <= 1080);
        assert_eq!((w, h), (1920, 720));

        let decoded = decode_image(&result.output_bytes, AcceptedMediaType::Png).unwrap();
        assert_eq!(decoded.dimensions(), (1920, 720));
    }

    #[test]
    fn test_small_image_keeps_native_size() {
        let transcoder = RasterTranscoder::new(TranscodeConfig::default());
        let source = encode(&gradient(320, 200), ImageFormat::Jpeg);
        let result = run(&transcoder, source, AcceptedMediaType::Jpeg, 50);
        assert_eq!(result.dimensions, Some((320, 200)));
        assert_eq!(result.output_media_type, AcceptedMediaType::Jpeg);
        assert_eq!(&result.output_bytes[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_png_round_trip_is_lossless_at_any_quality() {
        let transcoder = RasterTranscoder::new(TranscodeConfig::default());
        let original = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 40, |x, y| {
            Rgba([(x * 4) as u8, (y * 6) as u8, 99, (255 - x) as u8])
        }));
        let source = encode(&original, ImageFormat::Png);

        for quality in [10, 55, 100] {
            let result = run(&transcoder, source.clone(), AcceptedMediaType::Png, quality);
            assert_eq!(result.output_media_type, AcceptedMediaType::Png);
            let decoded = decode_image(&result.output_bytes, AcceptedMediaType::Png).unwrap();
            assert_eq!(decoded.to_rgba8().as_raw(), original.to_rgba8().as_raw());
        }
    }

    #[test]
    fn test_output_size_is_monotonic_in_quality() {
        let transcoder = RasterTranscoder::new(TranscodeConfig::default());
        let jpeg_source = encode(&noisy(200, 150), ImageFormat::Jpeg);

        let sizes: Vec<usize> = [10, 50, 90]
            .into_iter()
            .map(|q| {
                run(&transcoder, jpeg_source.clone(), AcceptedMediaType::Jpeg, q)
                    .output_bytes
                    .len()
            })
            .collect();
        assert!(sizes[0] <= sizes[1], "{:?}", sizes);
        assert!(sizes[1] <= sizes[2], "{:?}", sizes);
    }

    #[test]
    fn test_gif_is_normalised_to_configured_codec() {
        let config = TranscodeConfig {
            lossy_codec: LossyCodec::WebP,
            ..TranscodeConfig::default()
        };
        let transcoder = RasterTranscoder::new(config);
        let source = encode(&gradient(40, 30), ImageFormat::Gif);
        let result = run(&transcoder, source, AcceptedMediaType::Gif, 70);
        assert_eq!(result.output_media_type, AcceptedMediaType::WebP);
        assert_eq!(&result.output_bytes[8..12], b"WEBP");
    }

    #[test]
    fn test_undecodable_source_is_a_transcode_failure() {
        let transcoder = RasterTranscoder::new(TranscodeConfig::default());
        let request = TranscodeRequest::new(
            Bytes::from_static(b"\xFF\xD8\xFFnot really a jpeg"),
            AcceptedMediaType::Jpeg,
            80,
        )
        .unwrap();
        let err = transcoder
            .transcode(&request, &NoProgress, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, AdmissionError::TranscodeFailure(_)));
    }

    #[test]
    fn test_cancelled_token_stops_transcode() {
        let transcoder = RasterTranscoder::new(TranscodeConfig::default());
        let request = TranscodeRequest::new(
            encode(&gradient(16, 16), ImageFormat::Png),
            AcceptedMediaType::Png,
            80,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = transcoder.transcode(&request, &NoProgress, &cancel).unwrap_err();
        assert!(matches!(err, AdmissionError::Cancelled));
    }

    #[test]
    fn test_progress_is_reported_in_order() {
        struct Collect(Mutex<Vec<u8>>);
        impl ProgressSink for Collect {
            fn report(&self, percent: u8, _status: &str) {
                self.0.lock().unwrap().push(percent);
            }
        }

        let transcoder = RasterTranscoder::new(TranscodeConfig::default());
        let request = TranscodeRequest::new(
            encode(&gradient(16, 16), ImageFormat::Png),
            AcceptedMediaType::Png,
            80,
        )
        .unwrap();
        let sink = Collect(Mutex::new(Vec::new()));
        transcoder
            .transcode(&request, &sink, &CancellationToken::new())
            .unwrap();
        assert_eq!(*sink.0.lock().unwrap(), vec![30, 60, 100]);
    }
}
