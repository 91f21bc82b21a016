use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use mediagate_core::models::{AcceptedMediaType, LossyCodec};
use std::io::Cursor;

/// Map an accepted raster type to the decoder format. PDF has none.
pub fn image_format_for(media_type: AcceptedMediaType) -> Option<ImageFormat> {
    match media_type {
        AcceptedMediaType::Jpeg => Some(ImageFormat::Jpeg),
        AcceptedMediaType::Png => Some(ImageFormat::Png),
        AcceptedMediaType::Gif => Some(ImageFormat::Gif),
        AcceptedMediaType::WebP => Some(ImageFormat::WebP),
        AcceptedMediaType::Pdf => None,
    }
}

/// Decode with the format fixed by signature detection rather than guessed again.
pub fn decode_image(data: &[u8], media_type: AcceptedMediaType) -> Result<DynamicImage> {
    let format = image_format_for(media_type)
        .ok_or_else(|| anyhow!("{} is not a raster format", media_type))?;
    let img = ImageReader::with_format(Cursor::new(data), format)
        .decode()
        .with_context(|| format!("Failed to decode {}", media_type))?;
    Ok(img)
}

/// Main compression service
pub struct ImageCompressor;

impl ImageCompressor {
    /// Encode with the configured lossy codec at `quality` (10-100).
    pub fn compress_lossy(img: &DynamicImage, codec: LossyCodec, quality: u8) -> Result<Bytes> {
        let data = match codec {
            LossyCodec::Jpeg => Self::compress_jpeg(img, quality)?,
            LossyCodec::WebP => Self::compress_webp(img, quality)?,
        };

        if data.is_empty() {
            return Err(anyhow!("{:?} encoder returned no data", codec));
        }

        tracing::debug!(
            codec = ?codec,
            quality = quality,
            output_size = data.len(),
            "Lossy encode complete"
        );

        Ok(data)
    }

    /// Compress to JPEG using mozjpeg
    pub fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(&rgb_img)?;
        let jpeg_data = comp.finish()?;

        Ok(Bytes::from(jpeg_data))
    }

    /// Compress to PNG. Lossless, so no quality parameter applies.
    pub fn compress_png(img: &DynamicImage) -> Result<Bytes> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        img.write_to(&mut cursor, ImageFormat::Png)?;

        if buffer.is_empty() {
            return Err(anyhow!("PNG encoder returned no data"));
        }

        Ok(Bytes::from(buffer))
    }

    /// Compress to WebP
    pub fn compress_webp(img: &DynamicImage, quality: u8) -> Result<Bytes> {
        let (width, height) = img.dimensions();

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(quality as f32);

        Ok(Bytes::copy_from_slice(&webp_data))
    }
}
