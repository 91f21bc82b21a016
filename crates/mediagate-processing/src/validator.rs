use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::ImageReader;
use mediagate_core::models::{
    AcceptedMediaType, FileSignature, ImageProbe, IncomingFile, ValidationVerdict,
};
use mediagate_core::AdmissionConfig;

use crate::compression::image_format_for;
use crate::scanner::ScanRules;
use crate::signature::{SignatureCatalog, SIGNATURE_HEADER_LEN};

/// Characters never allowed in a submitted filename.
pub const RESERVED_FILENAME_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Number of trailing bytes searched for the PDF end-of-file marker.
const PDF_TRAILER_WINDOW: usize = 20;
const PDF_EOF_MARKER: &[u8] = b"%%EOF";

/// Structural rejection reasons, in the order the gates run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("File too small: {size} bytes (min: {min} bytes)")]
    FileTooSmall { size: u64, min: u64 },

    #[error("Invalid filename: contains control characters")]
    ControlCharacters,

    #[error("Invalid filename: contains reserved character '{0}'")]
    ReservedCharacter(char),

    #[error("Invalid filename: {length} characters (max: {max})")]
    FilenameTooLong { length: usize, max: usize },

    #[error("Executable file extension not allowed: .{0}")]
    ExecutableExtension(String),

    #[error("Unsupported format: signature does not match any accepted media type")]
    UnsupportedFormat,

    #[error("Image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("Image too large: {width}x{height} pixels (max: {max} per side)")]
    ImageDimensionsTooLarge { width: u32, height: u32, max: u32 },

    #[error("Image decode timed out after {0} ms")]
    DecodeTimeout(u64),

    #[error("Invalid PDF: end-of-file marker not found in trailer")]
    MissingEofMarker,
}

/// Lower-cased extension after the last dot, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Structural validator
///
/// Runs the hard admission gates in order: size, name, signature, then a
/// type-specific probe. The first failing gate decides the verdict and no later
/// gate runs. The caller-declared content type is never consulted for the
/// decision.
#[derive(Clone)]
pub struct StructuralValidator {
    config: AdmissionConfig,
    catalog: SignatureCatalog,
    executable_extensions: Arc<[String]>,
}

impl StructuralValidator {
    pub fn new(config: AdmissionConfig, rules: &ScanRules) -> Self {
        Self {
            config,
            catalog: SignatureCatalog::builtin(),
            executable_extensions: rules.executable_extensions().into(),
        }
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.config.max_file_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.config.max_file_size_bytes,
            });
        }

        if size < self.config.min_file_size_bytes {
            return Err(ValidationError::FileTooSmall {
                size,
                min: self.config.min_file_size_bytes,
            });
        }

        Ok(())
    }

    /// Validate filename characters, length and extension
    pub fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        if filename.chars().any(char::is_control) {
            return Err(ValidationError::ControlCharacters);
        }

        if let Some(c) = filename
            .chars()
            .find(|c| RESERVED_FILENAME_CHARS.contains(c))
        {
            return Err(ValidationError::ReservedCharacter(c));
        }

        let length = filename.chars().count();
        if length > self.config.max_filename_length {
            return Err(ValidationError::FilenameTooLong {
                length,
                max: self.config.max_filename_length,
            });
        }

        if let Some(extension) = extension_of(filename) {
            if self.executable_extensions.contains(&extension) {
                return Err(ValidationError::ExecutableExtension(extension));
            }
        }

        Ok(())
    }

    /// Resolve the media type from the leading bytes
    pub fn detect_signature(
        &self,
        header: &[u8],
    ) -> Result<&'static FileSignature, ValidationError> {
        self.catalog
            .detect(header)
            .ok_or(ValidationError::UnsupportedFormat)
    }

    /// Type-specific structural probe: decode images, check PDF trailers.
    pub async fn probe_structure(
        &self,
        file: &IncomingFile,
        media_type: AcceptedMediaType,
    ) -> Result<Option<ImageProbe>, ValidationError> {
        if media_type == AcceptedMediaType::Pdf {
            let trailer = file.tail(PDF_TRAILER_WINDOW);
            if !trailer
                .windows(PDF_EOF_MARKER.len())
                .any(|window| window == PDF_EOF_MARKER)
            {
                return Err(ValidationError::MissingEofMarker);
            }
            return Ok(None);
        }

        let data = file.bytes();
        let max_dimension = self.config.max_image_dimension;
        let timeout_ms = self.config.decode_timeout_ms;

        // Image decode is CPU-bound; run off the async pool. A timed-out task
        // keeps running to completion but its result is discarded.
        let task = tokio::task::spawn_blocking(move || {
            probe_image(&data, media_type, max_dimension)
        });

        match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
            Err(_) => Err(ValidationError::DecodeTimeout(timeout_ms)),
            Ok(Err(join_error)) => Err(ValidationError::ImageDecode(join_error.to_string())),
            Ok(Ok(result)) => result.map(Some),
        }
    }

    async fn check(
        &self,
        file: &IncomingFile,
    ) -> Result<(AcceptedMediaType, Option<ImageProbe>), ValidationError> {
        self.validate_file_size(file.size_bytes())?;
        self.validate_filename(&file.name)?;
        let signature = self.detect_signature(file.read(0, SIGNATURE_HEADER_LEN))?;
        let probe = self.probe_structure(file, signature.media_type).await?;
        Ok((signature.media_type, probe))
    }

    /// Validate all aspects of a file and produce a verdict.
    pub async fn validate(&self, file: &IncomingFile) -> ValidationVerdict {
        match self.check(file).await {
            Ok((media_type, probe)) => {
                let mismatch = declared_type_mismatch(&file.declared_media_type, media_type);
                if let Some(ref note) = mismatch {
                    tracing::info!(filename = %file.name, note = %note, "Declared type mismatch");
                }
                tracing::debug!(
                    filename = %file.name,
                    media_type = %media_type,
                    size = file.size_bytes(),
                    "File passed structural validation"
                );
                ValidationVerdict::accepted(media_type)
                    .with_image_probe(probe)
                    .with_declared_type_mismatch(mismatch)
            }
            Err(err) => {
                tracing::debug!(filename = %file.name, reason = %err, "File rejected");
                ValidationVerdict::rejected(err.to_string())
            }
        }
    }
}

fn declared_type_mismatch(declared: &str, detected: AcceptedMediaType) -> Option<String> {
    let declared = declared.trim();
    if declared.is_empty() || declared.eq_ignore_ascii_case("application/octet-stream") {
        return None;
    }
    if AcceptedMediaType::from_mime_type(declared) == Some(detected) {
        return None;
    }
    Some(format!(
        "Declared type '{}' does not match detected type '{}'",
        declared, detected
    ))
}

fn probe_image(
    data: &[u8],
    media_type: AcceptedMediaType,
    max_dimension: u32,
) -> Result<ImageProbe, ValidationError> {
    let format = image_format_for(media_type).ok_or(ValidationError::UnsupportedFormat)?;

    let (width, height) = ImageReader::with_format(Cursor::new(data), format)
        .into_dimensions()
        .map_err(|e| ValidationError::ImageDecode(e.to_string()))?;

    if width > max_dimension || height > max_dimension {
        return Err(ValidationError::ImageDimensionsTooLarge {
            width,
            height,
            max: max_dimension,
        });
    }

    ImageReader::with_format(Cursor::new(data), format)
        .decode()
        .map_err(|e| ValidationError::ImageDecode(e.to_string()))?;

    Ok(ImageProbe { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn test_validator() -> StructuralValidator {
        StructuralValidator::new(AdmissionConfig::default(), &ScanRules::builtin())
    }

    fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 5 % 256) as u8])
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), format)
            .unwrap();
        buffer
    }

    fn minimal_pdf_bytes() -> Vec<u8> {
        let mut data = b"%PDF-1.4\n".to_vec();
        data.extend_from_slice(&[b' '; 120]);
        data.extend_from_slice(b"\nstartxref\n0\n%%EOF\n");
        data
    }

    #[test]
    fn test_validate_file_size_bounds() {
        let validator = test_validator();
        assert!(validator.validate_file_size(512 * 1024).is_ok());
        assert!(matches!(
            validator.validate_file_size(99),
            Err(ValidationError::FileTooSmall { size: 99, min: 100 })
        ));
        assert!(validator.validate_file_size(100).is_ok());
        assert!(validator.validate_file_size(50 * 1024 * 1024).is_ok());
        assert!(matches!(
            validator.validate_file_size(50 * 1024 * 1024 + 1),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_filename_rules() {
        let validator = test_validator();
        assert!(validator.validate_filename("holiday photo.jpg").is_ok());
        assert_eq!(
            validator.validate_filename("bad\u{0007}name.png"),
            Err(ValidationError::ControlCharacters)
        );
        assert_eq!(
            validator.validate_filename("what?.png"),
            Err(ValidationError::ReservedCharacter('?'))
        );
        assert_eq!(
            validator.validate_filename("dir/file.png"),
            Err(ValidationError::ReservedCharacter('/'))
        );
        let long_name = format!("{}.png", "a".repeat(252));
        assert!(matches!(
            validator.validate_filename(&long_name),
            Err(ValidationError::FilenameTooLong { length: 256, max: 255 })
        ));
        assert_eq!(
            validator.validate_filename("setup.EXE"),
            Err(ValidationError::ExecutableExtension("exe".to_string()))
        );
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.tar.GZ"), Some("gz".to_string()));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("trailing."), None);
    }

    #[tokio::test]
    async fn test_accepts_png() {
        let validator = test_validator();
        let file = IncomingFile::new(
            "image.png",
            "image/png",
            create_test_image(32, 32, ImageFormat::Png),
        );
        let verdict = validator.validate(&file).await;
        assert!(verdict.accepted, "{:?}", verdict.rejection_reason);
        assert_eq!(verdict.media_type, Some(AcceptedMediaType::Png));
        assert_eq!(verdict.image_probe, Some(ImageProbe { width: 32, height: 32 }));
        assert!(verdict.declared_type_mismatch.is_none());
    }

    #[tokio::test]
    async fn test_jpeg_renamed_png_is_classified_by_signature() {
        let validator = test_validator();
        let jpeg = create_test_image(32, 32, ImageFormat::Jpeg);
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);
        let file = IncomingFile::new("photo.png", "image/png", jpeg);
        let verdict = validator.validate(&file).await;
        assert!(verdict.accepted);
        assert_eq!(verdict.media_type, Some(AcceptedMediaType::Jpeg));
        assert!(verdict.declared_type_mismatch.is_some());
    }

    #[tokio::test]
    async fn test_too_small_rejected_before_signature() {
        let validator = test_validator();
        let file = IncomingFile::new("tiny.exe", "application/octet-stream", vec![0u8; 50]);
        let verdict = validator.validate(&file).await;
        assert!(!verdict.accepted);
        assert!(verdict.media_type.is_none());
        let reason = verdict.rejection_reason.unwrap().to_lowercase();
        assert!(reason.contains("too small"), "{}", reason);
    }

    #[tokio::test]
    async fn test_executable_double_extension_rejected_despite_pdf_bytes() {
        let validator = test_validator();
        let file = IncomingFile::new("invoice.pdf.exe", "application/pdf", minimal_pdf_bytes());
        let verdict = validator.validate(&file).await;
        assert!(!verdict.accepted);
        assert!(verdict
            .rejection_reason
            .unwrap()
            .to_lowercase()
            .contains("executable"));
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let validator = test_validator();
        let file = IncomingFile::new("notes.txt", "text/plain", vec![b'a'; 200]);
        let verdict = validator.validate(&file).await;
        assert!(!verdict.accepted);
        assert!(verdict
            .rejection_reason
            .unwrap()
            .to_lowercase()
            .contains("unsupported format"));
    }

    #[tokio::test]
    async fn test_pdf_trailer_check() {
        let validator = test_validator();
        let file = IncomingFile::new("doc.pdf", "application/pdf", minimal_pdf_bytes());
        let verdict = validator.validate(&file).await;
        assert!(verdict.accepted);
        assert_eq!(verdict.media_type, Some(AcceptedMediaType::Pdf));
        assert!(verdict.image_probe.is_none());

        let mut truncated = b"%PDF-1.4\n".to_vec();
        truncated.extend_from_slice(&[b'x'; 200]);
        let file = IncomingFile::new("doc.pdf", "application/pdf", truncated);
        let verdict = validator.validate(&file).await;
        assert!(!verdict.accepted);
        assert_eq!(
            verdict.rejection_reason,
            Some(ValidationError::MissingEofMarker.to_string())
        );
    }

    #[tokio::test]
    async fn test_corrupt_image_rejected() {
        let validator = test_validator();
        let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&[0x42; 200]);
        let file = IncomingFile::new("broken.png", "image/png", data);
        let verdict = validator.validate(&file).await;
        assert!(!verdict.accepted);
        assert!(verdict
            .rejection_reason
            .unwrap()
            .contains("could not be decoded"));
    }

    #[tokio::test]
    async fn test_image_dimension_limit() {
        let config = AdmissionConfig {
            max_image_dimension: 16,
            ..AdmissionConfig::default()
        };
        let validator = StructuralValidator::new(config, &ScanRules::builtin());
        let file = IncomingFile::new(
            "wide.png",
            "image/png",
            create_test_image(32, 8, ImageFormat::Png),
        );
        let verdict = validator.validate(&file).await;
        assert!(!verdict.accepted);
        assert!(verdict.rejection_reason.unwrap().contains("32x8"));
    }

    #[tokio::test]
    async fn test_slow_decode_is_rejected() {
        let config = AdmissionConfig {
            decode_timeout_ms: 1,
            ..AdmissionConfig::default()
        };
        let validator = StructuralValidator::new(config, &ScanRules::builtin());
        let data = create_test_image(4000, 4000, ImageFormat::Png);
        let file = IncomingFile::new("large.png", "image/png", data);
        let verdict = validator.validate(&file).await;
        assert!(!verdict.accepted);
        assert_eq!(
            verdict.rejection_reason,
            Some(ValidationError::DecodeTimeout(1).to_string())
        );
    }

    #[tokio::test]
    async fn test_validation_is_deterministic() {
        let validator = test_validator();
        let file = IncomingFile::new(
            "image.png",
            "image/jpeg",
            create_test_image(24, 12, ImageFormat::Png),
        );
        let first = validator.validate(&file).await;
        let second = validator.validate(&file).await;
        assert_eq!(first, second);
    }
}
