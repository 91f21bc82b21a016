use serde::{Deserialize, Serialize};
use std::fmt;

/// Media types admitted by the pipeline.
///
/// Resolution happens exclusively through signature matching; declared content
/// types and file extensions never select a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptedMediaType {
    Jpeg,
    Png,
    Gif,
    WebP,
    Pdf,
}

impl AcceptedMediaType {
    pub const ALL: [AcceptedMediaType; 5] = [
        AcceptedMediaType::Jpeg,
        AcceptedMediaType::Png,
        AcceptedMediaType::Gif,
        AcceptedMediaType::WebP,
        AcceptedMediaType::Pdf,
    ];

    pub fn to_mime_type(self) -> &'static str {
        match self {
            AcceptedMediaType::Jpeg => "image/jpeg",
            AcceptedMediaType::Png => "image/png",
            AcceptedMediaType::Gif => "image/gif",
            AcceptedMediaType::WebP => "image/webp",
            AcceptedMediaType::Pdf => "application/pdf",
        }
    }

    pub fn canonical_extension(self) -> &'static str {
        match self {
            AcceptedMediaType::Jpeg => "jpg",
            AcceptedMediaType::Png => "png",
            AcceptedMediaType::Gif => "gif",
            AcceptedMediaType::WebP => "webp",
            AcceptedMediaType::Pdf => "pdf",
        }
    }

    /// Parse a MIME type string (case insensitive, parameters ignored).
    pub fn from_mime_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(AcceptedMediaType::Jpeg),
            "image/png" => Some(AcceptedMediaType::Png),
            "image/gif" => Some(AcceptedMediaType::Gif),
            "image/webp" => Some(AcceptedMediaType::WebP),
            "application/pdf" => Some(AcceptedMediaType::Pdf),
            _ => None,
        }
    }

    /// Best-effort MIME guess from a file extension, used only to fill in a
    /// declared type when the caller has none.
    pub fn guess_from_extension(filename: &str) -> Option<Self> {
        let ext = filename.rsplit_once('.')?.1.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(AcceptedMediaType::Jpeg),
            "png" => Some(AcceptedMediaType::Png),
            "gif" => Some(AcceptedMediaType::Gif),
            "webp" => Some(AcceptedMediaType::WebP),
            "pdf" => Some(AcceptedMediaType::Pdf),
            _ => None,
        }
    }

    pub fn is_image(self) -> bool {
        !matches!(self, AcceptedMediaType::Pdf)
    }
}

impl fmt::Display for AcceptedMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_mime_type())
    }
}

/// Magic-number record identifying a media type from its leading bytes.
///
/// `container_tag` is an additional fixed sequence at a given offset, used for
/// RIFF containers where the prefix alone is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSignature {
    pub byte_prefix: &'static [u8],
    pub container_tag: Option<(usize, &'static [u8])>,
    pub media_type: AcceptedMediaType,
    pub canonical_extension: &'static str,
}

impl FileSignature {
    pub fn matches(&self, header: &[u8]) -> bool {
        if !header.starts_with(self.byte_prefix) {
            return false;
        }
        match self.container_tag {
            Some((offset, tag)) => header
                .get(offset..offset + tag.len())
                .is_some_and(|window| window == tag),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_mime_type_ignores_case_and_parameters() {
        assert_eq!(
            AcceptedMediaType::from_mime_type("IMAGE/PNG"),
            Some(AcceptedMediaType::Png)
        );
        assert_eq!(
            AcceptedMediaType::from_mime_type("application/pdf; charset=binary"),
            Some(AcceptedMediaType::Pdf)
        );
        assert_eq!(AcceptedMediaType::from_mime_type("image/avif"), None);
    }

    #[test]
    fn test_guess_from_extension() {
        assert_eq!(
            AcceptedMediaType::guess_from_extension("holiday.JPEG"),
            Some(AcceptedMediaType::Jpeg)
        );
        assert_eq!(AcceptedMediaType::guess_from_extension("noext"), None);
    }

    #[test]
    fn test_signature_container_tag() {
        let webp = FileSignature {
            byte_prefix: b"RIFF",
            container_tag: Some((8, b"WEBP")),
            media_type: AcceptedMediaType::WebP,
            canonical_extension: "webp",
        };
        assert!(webp.matches(b"RIFF\x10\x00\x00\x00WEBPVP8 "));
        assert!(!webp.matches(b"RIFF\x10\x00\x00\x00WAVEfmt "));
        assert!(!webp.matches(b"RIFF"));
    }
}
