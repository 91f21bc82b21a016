//! Magic-number signature catalogue

use mediagate_core::models::{AcceptedMediaType, FileSignature};

/// Number of leading bytes inspected when matching signatures.
pub const SIGNATURE_HEADER_LEN: usize = 16;

/// Built-in table, matched in order; the first hit wins.
pub static BUILTIN_SIGNATURES: &[FileSignature] = &[
    FileSignature {
        byte_prefix: &[0xFF, 0xD8, 0xFF],
        container_tag: None,
        media_type: AcceptedMediaType::Jpeg,
        canonical_extension: "jpg",
    },
    FileSignature {
        byte_prefix: &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        container_tag: None,
        media_type: AcceptedMediaType::Png,
        canonical_extension: "png",
    },
    FileSignature {
        byte_prefix: b"GIF8",
        container_tag: None,
        media_type: AcceptedMediaType::Gif,
        canonical_extension: "gif",
    },
    FileSignature {
        byte_prefix: b"RIFF",
        container_tag: Some((8, b"WEBP")),
        media_type: AcceptedMediaType::WebP,
        canonical_extension: "webp",
    },
    FileSignature {
        byte_prefix: b"%PDF",
        container_tag: None,
        media_type: AcceptedMediaType::Pdf,
        canonical_extension: "pdf",
    },
];

/// Read-only signature table, constructed once and shared.
#[derive(Debug, Clone, Copy)]
pub struct SignatureCatalog {
    entries: &'static [FileSignature],
}

impl Default for SignatureCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SignatureCatalog {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_SIGNATURES,
        }
    }

    pub fn entries(&self) -> &'static [FileSignature] {
        self.entries
    }

    /// Match the first [`SIGNATURE_HEADER_LEN`] bytes against the table.
    pub fn detect(&self, data: &[u8]) -> Option<&'static FileSignature> {
        let header = &data[..data.len().min(SIGNATURE_HEADER_LEN)];
        self.entries.iter().find(|sig| sig.matches(header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_each_builtin() {
        let catalog = SignatureCatalog::builtin();
        let cases: [(&[u8], AcceptedMediaType); 5] = [
            (&[0xFF, 0xD8, 0xFF, 0xE0, 0x00], AcceptedMediaType::Jpeg),
            (
                &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00],
                AcceptedMediaType::Png,
            ),
            (b"GIF89a\x01\x00", AcceptedMediaType::Gif),
            (b"RIFF\x24\x00\x00\x00WEBPVP8 ", AcceptedMediaType::WebP),
            (b"%PDF-1.7\n", AcceptedMediaType::Pdf),
        ];
        for (bytes, expected) in cases {
            let sig = catalog.detect(bytes).expect("signature should match");
            assert_eq!(sig.media_type, expected);
            assert_eq!(sig.canonical_extension, expected.canonical_extension());
        }
    }

    #[test]
    fn test_detect_unknown() {
        let catalog = SignatureCatalog::builtin();
        assert!(catalog.detect(b"MZ\x90\x00\x03").is_none());
        assert!(catalog.detect(b"RIFF\x24\x00\x00\x00WAVEfmt ").is_none());
        assert!(catalog.detect(&[]).is_none());
    }

    #[test]
    fn test_only_header_is_inspected() {
        let catalog = SignatureCatalog::builtin();
        let mut data = vec![0u8; 32];
        data[20..24].copy_from_slice(b"%PDF");
        assert!(catalog.detect(&data).is_none());
    }
}
