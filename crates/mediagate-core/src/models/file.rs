//! Input boundary for untrusted files

use bytes::Bytes;

use crate::models::AcceptedMediaType;

/// An untrusted file presented for admission.
///
/// The buffer is reference counted so the validator, scanner and transcoders can
/// each hold the same accepted bytes without copying; nothing mutates it.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub declared_media_type: String,
    data: Bytes,
}

impl IncomingFile {
    pub fn new(
        name: impl Into<String>,
        declared_media_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_media_type: declared_media_type.into(),
            data: data.into(),
        }
    }

    /// Build a file whose declared type is guessed from the extension, which is
    /// what a browser would report for a local file.
    pub fn with_guessed_type(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let declared = AcceptedMediaType::guess_from_extension(&name)
            .map(|t| t.to_mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Self::new(name, declared, data)
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// Read up to `length` bytes starting at `offset`; short reads at the end
    /// of the buffer return fewer bytes, never an error.
    pub fn read(&self, offset: usize, length: usize) -> &[u8] {
        let start = offset.min(self.data.len());
        let end = start.saturating_add(length).min(self.data.len());
        &self.data[start..end]
    }

    /// The last `length` bytes (or the whole buffer when shorter).
    pub fn tail(&self, length: usize) -> &[u8] {
        let start = self.data.len().saturating_sub(length);
        &self.data[start..]
    }

    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_clamps_to_buffer() {
        let file = IncomingFile::new("a.bin", "application/octet-stream", vec![1u8, 2, 3, 4]);
        assert_eq!(file.read(0, 2), &[1, 2]);
        assert_eq!(file.read(2, 10), &[3, 4]);
        assert!(file.read(10, 4).is_empty());
        assert_eq!(file.tail(3), &[2, 3, 4]);
        assert_eq!(file.tail(20), &[1, 2, 3, 4]);
        assert_eq!(file.size_bytes(), 4);
    }

    #[test]
    fn test_with_guessed_type() {
        let file = IncomingFile::with_guessed_type("scan.PDF", vec![0u8; 4]);
        assert_eq!(file.declared_media_type, "application/pdf");
        let file = IncomingFile::with_guessed_type("blob", vec![0u8; 4]);
        assert_eq!(file.declared_media_type, "application/octet-stream");
    }
}
