//! Domain models

pub mod file;
pub mod media;
pub mod target;
pub mod transcode;
pub mod verdict;

pub use file::IncomingFile;
pub use media::{AcceptedMediaType, FileSignature};
pub use target::TargetService;
pub use transcode::{
    DocumentOutcome, LossyCodec, TranscodeRequest, TranscodeResult, MAX_QUALITY, MIN_QUALITY,
};
pub use verdict::{AdmissionResult, ImageProbe, ScanVerdict, ValidationVerdict};
