//! Configuration module
//!
//! Admission limits and transcoder settings, read from the environment with
//! typed defaults. Rule sets and the target catalogue are loaded from the
//! optional JSON files named here by the processing crate.

use std::env;
use std::path::PathBuf;

use crate::models::{LossyCodec, MAX_QUALITY, MIN_QUALITY};

const MAX_FILE_SIZE_BYTES: u64 = 50 * 1024 * 1024;
const MIN_FILE_SIZE_BYTES: u64 = 100;
const MAX_FILENAME_LENGTH: usize = 255;
const MAX_IMAGE_DIMENSION: u32 = 10_000;
const DECODE_TIMEOUT_MS: u64 = 5_000;
const SCAN_WINDOW_BYTES: usize = 1024 * 1024;
const STRUCTURAL_WINDOW_BYTES: usize = 512;
const ENTROPY_SAMPLE_CHARS: usize = 1_000;
const ENTROPY_THRESHOLD: f64 = 7.5;
const MAX_OUTPUT_WIDTH: u32 = 1920;
const MAX_OUTPUT_HEIGHT: u32 = 1080;
const DEFAULT_QUALITY: u8 = 80;

/// Limits applied by the structural validator and the threat scanner.
#[derive(Clone, Debug, PartialEq)]
pub struct AdmissionConfig {
    pub max_file_size_bytes: u64,
    pub min_file_size_bytes: u64,
    pub max_filename_length: usize,
    pub max_image_dimension: u32,
    pub decode_timeout_ms: u64,
    pub scan_window_bytes: usize,
    pub structural_window_bytes: usize,
    pub entropy_sample_chars: usize,
    pub entropy_threshold: f64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_BYTES,
            min_file_size_bytes: MIN_FILE_SIZE_BYTES,
            max_filename_length: MAX_FILENAME_LENGTH,
            max_image_dimension: MAX_IMAGE_DIMENSION,
            decode_timeout_ms: DECODE_TIMEOUT_MS,
            scan_window_bytes: SCAN_WINDOW_BYTES,
            structural_window_bytes: STRUCTURAL_WINDOW_BYTES,
            entropy_sample_chars: ENTROPY_SAMPLE_CHARS,
            entropy_threshold: ENTROPY_THRESHOLD,
        }
    }
}

/// Output bounds and codec choice for the transcoders.
#[derive(Clone, Debug, PartialEq)]
pub struct TranscodeConfig {
    pub max_output_width: u32,
    pub max_output_height: u32,
    pub default_quality: u8,
    pub lossy_codec: LossyCodec,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            max_output_width: MAX_OUTPUT_WIDTH,
            max_output_height: MAX_OUTPUT_HEIGHT,
            default_quality: DEFAULT_QUALITY,
            lossy_codec: LossyCodec::default(),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    pub admission: AdmissionConfig,
    pub transcode: TranscodeConfig,
    /// JSON rule-set file replacing the built-in scanner rules.
    pub rules_path: Option<PathBuf>,
    /// JSON target-service catalogue replacing the built-in entries.
    pub targets_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Unset keys fall back
    /// to defaults; set keys that fail to parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admission = AdmissionConfig {
            max_file_size_bytes: parse_or(
                &lookup,
                "MEDIAGATE_MAX_FILE_SIZE_BYTES",
                MAX_FILE_SIZE_BYTES,
            )?,
            min_file_size_bytes: parse_or(
                &lookup,
                "MEDIAGATE_MIN_FILE_SIZE_BYTES",
                MIN_FILE_SIZE_BYTES,
            )?,
            max_filename_length: MAX_FILENAME_LENGTH,
            max_image_dimension: parse_or(
                &lookup,
                "MEDIAGATE_MAX_IMAGE_DIMENSION",
                MAX_IMAGE_DIMENSION,
            )?,
            decode_timeout_ms: parse_or(&lookup, "MEDIAGATE_DECODE_TIMEOUT_MS", DECODE_TIMEOUT_MS)?,
            scan_window_bytes: parse_or(&lookup, "MEDIAGATE_SCAN_WINDOW_BYTES", SCAN_WINDOW_BYTES)?,
            structural_window_bytes: STRUCTURAL_WINDOW_BYTES,
            entropy_sample_chars: ENTROPY_SAMPLE_CHARS,
            entropy_threshold: parse_or(&lookup, "MEDIAGATE_ENTROPY_THRESHOLD", ENTROPY_THRESHOLD)?,
        };

        let lossy_codec = match lookup("MEDIAGATE_LOSSY_CODEC") {
            Some(value) => LossyCodec::parse(&value).map_err(|e| anyhow::anyhow!("{}", e))?,
            None => LossyCodec::default(),
        };

        let transcode = TranscodeConfig {
            max_output_width: parse_or(&lookup, "MEDIAGATE_MAX_OUTPUT_WIDTH", MAX_OUTPUT_WIDTH)?,
            max_output_height: parse_or(&lookup, "MEDIAGATE_MAX_OUTPUT_HEIGHT", MAX_OUTPUT_HEIGHT)?,
            default_quality: parse_or(&lookup, "MEDIAGATE_DEFAULT_QUALITY", DEFAULT_QUALITY)?,
            lossy_codec,
        };

        let config = Config {
            admission,
            transcode,
            rules_path: lookup("MEDIAGATE_RULES_PATH").map(PathBuf::from),
            targets_path: lookup("MEDIAGATE_TARGETS_PATH").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let admission = &self.admission;
        if admission.min_file_size_bytes >= admission.max_file_size_bytes {
            return Err(anyhow::anyhow!(
                "MEDIAGATE_MIN_FILE_SIZE_BYTES ({}) must be below MEDIAGATE_MAX_FILE_SIZE_BYTES ({})",
                admission.min_file_size_bytes,
                admission.max_file_size_bytes
            ));
        }
        if admission.entropy_threshold <= 0.0 || admission.entropy_threshold > 8.0 {
            return Err(anyhow::anyhow!(
                "MEDIAGATE_ENTROPY_THRESHOLD must be in (0, 8], got {}",
                admission.entropy_threshold
            ));
        }
        if admission.scan_window_bytes == 0 {
            return Err(anyhow::anyhow!("MEDIAGATE_SCAN_WINDOW_BYTES must be positive"));
        }

        let transcode = &self.transcode;
        if transcode.max_output_width == 0 || transcode.max_output_height == 0 {
            return Err(anyhow::anyhow!("Output bounds must be positive"));
        }
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&transcode.default_quality) {
            return Err(anyhow::anyhow!(
                "MEDIAGATE_DEFAULT_QUALITY must be between {} and {}, got {}",
                MIN_QUALITY,
                MAX_QUALITY,
                transcode.default_quality
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", key, raw)),
        None => Ok(default),
    }
}
