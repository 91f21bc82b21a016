//! Content threat scanner
//!
//! Heuristic, best-effort inspection of an admitted file: filename tricks,
//! dangerous byte patterns, suspicious command strings, content entropy and
//! a few structural markers near the start of the file. A threat makes the
//! file unsafe; warnings are surfaced to the operator for a decision.

mod entropy;
mod rules;

pub use entropy::shannon_entropy;
pub use rules::{builtin_document, CompiledPattern, RuleDocument, RuleKind, RuleSet, ScanRules};

use std::collections::BTreeSet;
use std::sync::Arc;

use mediagate_core::{AdmissionConfig, IncomingFile, ScanVerdict};

use crate::validator::extension_of;

/// Distinct suspicious strings tolerated before a warning is raised.
const SUSPICIOUS_TOLERANCE: usize = 2;
/// UTF-8 encodes a char in at most four bytes.
const MAX_UTF8_CHAR_LEN: usize = 4;
const MAX_EXTENSION_LEN: usize = 5;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ADS_MARKER: &[u8] = b":$DATA";

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}')
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// `name.ext1.ext2` where both trailing segments look like extensions.
fn has_double_extension(filename: &str) -> bool {
    let parts: Vec<&str> = filename.split('.').collect();
    if parts.len() < 3 {
        return false;
    }
    parts[parts.len() - 2..].iter().all(|part| {
        !part.is_empty()
            && part.len() <= MAX_EXTENSION_LEN
            && part.chars().all(|c| c.is_ascii_alphanumeric())
    })
}

#[derive(Clone)]
pub struct ThreatScanner {
    config: AdmissionConfig,
    rules: Arc<ScanRules>,
}

impl ThreatScanner {
    pub fn new(config: AdmissionConfig, rules: Arc<ScanRules>) -> Self {
        Self { config, rules }
    }

    pub fn rules(&self) -> &ScanRules {
        &self.rules
    }

    pub fn scan(&self, file: &IncomingFile) -> ScanVerdict {
        let mut threats = Vec::new();
        let mut warnings = Vec::new();

        self.scan_filename(&file.name, &mut threats, &mut warnings);
        self.scan_content(
            file.read(0, self.config.scan_window_bytes),
            &mut threats,
            &mut warnings,
        );
        self.scan_structure(
            file.read(0, self.config.structural_window_bytes),
            &mut warnings,
        );

        let verdict = ScanVerdict::from_findings(threats, warnings);
        if verdict.safe {
            tracing::debug!(
                filename = %file.name,
                warnings = verdict.warnings.len(),
                "Threat scan passed"
            );
        } else {
            tracing::warn!(
                filename = %file.name,
                threats = ?verdict.threats,
                "Threat scan found threats"
            );
        }
        verdict
    }

    fn scan_filename(&self, filename: &str, threats: &mut Vec<String>, warnings: &mut Vec<String>) {
        if let Some(extension) = extension_of(filename) {
            if self.rules.is_executable_extension(&extension) {
                threats.push(format!("Executable file extension: .{}", extension));
            }
        }

        if filename.chars().any(is_bidi_control) {
            threats.push("Filename contains bidirectional control characters".to_string());
        }

        if has_double_extension(filename) {
            warnings.push(format!("Filename has a double extension: {}", filename));
        }

        if filename.chars().count() > self.config.max_filename_length {
            warnings.push("Filename is unusually long".to_string());
        }
    }

    fn scan_content(&self, window: &[u8], threats: &mut Vec<String>, warnings: &mut Vec<String>) {
        if let Some(pattern) = self.rules.dangerous().iter().find(|p| p.is_match(window)) {
            threats.push(format!(
                "Dangerous content detected ({}): {}",
                pattern.tag, pattern.source
            ));
        }

        // Each literal counts once, whichever rule sets and casing list it.
        let mut seen = BTreeSet::new();
        let suspicious: Vec<&str> = self
            .rules
            .suspicious()
            .iter()
            .filter(|p| p.is_match(window))
            .map(|p| p.source.as_str())
            .filter(|source| seen.insert(source.to_ascii_lowercase()))
            .collect();
        if suspicious.len() > SUSPICIOUS_TOLERANCE {
            warnings.push(format!(
                "Multiple suspicious command strings: {}",
                suspicious.join(", ")
            ));
        }

        let sample_len = window
            .len()
            .min(self.config.entropy_sample_chars.saturating_mul(MAX_UTF8_CHAR_LEN));
        let text = String::from_utf8_lossy(&window[..sample_len]);
        let entropy = shannon_entropy(&text, self.config.entropy_sample_chars);
        if entropy > self.config.entropy_threshold {
            warnings.push(format!(
                "High content entropy ({:.2} bits/char), possibly encrypted or obfuscated",
                entropy
            ));
        }
    }

    fn scan_structure(&self, window: &[u8], warnings: &mut Vec<String>) {
        if contains(window, ZIP_LOCAL_HEADER) {
            warnings.push("Embedded ZIP archive signature near start of file".to_string());
        }
        if contains(window, ADS_MARKER) {
            warnings.push("NTFS alternate data stream marker found".to_string());
        }
    }
}
