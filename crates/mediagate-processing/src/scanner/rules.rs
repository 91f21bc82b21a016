//! Versioned, externally loadable scanner rule sets

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// What a rule set's patterns are matched against and what a hit means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Byte-level regular expressions over the content window; any hit is a threat.
    Dangerous,
    /// Case-insensitive literals over the content window; counted, not fatal.
    Suspicious,
    /// Filename extensions (without the dot) treated as executables.
    ExecutableExtension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub tag: String,
    pub kind: RuleKind,
    pub patterns: Vec<String>,
}

/// Serialized form of the scanner rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub version: String,
    pub rule_sets: Vec<RuleSet>,
}

#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub tag: String,
    pub source: String,
    regex: Regex,
}

impl CompiledPattern {
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.regex.is_match(haystack)
    }
}

/// Compiled rules used by the validator and the threat scanner.
#[derive(Debug, Clone)]
pub struct ScanRules {
    document: RuleDocument,
    dangerous: Vec<CompiledPattern>,
    suspicious: Vec<CompiledPattern>,
    executable_extensions: Vec<String>,
}

impl ScanRules {
    /// The rules shipped with the crate.
    pub fn builtin() -> Self {
        Self::compile(builtin_document()).expect("built-in scan rules must compile")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: RuleDocument =
            serde_json::from_str(json).context("Failed to parse scan rules JSON")?;
        Self::compile(document)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scan rules from {}", path.display()))?;
        let rules = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            version = %rules.version(),
            rule_sets = rules.document.rule_sets.len(),
            "Loaded scan rules"
        );
        Ok(rules)
    }

    pub fn compile(document: RuleDocument) -> Result<Self> {
        let mut dangerous = Vec::new();
        let mut suspicious = Vec::new();
        let mut executable_extensions = Vec::new();

        for set in &document.rule_sets {
            for pattern in &set.patterns {
                match set.kind {
                    RuleKind::Dangerous => {
                        dangerous.push(compile_pattern(&set.tag, pattern, pattern)?);
                    }
                    RuleKind::Suspicious => {
                        let escaped = regex::escape(pattern);
                        suspicious.push(compile_pattern(&set.tag, pattern, &escaped)?);
                    }
                    RuleKind::ExecutableExtension => {
                        let ext = pattern.trim().trim_start_matches('.').to_lowercase();
                        if ext.is_empty() {
                            return Err(anyhow!(
                                "Empty executable extension in rule set '{}'",
                                set.tag
                            ));
                        }
                        executable_extensions.push(ext);
                    }
                }
            }
        }

        Ok(Self {
            document,
            dangerous,
            suspicious,
            executable_extensions,
        })
    }

    pub fn version(&self) -> &str {
        &self.document.version
    }

    pub fn document(&self) -> &RuleDocument {
        &self.document
    }

    pub fn dangerous(&self) -> &[CompiledPattern] {
        &self.dangerous
    }

    pub fn suspicious(&self) -> &[CompiledPattern] {
        &self.suspicious
    }

    pub fn executable_extensions(&self) -> &[String] {
        &self.executable_extensions
    }

    pub fn is_executable_extension(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.executable_extensions.contains(&ext)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }
}

impl Default for ScanRules {
    fn default() -> Self {
        Self::builtin()
    }
}

fn compile_pattern(tag: &str, source: &str, expression: &str) -> Result<CompiledPattern> {
    let regex = RegexBuilder::new(expression)
        .case_insensitive(true)
        .unicode(false)
        .build()
        .with_context(|| format!("Invalid pattern '{}' in rule set '{}'", source, tag))?;
    Ok(CompiledPattern {
        tag: tag.to_string(),
        source: source.to_string(),
        regex,
    })
}

fn rule_set(tag: &str, kind: RuleKind, patterns: &[&str]) -> RuleSet {
    RuleSet {
        tag: tag.to_string(),
        kind,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn builtin_document() -> RuleDocument {
    RuleDocument {
        version: "1".to_string(),
        rule_sets: vec![
            rule_set(
                "script-injection",
                RuleKind::Dangerous,
                &[
                    r"<script\b",
                    r"javascript:",
                    r"\beval\s*\(",
                    r"\bset(?:timeout|interval)\s*\(",
                ],
            ),
            rule_set(
                "embedded-markup",
                RuleKind::Dangerous,
                &[r"<iframe\b", r"<object\b", r"<embed\b", r"<form\b"],
            ),
            rule_set(
                "embedded-executable",
                RuleKind::Dangerous,
                &[
                    // PE: the DOS stub message rather than the bare two-byte MZ.
                    r"this program cannot be run in dos mode",
                    r"\x7FELF[\x01\x02][\x01\x02]\x01",
                    r"\xFE\xED\xFA[\xCE\xCF]",
                    r"[\xCE\xCF]\xFA\xED\xFE",
                ],
            ),
            rule_set(
                "shell-commands",
                RuleKind::Suspicious,
                &[
                    "cmd.exe",
                    "powershell",
                    "bash",
                    "/bin/sh",
                    "exec(",
                    "system(",
                    "shell_exec",
                    "passthru",
                    "popen",
                    "proc_open",
                    "child_process",
                    "spawn(",
                    "wget ",
                    "curl ",
                    "fetch(",
                    "xmlhttprequest",
                ],
            ),
            rule_set(
                "executables",
                RuleKind::ExecutableExtension,
                &[
                    "exe", "bat", "cmd", "com", "pif", "scr", "vbs", "js", "jar", "app", "deb",
                    "pkg", "dmg",
                ],
            ),
        ],
    }
}
