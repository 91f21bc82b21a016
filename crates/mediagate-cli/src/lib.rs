//! Support code for the `mediagate` binary.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use mediagate_core::{AcceptedMediaType, Config};
use mediagate_processing::{
    suggest_output_filename, Decision, ScanRules, TargetCatalog, WarningDecision,
};

/// Initialize tracing for the CLI. `RUST_LOG` overrides the `info` default.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Human-readable byte count ("512 B", "1.50 MB").
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Percentage saved going from `before` to `after` bytes; negative when it grew.
pub fn savings_percent(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }
    (1.0 - after as f64 / before as f64) * 100.0
}

pub fn load_rules(config: &Config) -> anyhow::Result<Arc<ScanRules>> {
    let rules = match &config.rules_path {
        Some(path) => ScanRules::from_path(path)?,
        None => ScanRules::builtin(),
    };
    Ok(Arc::new(rules))
}

pub fn load_targets(config: &Config) -> anyhow::Result<TargetCatalog> {
    match &config.targets_path {
        Some(path) => TargetCatalog::from_path(path),
        None => Ok(TargetCatalog::builtin()),
    }
}

/// Where to write the transcoded file when `--out` is not given: next to the
/// input, under the suggested output name.
pub fn default_output_path(input: &Path, output_type: AcceptedMediaType) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = suggest_output_filename(&name, output_type);
    match input.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Asks on the terminal whether to continue past scan warnings.
pub struct PromptDecision;

#[async_trait]
impl WarningDecision for PromptDecision {
    async fn decide(&self, warnings: &[String]) -> Decision {
        let warnings = warnings.to_vec();
        let answer = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let mut stderr = std::io::stderr();
            writeln!(stderr, "The file raised warnings:")?;
            for warning in &warnings {
                writeln!(stderr, "  - {}", warning)?;
            }
            write!(stderr, "Continue anyway? [y/N] ")?;
            stderr.flush()?;

            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read answer")?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) if parse_answer(&line) => Decision::Continue,
            _ => Decision::Abort,
        }
    }
}

fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
}
