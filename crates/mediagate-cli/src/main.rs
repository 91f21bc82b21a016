//! mediagate: admit untrusted images and PDFs, then transcode them.
//!
//! Settings come from `MEDIAGATE_*` environment variables (or `.env`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mediagate_cli::{
    default_output_path, format_size, init_tracing, load_rules, load_targets, savings_percent,
    PromptDecision,
};
use mediagate_core::{Config, ErrorMetadata, IncomingFile, LossyCodec};
use mediagate_processing::{
    AdmissionPipeline, Decision, FixedDecision, TracingObserver, WarningDecision,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "mediagate", about = "Untrusted file admission and transcoding")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and scan a file without transcoding it
    Admit {
        /// Path to the file
        file: PathBuf,
        /// Media type the file claims to be (guessed from the extension if omitted)
        #[arg(long)]
        declared_type: Option<String>,
    },
    /// Admit a file and write a transcoded copy
    ///
    /// PDF pages are only re-rasterised when mediagate is built with the
    /// `pdfium` feature. Without it every PDF keeps its original page content
    /// and the summary reports `fallback_preserved` under `document`.
    Transcode {
        /// Path to the file
        file: PathBuf,
        /// Quality 10-100 (default: MEDIAGATE_DEFAULT_QUALITY)
        #[arg(long)]
        quality: Option<u8>,
        /// Output path (default: compressed_<name> next to the input)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Continue past scan warnings without asking
        #[arg(long)]
        accept_warnings: bool,
        /// Lossy codec: jpeg or webp
        #[arg(long)]
        codec: Option<String>,
    },
    /// List target services, optionally only those an output fits
    Targets {
        #[arg(long, requires_all = ["height", "size"])]
        width: Option<u32>,
        #[arg(long, requires_all = ["width", "size"])]
        height: Option<u32>,
        /// Output size in bytes
        #[arg(long, requires_all = ["width", "height"])]
        size: Option<u64>,
    },
    /// Print the active scanner rules as JSON
    Rules,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn read_incoming(path: &Path, declared_type: Option<String>) -> anyhow::Result<IncomingFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(match declared_type {
        Some(declared) => IncomingFile::new(name, declared, data),
        None => IncomingFile::with_guessed_type(name, data),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Admit {
            file,
            declared_type,
        } => {
            let incoming = read_incoming(&file, declared_type).await?;
            let rules = load_rules(&config)?;
            let mut pipeline =
                AdmissionPipeline::from_config(&config, rules, Arc::new(TracingObserver));
            let result = pipeline.evaluate(&incoming).await;
            print_json(&result)?;
            if !result.is_admissible() {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Transcode {
            file,
            quality,
            out,
            accept_warnings,
            codec,
        } => {
            if let Some(codec) = codec {
                config.transcode.lossy_codec = LossyCodec::parse(&codec)?;
            }
            let quality = quality.unwrap_or(config.transcode.default_quality);
            let incoming = read_incoming(&file, None).await?;
            let targets = load_targets(&config)?;
            let rules = load_rules(&config)?;
            let mut pipeline =
                AdmissionPipeline::from_config(&config, rules, Arc::new(TracingObserver));

            let decider: Box<dyn WarningDecision> = if accept_warnings {
                Box::new(FixedDecision(Decision::Continue))
            } else {
                Box::new(PromptDecision)
            };

            let output = match pipeline.process(&incoming, quality, decider.as_ref()).await {
                Ok(output) => output,
                Err(err) => {
                    err.log();
                    print_json(&serde_json::json!({
                        "error": err.error_code(),
                        "message": err.to_string(),
                        "suggested_action": err.suggested_action(),
                    }))?;
                    return Ok(ExitCode::from(2));
                }
            };

            let result = &output.output;
            let out_path =
                out.unwrap_or_else(|| default_output_path(&file, result.output_media_type));
            tokio::fs::write(&out_path, &result.output_bytes)
                .await
                .with_context(|| format!("Failed to write {}", out_path.display()))?;

            let suitable: Vec<&str> = match result.dimensions {
                Some((w, h)) => targets
                    .suitable_for(result.size_bytes(), w, h)
                    .into_iter()
                    .map(|t| t.name.as_str())
                    .collect(),
                None => Vec::new(),
            };

            print_json(&serde_json::json!({
                "input": file.display().to_string(),
                "output": out_path.display().to_string(),
                "media_type": result.output_media_type.to_mime_type(),
                "quality": quality,
                "input_size": format_size(incoming.size_bytes()),
                "output_size": format_size(result.size_bytes()),
                "savings_percent": savings_percent(incoming.size_bytes(), result.size_bytes()),
                "dimensions": result.dimensions,
                "document": result.document_outcome,
                "warnings": output.admission.warnings(),
                "suitable_targets": suitable,
            }))?;
        }
        Commands::Targets {
            width,
            height,
            size,
        } => {
            let targets = load_targets(&config)?;
            match (width, height, size) {
                (Some(w), Some(h), Some(size)) => print_json(&targets.suitable_for(size, w, h))?,
                _ => print_json(&targets.entries())?,
            }
        }
        Commands::Rules => {
            println!("{}", load_rules(&config)?.to_json_pretty()?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
