// SPDX-License-Identifier: MIT
//! Command-line front-end: inspect and validate MDOCX files

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use mdocx::{decode, DecodeOptions, Document, Limits, MdocxError};

#[derive(Parser)]
#[command(name = "mdocx", version, about = "Inspect and validate MDOCX containers")]
struct Cli {
    /// JSON file overriding individual limits (fields as in `Limits`)
    #[arg(long, global = true)]
    limits: Option<PathBuf>,

    /// Skip SHA-256 verification of media items
    #[arg(long, global = true)]
    no_verify_hashes: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a JSON summary of a container
    Inspect { file: PathBuf },
    /// Decode and validate a container
    Validate { file: PathBuf },
}

#[derive(Debug, Serialize)]
struct Summary {
    metadata_keys: Vec<String>,
    markdown_files: Vec<String>,
    media_ids: Vec<String>,
    media_paths: Vec<String>,
}

impl Summary {
    fn of(doc: &Document) -> Self {
        let mut summary = Summary {
            metadata_keys: doc
                .metadata
                .iter()
                .flat_map(|m| m.keys().cloned())
                .collect(),
            markdown_files: doc.markdown.files.iter().map(|f| f.path.clone()).collect(),
            media_ids: doc.media.items.iter().map(|i| i.id.clone()).collect(),
            media_paths: doc
                .media
                .items
                .iter()
                .filter_map(|i| i.path.clone())
                .collect(),
        };
        summary.metadata_keys.sort();
        summary.markdown_files.sort();
        summary.media_ids.sort();
        summary.media_paths.sort();
        summary
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let options = DecodeOptions::new()
        .with_limits(load_limits(cli.limits.as_deref())?)
        .with_verify_hashes(!cli.no_verify_hashes);

    match &cli.command {
        Command::Inspect { file } => match decode_file(file, &options)? {
            Ok(doc) => {
                println!("{}", serde_json::to_string_pretty(&Summary::of(&doc))?);
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => Ok(report(&e)),
        },
        Command::Validate { file } => match decode_file(file, &options)? {
            Ok(_) => {
                println!("ok");
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => Ok(report(&e)),
        },
    }
}

/// Opening the file is a usage error; anything after that is a decode result
fn decode_file(
    path: &Path,
    options: &DecodeOptions,
) -> anyhow::Result<Result<Document, MdocxError>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    tracing::info!(path = %path.display(), "decoding");
    Ok(decode(&mut BufReader::new(file), options))
}

fn report(err: &MdocxError) -> ExitCode {
    let kind = err.kind();
    eprintln!("{kind}: {err}");
    ExitCode::from(u8::try_from(kind.exit_code()).unwrap_or(1))
}

/// Environment limits, with any fields from `overlay` replacing them
fn load_limits(overlay: Option<&Path>) -> anyhow::Result<Limits> {
    let base = Limits::from_env();
    let Some(path) = overlay else {
        return Ok(base);
    };

    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let overrides: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    let serde_json::Value::Object(overrides) = overrides else {
        anyhow::bail!("{}: limits must be a JSON object", path.display());
    };

    let mut merged = serde_json::to_value(base)?;
    if let serde_json::Value::Object(fields) = &mut merged {
        fields.extend(overrides);
    }
    let limits: Limits = serde_json::from_value(merged)
        .with_context(|| format!("invalid limits in {}", path.display()))?;
    Ok(limits.with_defaults())
}
