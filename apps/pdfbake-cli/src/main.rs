//! pdfbake command line
//!
//! Reads a source PDF and a JSON operation log, writes the baked PDF.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use pdfbake_core::{EditOperation, ExportConfig, ExportResult, Exporter, FontManager, FontRegistry, OperationLog};
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfbake")]
#[command(version, about = "Apply recorded edit operations to a PDF")]
struct Args {
    /// Source PDF
    #[arg(short, long)]
    input: PathBuf,

    /// Operation log: a JSON array of operations or a saved log object
    #[arg(long)]
    ops: PathBuf,

    /// Where to write the baked PDF
    #[arg(short, long)]
    output: PathBuf,

    /// Height in pixels of the page previews the operations were recorded on
    #[arg(long)]
    raster_height: f64,

    /// Export settings (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of .ttf/.otf fonts to offer besides the standard 14
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,

    /// Print the export result as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OpsFile {
    List(Vec<EditOperation>),
    Log(OperationLog),
}

fn read_operations(path: &Path) -> anyhow::Result<Vec<EditOperation>> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let ops = match serde_json::from_str::<OpsFile>(&json)
        .with_context(|| format!("Failed to parse operations in {}", path.display()))?
    {
        OpsFile::List(ops) => ops,
        OpsFile::Log(log) => log.operations().to_vec(),
    };
    Ok(ops)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout is reserved for --json output
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match &args.config {
        Some(path) => ExportConfig::from_file(path)?,
        None => ExportConfig::default(),
    };

    let mut registry = FontRegistry::with_standard_fonts();
    for dir in &args.font_dirs {
        registry.discover_dir(dir);
    }
    let exporter = Exporter::new(Arc::new(FontManager::new(Arc::new(registry))), config);

    let source = std::fs::read(&args.input).with_context(|| format!("Failed to read {}", args.input.display()))?;
    let operations = read_operations(&args.ops)?;
    tracing::info!("Loaded {} operations from {}", operations.len(), args.ops.display());

    let start = Instant::now();
    let result = match exporter.export(&source, &operations, args.raster_height).await {
        Ok(outcome) => {
            std::fs::write(&args.output, &outcome.bytes)
                .with_context(|| format!("Failed to write {}", args.output.display()))?;
            for warning in &outcome.report.warnings {
                tracing::warn!("{}", warning);
            }
            tracing::info!("Wrote {} ({} bytes)", args.output.display(), outcome.bytes.len());
            ExportResult::from_outcome(source.len(), &outcome, start.elapsed().as_millis() as u64)
        }
        Err(e) => ExportResult::failure(&e),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.clone().without_data())?);
    }

    if !result.success {
        bail!(result.error.unwrap_or_else(|| "export failed".to_string()));
    }
    Ok(())
}
