//! Command-line entry point. With no flags it reads `input.txt`, keeps its
//! key in `key.txt`, and writes `output.png` in the working directory.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sealed_qr::config::PipelineConfig;
use sealed_qr::pipeline::{self, Outcome};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON file providing any of inputPath, keyPath and outputPath
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plaintext file to encrypt
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Key file, generated if it does not exist
    #[arg(short, long)]
    key: Option<PathBuf>,

    /// Destination of the QR code PNG
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let base = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let config = base.with_overrides(args.input, args.key, args.output);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match pipeline::run(&config, &mut out).context("Failed to produce encrypted QR code")? {
        Outcome::Completed(report) => {
            log::debug!("finished with qr version {}", report.qr.version);
        }
        Outcome::MissingInput(path) => {
            log::debug!("stopped early, {} missing", path.display());
        }
    }

    Ok(())
}
