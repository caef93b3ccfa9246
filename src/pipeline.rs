//! End-to-end run: read the plaintext, obtain the key, seal, render.
//!
//! Operator-facing progress goes to the supplied writer so callers decide
//! where it lands; diagnostics go through `log`. The only failure handled
//! here is a missing input file, everything else is returned to the caller.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::crypto::cipher::{self, CipherError, Ciphertext};
use crate::crypto::keys::{self, KeyError, KeyOrigin};
use crate::qr::{self, EncodeError, QrStyle, QrSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unable to read input {}: {source}", .path.display())]
    Input { path: PathBuf, source: io::Error },
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("unable to write progress: {0}")]
    Report(#[from] io::Error),
}

#[derive(Debug)]
pub struct RunReport {
    pub key_origin: KeyOrigin,
    pub key_fingerprint: String,
    pub token: Ciphertext,
    pub qr: QrSummary,
}

#[derive(Debug)]
pub enum Outcome {
    Completed(RunReport),
    /// The input file does not exist. Nothing was written.
    MissingInput(PathBuf),
}

pub fn run<W: Write>(config: &PipelineConfig, out: &mut W) -> Result<Outcome, PipelineError> {
    debug!("running with {:?}", config);

    let text = match fs::read_to_string(&config.input_path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!("input {} does not exist", config.input_path.display());
            writeln!(out, "Error: {} not found", config.input_path.display())?;
            return Ok(Outcome::MissingInput(config.input_path.clone()));
        }
        Err(source) => {
            return Err(PipelineError::Input {
                path: config.input_path.clone(),
                source,
            })
        }
    };

    let loaded = keys::load_or_create_key(&config.key_path)?;
    match loaded.origin {
        KeyOrigin::Generated => writeln!(out, "Generating new encryption key...")?,
        KeyOrigin::Existing => writeln!(out, "Using existing encryption key...")?,
    }

    let token = cipher::encrypt(&text, &loaded.key)?;
    writeln!(out, "Text encrypted successfully")?;

    let summary = qr::render_barcode(token.as_bytes(), &config.output_path, &QrStyle::default())?;
    writeln!(out, "QR code saved as {}", config.output_path.display())?;

    writeln!(out)?;
    writeln!(out, "Process complete!")?;
    writeln!(out, "- Encryption key: {}", config.key_path.display())?;
    writeln!(out, "- QR code: {}", config.output_path.display())?;
    writeln!(out)?;
    writeln!(
        out,
        "Note: Keep {} safe to decrypt the QR code later!",
        config.key_path.display()
    )?;

    let key_fingerprint = loaded.key.fingerprint();
    info!(
        "sealed {} with key {} into {}",
        config.input_path.display(),
        key_fingerprint,
        config.output_path.display()
    );

    Ok(Outcome::Completed(RunReport {
        key_origin: loaded.origin,
        key_fingerprint,
        token,
        qr: summary,
    }))
}
