//! Pipeline configuration. Every field is optional in the JSON form and
//! falls back to the file names the tool has always used in the working
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_INPUT_PATH: &str = "input.txt";
pub const DEFAULT_KEY_PATH: &str = "key.txt";
pub const DEFAULT_OUTPUT_PATH: &str = "output.png";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Plaintext to seal.
    #[serde(rename = "inputPath")]
    pub input_path: PathBuf,
    /// Key file, created on first run.
    #[serde(rename = "keyPath")]
    pub key_path: PathBuf,
    /// PNG written on every successful run.
    #[serde(rename = "outputPath")]
    pub output_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON configuration file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw_json = fs::read_to_string(&path).map_err(|e| ConfigError::Io(format!("{e}")))?;
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))
    }

    /// Replaces each path that has an override, leaving the rest untouched.
    pub fn with_overrides(
        mut self,
        input_path: Option<PathBuf>,
        key_path: Option<PathBuf>,
        output_path: Option<PathBuf>,
    ) -> Self {
        if let Some(path) = input_path {
            self.input_path = path;
        }
        if let Some(path) = key_path {
            self.key_path = path;
        }
        if let Some(path) = output_path {
            self.output_path = path;
        }
        self
    }
}
