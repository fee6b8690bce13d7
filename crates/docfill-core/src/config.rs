//! Engine configuration (`docfill.config.json`).
//!
//! Every component that touches storage or spawns work receives an [`EngineConfig`]
//! at construction. Nothing reads a storage root or concurrency limit from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DocfillError, Result};

/// Default config file name looked up by the CLI.
pub const CONFIG_FILE: &str = "docfill.config.json";

/// Runtime configuration shared by the store, the batch expander, and the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding uploaded templates and their extracted text.
    pub storage_dir: PathBuf,
    /// Directory for scoped temporary inputs (conversion scratch space).
    pub scratch_dir: PathBuf,
    /// Default directory for delivered outputs.
    pub output_dir: PathBuf,
    /// Record field whose value names each batch artifact.
    pub naming_field: String,
    /// Upper bound on concurrently running row substitutions.
    pub max_concurrency: usize,
    /// Deadline for the external conversion step, in seconds.
    pub conversion_timeout_secs: u64,
    /// LibreOffice executable used for conversion.
    pub converter_binary: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(".docfill/templates"),
            scratch_dir: std::env::temp_dir(),
            output_dir: PathBuf::from(".docfill/out"),
            naming_field: "name".into(),
            max_concurrency: 8,
            conversion_timeout_secs: 120,
            converter_binary: "soffice".into(),
        }
    }
}

impl EngineConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| DocfillError::ConfigNotFound {
                path: path.to_path_buf(),
                source: e,
            })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|e| DocfillError::ConfigParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| DocfillError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Concurrency bound, never below one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.conversion_timeout_secs)
    }
}
