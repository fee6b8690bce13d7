//! CLI command implementations for docfill.
//!
//! Each module corresponds to a subcommand (`docfill <command>`).

pub mod batch;
pub mod check;
pub mod extract;
pub mod generate;
pub mod init;

use std::path::Path;

use anyhow::{Context, Result};

use docfill_core::config::EngineConfig;

/// Load the config file if present; otherwise fall back to defaults.
pub fn load_config(config_path: &Path) -> Result<EngineConfig> {
    if config_path.exists() {
        Ok(EngineConfig::load(config_path)?)
    } else {
        tracing::debug!(path = %config_path.display(), "no config file, using defaults");
        Ok(EngineConfig::default())
    }
}

/// Format discriminator of an input file: its lowercase extension.
pub fn format_of(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .with_context(|| format!("cannot tell the format of {} (no extension)", path.display()))
}

/// Read an input file, naming it in the error.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Write a delivery to `output`, or into the configured output directory.
pub fn deliver(
    delivery: &docfill_core::artifacts::Delivery,
    output: Option<&Path>,
    output_dir: &Path,
) -> Result<std::path::PathBuf> {
    match output {
        Some(path) => {
            delivery.write_to(path)?;
            Ok(path.to_path_buf())
        }
        None => Ok(delivery.write_into(output_dir)?),
    }
}
