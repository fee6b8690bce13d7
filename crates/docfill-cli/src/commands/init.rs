use std::path::Path;

use anyhow::Result;

use docfill_core::config::EngineConfig;

use crate::output;

/// Write a default `docfill.config.json`, refusing to overwrite an existing one.
pub fn run(config_path: &Path) -> Result<()> {
    output::print_header("docfill init");

    if config_path.exists() {
        anyhow::bail!("config already exists: {}", config_path.display());
    }

    let config = EngineConfig::default();
    config.save(config_path)?;

    output::print_success(&format!("Wrote {}", config_path.display()));
    output::print_key_value("Templates", &config.storage_dir.display().to_string());
    output::print_key_value("Outputs", &config.output_dir.display().to_string());
    output::print_key_value("Naming field", &config.naming_field);
    println!();
    println!("  Next steps:");
    println!("    docfill extract letter.docx");
    println!("    docfill generate --template <REF> --interactive");
    println!("    docfill batch --template <REF> --data clients.xlsx");
    println!();

    Ok(())
}
