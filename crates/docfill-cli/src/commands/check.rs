use std::path::Path;

use anyhow::Result;

use docfill_office::office_pipeline;

use crate::output;

/// Report whether the tools needed for PDF conversion are installed.
pub fn run(config_path: &Path) -> Result<()> {
    output::print_header("docfill check");

    let config = super::load_config(config_path)?;
    let pipeline = office_pipeline(config, true);
    let converter = pipeline.converter();

    output::print_key_value("Converter", converter.name());
    output::print_key_value("Binary", &pipeline.config().converter_binary);

    match converter.check_prerequisites() {
        Ok(()) => output::print_success("All required tools found"),
        Err(missing) => {
            for m in &missing {
                output::print_error(&format!(
                    "Missing: {} (install: {})",
                    m.tool_name, m.install_instructions
                ));
            }
            output::print_warning("PDF conversion unavailable; use `generate --no-convert`");
        }
    }

    Ok(())
}
