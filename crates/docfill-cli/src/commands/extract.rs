use std::path::Path;

use anyhow::Result;

use docfill_office::office_pipeline;

use crate::output;

/// Upload a template: extract its text, store it, and list its placeholders.
pub fn run(config_path: &Path, file: &Path, json: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let format = super::format_of(file)?;
    let bytes = super::read_input(file)?;

    let pipeline = office_pipeline(config, false);
    let extraction = pipeline.extract(&bytes, &format)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&extraction)?);
        return Ok(());
    }

    output::print_header("docfill extract");
    output::print_key_value("File", &file.display().to_string());
    output::print_key_value("Template", &extraction.template_ref);

    if extraction.placeholders.is_empty() {
        output::print_warning("No {{placeholders}} found in template");
    } else {
        output::print_success(&format!(
            "Found {} placeholder(s)",
            extraction.placeholders.len()
        ));
        for name in &extraction.placeholders {
            println!("    {name}");
        }
    }

    Ok(())
}
