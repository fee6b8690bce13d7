use std::path::Path;

use anyhow::Result;

use docfill_office::office_pipeline;

use crate::output;

/// Fill a stored template once per data row and write the zip of results.
pub async fn run(
    config_path: &Path,
    template: &str,
    data: &Path,
    output_path: Option<&Path>,
) -> Result<()> {
    output::print_header("docfill batch");

    let config = super::load_config(config_path)?;
    let pipeline = office_pipeline(config, false);

    output::print_step(1, 2, "Reading data...");
    let format = super::format_of(data)?;
    let bytes = super::read_input(data)?;
    output::print_key_value("Data", &data.display().to_string());
    output::print_key_value("Naming field", &pipeline.config().naming_field);

    let spinner = output::spinner("Generating documents");
    let result = pipeline.generate_batch(template, &bytes, &format).await;
    spinner.finish_and_clear();
    let delivery = result?;

    output::print_step(2, 2, "Writing archive...");
    let written = super::deliver(&delivery, output_path, &pipeline.config().output_dir)?;

    output::print_success(&format!("Generated {}", written.display()));
    output::print_key_value("Request", &delivery.request_id);
    output::print_digest(&delivery.bytes);

    Ok(())
}
