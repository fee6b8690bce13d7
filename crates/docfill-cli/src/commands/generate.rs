use std::path::Path;

use anyhow::{Context, Result};
use dialoguer::Input;

use docfill_core::record::Record;
use docfill_office::office_pipeline;

use crate::output;

/// Fill one stored template with one set of values and write the result.
///
/// Values come from `--values` (a JSON object) and are overridden by each
/// `--set NAME=VALUE`. With `--interactive`, every placeholder still lacking a
/// value is prompted for.
pub async fn run(
    config_path: &Path,
    template: &str,
    values: Option<&Path>,
    set: &[String],
    interactive: bool,
    no_convert: bool,
    output_path: Option<&Path>,
) -> Result<()> {
    output::print_header("docfill generate");

    let config = super::load_config(config_path)?;
    let pipeline = office_pipeline(config, !no_convert);

    output::print_step(1, 3, "Collecting values...");
    let mut record = match values {
        Some(path) => load_values(path)?,
        None => Record::new(),
    };
    let overrides = set
        .iter()
        .map(|pair| parse_assignment(pair))
        .collect::<Result<Record>>()?;
    record.extend(overrides);

    let placeholders = pipeline.placeholders(template)?;
    if interactive {
        for name in &placeholders {
            if record.contains(name) {
                continue;
            }
            let value: String = Input::new()
                .with_prompt(name.as_str())
                .allow_empty(true)
                .interact_text()?;
            record.insert(name.as_str(), value);
        }
    }
    let unfilled: Vec<&str> = placeholders
        .iter()
        .map(String::as_str)
        .filter(|name| !record.contains(name))
        .collect();
    if !unfilled.is_empty() {
        output::print_warning(&format!("Left unfilled: {}", unfilled.join(", ")));
    }

    output::print_step(2, 3, "Rendering document...");
    let spinner = output::spinner(if no_convert {
        "Filling template"
    } else {
        "Filling template and converting to PDF"
    });
    let result = pipeline.generate(template, record).await;
    spinner.finish_and_clear();
    let delivery = result?;

    output::print_step(3, 3, "Writing output...");
    let written = super::deliver(&delivery, output_path, &pipeline.config().output_dir)?;

    output::print_success(&format!("Generated {}", written.display()));
    output::print_key_value("Request", &delivery.request_id);
    output::print_key_value("Content type", delivery.content_type);
    output::print_digest(&delivery.bytes);

    Ok(())
}

fn load_values(path: &Path) -> Result<Record> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Record::from_json(&value)?)
}

fn parse_assignment(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => anyhow::bail!("invalid --set '{pair}', expected NAME=VALUE"),
    }
}
