//! docfill CLI: fill `{{placeholder}}` document templates.
//!
//! Provides five commands: `init`, `extract`, `generate`, `batch`, and `check`.
//!
//! Each command builds a [`docfill_core::pipeline::Pipeline`] wired with the Office
//! collaborators from [`docfill_office`] and runs one request through it.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "docfill",
    about = "Fill {{placeholder}} templates, one document at a time or a spreadsheet at once",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to docfill.config.json (defaults are used if the file is absent)
    #[arg(long, global = true, default_value = docfill_core::config::CONFIG_FILE, env = "DOCFILL_CONFIG")]
    config: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Upload a template and list its placeholders
    Extract {
        /// Template file (.docx or .txt)
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fill a stored template with one set of values
    Generate {
        /// Template reference returned by `extract`
        #[arg(long, short)]
        template: String,

        /// JSON file with an object of placeholder -> value
        #[arg(long)]
        values: Option<PathBuf>,

        /// Set a single value (repeatable), e.g. --set name=Ann
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Prompt for every placeholder that has no value yet
        #[arg(long, short)]
        interactive: bool,

        /// Deliver the filled .docx instead of converting it to PDF
        #[arg(long)]
        no_convert: bool,

        /// Output path (default: <output_dir>/<request>-<file>)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Fill a stored template once per spreadsheet row and zip the results
    Batch {
        /// Template reference returned by `extract`
        #[arg(long, short)]
        template: String,

        /// Tabular data (.xlsx, .xls, .ods, or .csv) with a header row
        #[arg(long, short)]
        data: PathBuf,

        /// Output path (default: <output_dir>/<request>-documents.zip)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Check that external tools needed for conversion are installed
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => {
            commands::init::run(&cli.config)?;
        }
        Commands::Extract { file, json } => {
            commands::extract::run(&cli.config, &file, json)?;
        }
        Commands::Generate {
            template,
            values,
            set,
            interactive,
            no_convert,
            output,
        } => {
            commands::generate::run(
                &cli.config,
                &template,
                values.as_deref(),
                &set,
                interactive,
                no_convert,
                output.as_deref(),
            )
            .await?;
        }
        Commands::Batch {
            template,
            data,
            output,
        } => {
            commands::batch::run(&cli.config, &template, &data, output.as_deref()).await?;
        }
        Commands::Check => {
            commands::check::run(&cli.config)?;
        }
    }

    Ok(())
}
