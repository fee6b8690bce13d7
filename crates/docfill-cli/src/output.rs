//! Terminal output formatting for the docfill CLI.
//!
//! Provides consistent, colored output using the [`console`] crate.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};

/// Print a bold cyan header with an underline separator.
pub fn print_header(text: &str) {
    println!("\n{}", style(text).bold().cyan());
    println!("{}", style("=".repeat(text.len())).dim());
}

/// Print a success message prefixed with green `[OK]`.
pub fn print_success(text: &str) {
    println!("{} {}", style("[OK]").green().bold(), text);
}

/// Print a warning message prefixed with yellow `[WARN]`.
pub fn print_warning(text: &str) {
    println!("{} {}", style("[WARN]").yellow().bold(), text);
}

/// Print an error message prefixed with red `[ERROR]`.
pub fn print_error(text: &str) {
    println!("{} {}", style("[ERROR]").red().bold(), text);
}

/// Print a progress step indicator like `[1/3] Parsing rows...`.
pub fn print_step(step: u32, total: u32, text: &str) {
    println!(
        "{} {}",
        style(format!("[{step}/{total}]")).dim(),
        text
    );
}

/// Print a key-value pair with dimmed key formatting.
pub fn print_key_value(key: &str, value: &str) {
    println!("  {}: {}", style(key).dim(), value);
}

/// Start a spinner for a step of unknown length. Call `finish_and_clear` when done.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print size and SHA-256 of a delivered file.
pub fn print_digest(bytes: &[u8]) {
    print_key_value("Size", &format!("{} bytes", bytes.len()));
    print_key_value("SHA-256", &hex::encode(Sha256::digest(bytes)));
}
