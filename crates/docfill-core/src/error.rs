//! Unified error types for the docfill engine.

use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur while extracting, filling, or packaging templates.
#[derive(Error, Debug)]
pub enum DocfillError {
    // --- Configuration ---

    /// The configuration file (`docfill.config.json`) was not found.
    #[error("config file not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file exists but contains invalid JSON.
    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // --- Request validation ---

    /// A request field is missing or malformed.
    #[error("invalid input: {0}")]
    InputValidation(String),

    /// The format discriminator of an uploaded file is not recognized.
    #[error("unsupported format '{format}' (supported: {supported})")]
    UnsupportedFormat { format: String, supported: String },

    /// The template reference is unknown, stale, or malformed.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    // --- External collaborators ---

    /// Plain text could not be extracted from the uploaded template.
    #[error("text extraction failed: {0}")]
    Extraction(String),

    /// The tabular data could not be parsed into rows.
    #[error("failed to parse tabular data: {0}")]
    TabularParse(String),

    /// Filled text could not be rendered into a document.
    #[error("document rendering failed: {0}")]
    Render(String),

    /// The external conversion step failed or timed out.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// A required external tool (e.g. `soffice`) is not installed.
    #[error("required tool '{name}' not found - install: {install}")]
    MissingTool { name: String, install: String },

    // --- Batch ---

    /// Every row of a batch was filtered out by the naming-field rule.
    #[error("no valid records: all {rows} row(s) have a blank '{field}' field")]
    NoValidRecords { rows: usize, field: String },

    // --- Packaging ---

    /// Packaging was requested for an empty artifact sequence.
    #[error("cannot package an empty artifact sequence")]
    EmptyPackage,

    /// Writing an entry into the container failed; the container was discarded.
    #[error("packaging failed at entry '{entry}': {reason}")]
    Packaging { entry: String, reason: String },

    // --- Orchestration ---

    /// A request tried to move between two stages that are not connected.
    #[error("invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // --- General ---

    /// A filesystem I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A catch-all for errors from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Alias for `Result<T, DocfillError>`.
pub type Result<T> = std::result::Result<T, DocfillError>;
