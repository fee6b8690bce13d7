//! Seams for the external collaborators of the engine.
//!
//! The core never parses binary document formats itself. Text extraction, tabular
//! parsing, document rendering, and format conversion are reached through the traits
//! below; `docfill-office` provides the Office/LibreOffice implementations and this
//! module provides the plain-text ones.

use async_trait::async_trait;

use crate::artifacts::GeneratedArtifact;
use crate::error::{DocfillError, Result};
use crate::record::Record;

/// Information about a missing prerequisite tool.
#[derive(Debug, Clone)]
pub struct PrerequisiteError {
    pub tool_name: String,
    pub install_instructions: String,
}

/// Turns uploaded template bytes into plain text.
pub trait TextExtractor: Send + Sync {
    /// Format discriminator handled by this extractor (e.g. `"docx"`).
    fn format(&self) -> &'static str;

    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Turns uploaded tabular data into an ordered sequence of records.
pub trait TabularParser: Send + Sync {
    /// Format discriminators accepted by [`TabularParser::parse`].
    fn formats(&self) -> &'static [&'static str];

    fn supports(&self, format: &str) -> bool {
        self.formats().iter().any(|f| f.eq_ignore_ascii_case(format))
    }

    /// Parse `bytes`, one record per data row, preserving row order.
    fn parse(&self, bytes: &[u8], format: &str) -> Result<Vec<Record>>;
}

/// Turns filled text into document bytes.
pub trait DocumentRenderer: Send + Sync {
    /// File extension of rendered documents, without the dot.
    fn extension(&self) -> &'static str;

    fn content_type(&self) -> &'static str;

    fn render(&self, text: &str) -> Result<Vec<u8>>;
}

/// Converts a rendered document into its delivery format (e.g. DOCX to PDF).
#[async_trait]
pub trait Converter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Extension of converted output, without the dot.
    fn target_extension(&self) -> &'static str;

    fn content_type(&self) -> &'static str;

    /// Check that every external tool the converter needs is installed.
    fn check_prerequisites(&self) -> std::result::Result<(), Vec<PrerequisiteError>> {
        Ok(())
    }

    async fn convert(&self, artifact: GeneratedArtifact) -> Result<GeneratedArtifact>;
}

/// Extractor for templates that are already UTF-8 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn format(&self) -> &'static str {
        "txt"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DocfillError::Extraction(format!("template is not valid UTF-8: {e}")))
    }
}

/// Renderer that emits the filled text as UTF-8 bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextRenderer;

impl DocumentRenderer for PlainTextRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn render(&self, text: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }
}

/// Converter that delivers the rendered document unchanged.
#[derive(Debug, Clone)]
pub struct Passthrough {
    extension: &'static str,
    content_type: &'static str,
}

impl Passthrough {
    /// Pass through documents produced by `renderer`.
    pub fn for_renderer(renderer: &dyn DocumentRenderer) -> Self {
        Self {
            extension: renderer.extension(),
            content_type: renderer.content_type(),
        }
    }
}

#[async_trait]
impl Converter for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn target_extension(&self) -> &'static str {
        self.extension
    }

    fn content_type(&self) -> &'static str {
        self.content_type
    }

    async fn convert(&self, artifact: GeneratedArtifact) -> Result<GeneratedArtifact> {
        Ok(artifact)
    }
}
