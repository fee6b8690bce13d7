//! Packaging generated artifacts into a single ZIP container.
//!
//! Packaging is the synchronization barrier of the batch flow: it takes a fully
//! materialized artifact sequence (nothing is still being produced) and returns a
//! [`Container`] only after the archive has been finalized. Any failure drops the
//! partially written buffer, so callers never observe a half-built archive.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::artifacts::{Container, GeneratedArtifact};
use crate::error::{DocfillError, Result};

/// MIME type of the produced container.
pub const CONTAINER_CONTENT_TYPE: &str = "application/zip";

/// Writes artifacts into a deflate-compressed ZIP archive.
#[derive(Debug, Clone)]
pub struct ArtifactPackager {
    compression: CompressionMethod,
}

impl Default for ArtifactPackager {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactPackager {
    pub fn new() -> Self {
        Self {
            compression: CompressionMethod::Deflated,
        }
    }

    /// Store entries uncompressed (already-compressed payloads such as PDFs).
    pub fn stored() -> Self {
        Self {
            compression: CompressionMethod::Stored,
        }
    }

    /// Pack `artifacts` in order, one entry per artifact, named by artifact name.
    pub fn pack(&self, artifacts: &[GeneratedArtifact]) -> Result<Container> {
        if artifacts.is_empty() {
            return Err(DocfillError::EmptyPackage);
        }

        let mut seen = HashSet::with_capacity(artifacts.len());
        for artifact in artifacts {
            if !seen.insert(artifact.name.as_str()) {
                return Err(DocfillError::Packaging {
                    entry: artifact.name.clone(),
                    reason: "duplicate entry name".into(),
                });
            }
        }

        let options = SimpleFileOptions::default().compression_method(self.compression);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut entries = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let fail = |reason: String| DocfillError::Packaging {
                entry: artifact.name.clone(),
                reason,
            };
            writer
                .start_file(artifact.name.as_str(), options)
                .map_err(|e| fail(e.to_string()))?;
            writer
                .write_all(&artifact.content)
                .map_err(|e| fail(e.to_string()))?;
            entries.push(artifact.name.clone());
        }

        let bytes = writer
            .finish()
            .map_err(|e| DocfillError::Packaging {
                entry: "<central directory>".into(),
                reason: e.to_string(),
            })?
            .into_inner();

        tracing::debug!(
            entries = entries.len(),
            bytes = bytes.len(),
            "container finalized"
        );

        Ok(Container { entries, bytes })
    }
}
