//! Generated documents and the values handed back to the transport.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// One filled output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArtifact {
    /// File name, already sanitized (e.g. `Ann.docx`).
    pub name: String,
    /// Document bytes.
    pub content: Vec<u8>,
}

impl GeneratedArtifact {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// The name without its final extension.
    pub fn stem(&self) -> &str {
        self.name
            .rsplit_once('.')
            .map_or(self.name.as_str(), |(stem, _)| stem)
    }
}

/// A finished archive. Only [`crate::package::ArtifactPackager`] constructs one, and
/// only after every entry has been written and the archive finalized.
#[derive(Debug, Clone)]
pub struct Container {
    pub(crate) entries: Vec<String>,
    pub(crate) bytes: Vec<u8>,
}

impl Container {
    /// Entry names in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The final output of a generate request.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Request that produced this output; scopes the on-disk file name.
    pub request_id: String,
    /// Suggested download name (e.g. `invoice.pdf`, `documents.zip`).
    pub file_name: String,
    /// MIME type of `bytes`.
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Delivery {
    /// Write the output into `dir` as `<request_id>-<file_name>`.
    ///
    /// The file appears atomically: it is written to a temporary file in `dir`
    /// and renamed into place, so a reader never sees a half-written output.
    pub fn write_into(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}-{}", self.request_id, self.file_name));
        self.write_to(&path)?;
        Ok(path)
    }

    /// Write the output to an exact path, atomically.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, &self.bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
