//! Template storage shared by all requests.
//!
//! ## Layout
//!
//! ```text
//! <storage_dir>/
//! ├── 3f2c…e1.docx   # uploaded source, kept for auditing and re-extraction
//! └── 3f2c…e1.extracted  # normalized extracted text, what generate reads
//! ```
//!
//! References are random UUIDs, so concurrent uploads never collide. A reference
//! must look like one (32 lowercase hex digits) before it is turned into a path.

use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{DocfillError, Result};

const TEXT_EXTENSION: &str = "extracted";

/// Extracted template text plus the reference that re-fetches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub reference: String,
    pub text: String,
}

/// Filesystem-backed template store rooted at [`EngineConfig::storage_dir`].
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            root: config.storage_dir.clone(),
        }
    }

    /// Persist an uploaded template and its extracted text under a fresh reference.
    pub fn put(&self, source: &[u8], format: &str, text: &str) -> Result<Template> {
        std::fs::create_dir_all(&self.root)?;
        let reference = Uuid::new_v4().simple().to_string();
        self.write_entry(&reference, source, format, text)?;

        tracing::info!(template = %reference, format = %format, "stored template");
        Ok(Template {
            reference,
            text: text.to_string(),
        })
    }

    /// Load the extracted text of a stored template.
    pub fn get(&self, reference: &str) -> Result<Template> {
        validate_reference(reference)?;
        let path = self.text_path(reference);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Template {
                reference: reference.to_string(),
                text,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DocfillError::TemplateNotFound(reference.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a stored template (source and text).
    pub fn remove(&self, reference: &str) -> Result<()> {
        validate_reference(reference)?;
        let mut removed = false;
        for path in self.files_of(reference)? {
            std::fs::remove_file(&path)?;
            removed = true;
        }
        if !removed {
            return Err(DocfillError::TemplateNotFound(reference.to_string()));
        }
        tracing::info!(template = %reference, "removed template");
        Ok(())
    }

    /// All stored references, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut refs = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == TEXT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if is_reference(stem) {
                        refs.push(stem.to_string());
                    }
                }
            }
        }
        refs.sort();
        Ok(refs)
    }

    /// Write source then text. The text file makes the reference visible, so a
    /// failed text write removes the source again.
    fn write_entry(&self, reference: &str, source: &[u8], format: &str, text: &str) -> Result<()> {
        let source_path = self.root.join(format!("{reference}.{format}"));
        write_atomic(&self.root, &source_path, source)?;
        if let Err(err) = write_atomic(&self.root, &self.text_path(reference), text.as_bytes()) {
            if let Err(cleanup) = std::fs::remove_file(&source_path) {
                tracing::warn!(path = %source_path.display(), error = %cleanup, "failed to remove orphaned template source");
            }
            return Err(err);
        }
        Ok(())
    }

    fn text_path(&self, reference: &str) -> PathBuf {
        self.root.join(format!("{reference}.{TEXT_EXTENSION}"))
    }

    fn files_of(&self, reference: &str) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(reference) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn is_reference(s: &str) -> bool {
    s.len() == 32 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn validate_reference(reference: &str) -> Result<()> {
    if is_reference(reference) {
        Ok(())
    } else {
        Err(DocfillError::TemplateNotFound(reference.to_string()))
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
