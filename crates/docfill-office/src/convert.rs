//! Document conversion through a headless LibreOffice (`soffice`).
//!
//! Each conversion runs in its own scratch directory under
//! [`EngineConfig::scratch_dir`], with its own LibreOffice user profile so
//! concurrent conversions do not contend for the profile lock. The directory is
//! removed when the conversion returns, fails, or is cancelled by a timeout
//! (the child process is killed on drop).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use url::Url;

use docfill_core::artifacts::GeneratedArtifact;
use docfill_core::backend::{Converter, PrerequisiteError};
use docfill_core::config::EngineConfig;
use docfill_core::error::{DocfillError, Result};

const INSTALL_URL: &str = "https://www.libreoffice.org/download/";

/// Converts rendered documents to PDF with LibreOffice.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    binary: String,
    scratch_dir: PathBuf,
}

impl LibreOfficeConverter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            binary: config.converter_binary.clone(),
            scratch_dir: config.scratch_dir.clone(),
        }
    }

    fn locate(&self) -> Result<PathBuf> {
        which::which(&self.binary).map_err(|_| DocfillError::MissingTool {
            name: self.binary.clone(),
            install: INSTALL_URL.into(),
        })
    }
}

#[async_trait]
impl Converter for LibreOfficeConverter {
    fn name(&self) -> &'static str {
        "libreoffice"
    }

    fn target_extension(&self) -> &'static str {
        "pdf"
    }

    fn content_type(&self) -> &'static str {
        "application/pdf"
    }

    fn check_prerequisites(&self) -> std::result::Result<(), Vec<PrerequisiteError>> {
        match self.locate() {
            Ok(_) => Ok(()),
            Err(_) => Err(vec![PrerequisiteError {
                tool_name: self.binary.clone(),
                install_instructions: INSTALL_URL.into(),
            }]),
        }
    }

    async fn convert(&self, artifact: GeneratedArtifact) -> Result<GeneratedArtifact> {
        let binary = self.locate()?;

        std::fs::create_dir_all(&self.scratch_dir)?;
        let workdir = tempfile::Builder::new()
            .prefix("docfill-convert-")
            .tempdir_in(&self.scratch_dir)?;

        let input = workdir.path().join(&artifact.name);
        tokio::fs::write(&input, &artifact.content).await?;
        let profile = profile_url(&std::path::absolute(workdir.path())?.join("profile"))?;

        tracing::info!(input = %artifact.name, "converting with {}", binary.display());
        let output = Command::new(&binary)
            .arg(format!("-env:UserInstallation={profile}"))
            .args(["--headless", "--norestore", "--convert-to"])
            .arg(self.target_extension())
            .arg("--outdir")
            .arg(workdir.path())
            .arg(&input)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DocfillError::Conversion(format!("failed to launch {}: {e}", self.binary)))?;

        if !output.status.success() {
            return Err(DocfillError::Conversion(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let name = format!("{}.{}", artifact.stem(), self.target_extension());
        let content = tokio::fs::read(workdir.path().join(&name))
            .await
            .map_err(|_| {
                DocfillError::Conversion(format!(
                    "{} produced no {name}: {}",
                    self.binary,
                    String::from_utf8_lossy(&output.stderr).trim()
                ))
            })?;

        tracing::debug!(output = %name, bytes = content.len(), "conversion finished");
        Ok(GeneratedArtifact::new(name, content))
    }
}

/// `file://` URL of a LibreOffice user profile directory, percent-encoded.
fn profile_url(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|()| {
            DocfillError::Conversion(format!("cannot build a file URL for {}", path.display()))
        })
}
