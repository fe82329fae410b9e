//! Conversion of fetched result pages into deliverable PDF artifacts.
//!
//! An [`Artifact`] owns a transient file on disk. The file is removed when the
//! artifact is dropped, so every exit path of the pipeline (delivered, delivery
//! failed, render failed half-way) releases it.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::RendererConfig;
use crate::domain::Identifier;
use crate::error::{CourierError, Result};

/// A rendered result document for exactly one identifier.
#[derive(Debug)]
pub struct Artifact {
    identifier: Identifier,
    file_name: String,
    path: PathBuf,
    file: Option<NamedTempFile>,
}

impl Artifact {
    /// Create an empty transient file for `identifier` inside `dir`.
    pub fn create_in(dir: &Path, identifier: &Identifier) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(&format!("{}_result_", identifier))
            .suffix(".pdf")
            .tempfile_in(dir)?;
        Ok(Self {
            identifier: identifier.clone(),
            file_name: format!("{}_result.pdf", identifier),
            path: file.path().to_path_buf(),
            file: Some(file),
        })
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Name the recipient sees for the uploaded document.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            match file.close() {
                Ok(()) => tracing::debug!(
                    identifier = %self.identifier,
                    path = %self.path.display(),
                    "Deleted artifact"
                ),
                Err(e) => tracing::warn!(
                    identifier = %self.identifier,
                    path = %self.path.display(),
                    error = %e,
                    "Failed to delete artifact"
                ),
            }
        }
    }
}

/// Converts raw result HTML into an artifact.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, document: &str, identifier: &Identifier) -> Result<Artifact>;
}

// ============================================================================
// Production Implementation: external converter process
// ============================================================================

/// Renders by piping the HTML into an external converter such as
/// `weasyprint - <output>`.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    config: RendererConfig,
    artifact_dir: PathBuf,
}

impl CommandRenderer {
    pub fn new(config: RendererConfig) -> Self {
        let artifact_dir = config
            .artifact_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        Self {
            config,
            artifact_dir,
        }
    }

    fn args_for(&self, output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        self.config
            .args
            .iter()
            .map(|arg| arg.replace("{output}", &output))
            .collect()
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    #[tracing::instrument(skip(self, document), fields(identifier = %identifier, document_len = document.len()))]
    async fn render(&self, document: &str, identifier: &Identifier) -> Result<Artifact> {
        let render_error = |reason: String| CourierError::Render {
            identifier: identifier.to_string(),
            reason,
        };

        let artifact = Artifact::create_in(&self.artifact_dir, identifier)?;

        let mut child = Command::new(&self.config.command)
            .args(self.args_for(artifact.path()))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| render_error(format!("failed to start {}: {}", self.config.command, e)))?;

        // Feed stdin while draining stderr so a chatty converter cannot
        // block on a full pipe. Dropping stdin closes it.
        let stdin = child.stdin.take();
        let write_document = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(document.as_bytes()).await,
                None => Ok(()),
            }
        };
        let (written, output) = tokio::join!(write_document, child.wait_with_output());
        let output =
            output.map_err(|e| render_error(format!("converter did not finish: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(render_error(format!(
                "{} exited with {}: {}",
                self.config.command,
                output.status,
                stderr.trim()
            )));
        }
        written.map_err(|e| render_error(format!("failed to write document: {}", e)))?;

        let size = tokio::fs::metadata(artifact.path()).await?.len();
        if size == 0 {
            return Err(render_error("converter produced an empty file".to_string()));
        }

        tracing::info!(path = %artifact.path().display(), size, "Generated PDF");
        Ok(artifact)
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

/// Mock renderer for testing.
///
/// Writes a small PDF-looking payload into a real transient file so artifact
/// cleanup can be observed, and fails for identifiers registered with
/// [`MockRenderer::fail_for`].
#[derive(Clone)]
pub struct MockRenderer {
    artifact_dir: PathBuf,
    failing: Arc<Mutex<HashSet<String>>>,
    rendered: Arc<Mutex<Vec<String>>>,
}

impl MockRenderer {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
            failing: Arc::new(Mutex::new(HashSet::new())),
            rendered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fail_for(&self, identifier: &str) {
        self.failing.lock().insert(identifier.to_string());
    }

    /// Identifiers that produced an artifact, in order.
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, document: &str, identifier: &Identifier) -> Result<Artifact> {
        let artifact = Artifact::create_in(&self.artifact_dir, identifier)?;
        if self.failing.lock().contains(identifier.as_str()) {
            return Err(CourierError::Render {
                identifier: identifier.to_string(),
                reason: "mock render failure".to_string(),
            });
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .open(artifact.path())?;
        file.write_all(b"%PDF-1.4\n")?;
        file.write_all(document.as_bytes())?;

        self.rendered.lock().push(identifier.to_string());
        Ok(artifact)
    }
}
