//! Where each backend keeps its artifacts.

use std::path::{Path, PathBuf};

use super::backend::{Artifact, Backend};
use super::error::HarnessError;

/// Default artifact root, relative to the working directory.
pub const DEFAULT_ROOT: &str = "models/mlserver";

/// Artifact directory layout: `<root>/<backend>/<file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLayout {
    root: PathBuf,
}

impl Default for ModelLayout {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl ModelLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend_dir(&self, backend: Backend) -> PathBuf {
        self.root.join(backend.name())
    }

    pub fn artifact_path(&self, backend: Backend, artifact: Artifact) -> PathBuf {
        self.backend_dir(backend).join(artifact.file_name())
    }

    /// Create the backend directory (and parents) before saving.
    pub fn prepare(&self, backend: Backend) -> Result<PathBuf, HarnessError> {
        let dir = self.backend_dir(backend);
        std::fs::create_dir_all(&dir).map_err(|source| HarnessError::Prepare {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}
