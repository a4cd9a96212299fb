//! Domain artifacts that the workflow ships to the remote and back.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// A value that can be serialised to, and rebuilt from, a local file.
///
/// The file format is opaque to the workflow; the file is not touched between
/// `save` and the upload, nor between the download and `load`.
pub trait Artifact: Sized {
    /// Suffix for the local temporary files holding this artifact.
    const SUFFIX: &'static str = ".nc";

    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>;
}

/// An artifact that is already a file: its bytes are shipped unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    bytes: Vec<u8>,
}

impl FileArtifact {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Artifact for FileArtifact {
    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.bytes).map_err(|e| {
            Error::Artifact(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    fn load(path: &Path) -> Result<Self> {
        fs::read(path)
            .map(Self::from_bytes)
            .map_err(|e| Error::Artifact(format!("Failed to read {}: {}", path.display(), e)))
    }
}
