//! Compiled-script artifacts
//!
//! An artifact is a JSON envelope around a parsed `Program`, written next to
//! the source as `<name>.liltc`. The source hash lets the loader tell a
//! fresh artifact from a stale one.

use crate::interpreter::types::Program;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SOURCE_EXTENSION: &str = "lilt";
pub const ARTIFACT_EXTENSION: &str = "liltc";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed artifact: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub module: String,
    /// SHA-256 of the source this was built from; `None` for artifact-only modules
    #[serde(default)]
    pub source_hash: Option<String>,
    pub program: Program,
}

impl Artifact {
    pub fn new(module: &str, source: Option<&str>, program: Program) -> Self {
        Self {
            module: module.to_string(),
            source_hash: source.map(hash_source),
            program,
        }
    }

    /// Usable for `module` given its current source, if any
    pub fn is_fresh(&self, module: &str, source: Option<&str>) -> bool {
        if self.module != module {
            return false;
        }
        match (source, &self.source_hash) {
            (None, _) => true,
            (Some(text), Some(hash)) => *hash == hash_source(text),
            (Some(_), None) => false,
        }
    }
}

/// Hex SHA-256 of module source
pub fn hash_source(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn artifact_path(source: &Path) -> PathBuf {
    source.with_extension(ARTIFACT_EXTENSION)
}

pub fn read(path: &Path) -> Result<Artifact, ArtifactError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn write(path: &Path, artifact: &Artifact) -> Result<(), ArtifactError> {
    let text = serde_json::to_string(artifact)?;
    fs::write(path, text)?;
    Ok(())
}
