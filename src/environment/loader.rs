//! Module index, resolution stack and script cache
//!
//! Module names are the file path relative to its search location with
//! separators replaced by dots: `<location>/a/b/c.lilt` is `a.b.c`.

use super::artifact::{ARTIFACT_EXTENSION, SOURCE_EXTENSION};
use super::parser::ParseError;
use super::script::{Script, Tier};
use crate::error::EnvironmentError;
use crate::interpreter::errors::{ABSENT, CIRCULAR, INVALID_SYNTAX, LOADING_FAILED};
use crate::interpreter::types::ExecResult;
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/* ===================== Errors ===================== */

/// Why a module could not be produced
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("module '{0}' not found")]
    Absent(String),

    #[error("circular import: {chain}")]
    Circular { module: String, chain: String },

    #[error("invalid syntax: {0}")]
    InvalidSyntax(#[from] ParseError),

    #[error("failed to load module '{module}': {reason}")]
    LoadingFailed { module: String, reason: String },
}

impl ImportError {
    /// Error code scripts see when they catch the failure
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Absent(_) => ABSENT,
            ImportError::Circular { .. } => CIRCULAR,
            ImportError::InvalidSyntax(_) => INVALID_SYNTAX,
            ImportError::LoadingFailed { .. } => LOADING_FAILED,
        }
    }
}

/// Failure of `get_module`
#[derive(Debug)]
pub enum ModuleError {
    Import(ImportError),
    /// The initializer ended abnormally; the result is what it produced
    Initialization(ExecResult),
}

impl From<ImportError> for ModuleError {
    fn from(err: ImportError) -> Self {
        ModuleError::Import(err)
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleError::Import(err) => write!(f, "{}", err),
            ModuleError::Initialization(result) => write!(
                f,
                "initializer ended {:?} with {}",
                result.state(),
                result.value()
            ),
        }
    }
}

/* ===================== Index ===================== */

/// Files found for one module in its winning location
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleFiles {
    pub tier: Tier,
    pub source: Option<PathBuf>,
    pub artifact: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct Loader {
    index: IndexMap<String, ModuleFiles>,
    /// Modules whose initializer is currently running, outermost first
    resolving: Vec<String>,
    cache: IndexMap<String, Script>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index from the working search locations, in order
    pub fn reindex(&mut self, locations: &[(Tier, PathBuf)]) -> Result<(), EnvironmentError> {
        let mut index: IndexMap<String, ModuleFiles> = IndexMap::new();

        for (tier, location) in locations {
            if !location.is_dir() {
                warn!(location = %location.display(), "search location is not a directory");
                continue;
            }

            let found = scan(*tier, location)?;
            for (name, files) in found {
                if let Some(existing) = index.get(&name) {
                    warn!(
                        module = %name,
                        kept = ?existing.source.as_ref().or(existing.artifact.as_ref()),
                        shadowed = %location.display(),
                        "duplicate module, earlier location wins"
                    );
                    continue;
                }
                index.insert(name, files);
            }
        }

        debug!(modules = index.len(), locations = locations.len(), "module index built");
        self.index = index;
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&ModuleFiles> {
        self.index.get(name)
    }

    /// Indexed modules of one tier, sorted by name
    pub fn names_in(&self, tier: Tier) -> Vec<String> {
        let mut names: Vec<String> = self
            .index
            .iter()
            .filter(|(_, files)| files.tier == tier)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /* ---------- resolution stack ---------- */

    /// Mark a module as resolving; fails if it already is
    pub fn enter(&mut self, name: &str) -> Result<(), ImportError> {
        if let Some(start) = self.resolving.iter().position(|m| m == name) {
            let mut chain: Vec<&str> = self.resolving[start..].iter().map(String::as_str).collect();
            chain.push(name);
            return Err(ImportError::Circular {
                module: name.to_string(),
                chain: chain.join(" -> "),
            });
        }
        self.resolving.push(name.to_string());
        Ok(())
    }

    pub fn leave(&mut self, name: &str) {
        if let Some(pos) = self.resolving.iter().rposition(|m| m == name) {
            self.resolving.remove(pos);
        }
    }

    pub fn resolving(&self) -> &[String] {
        &self.resolving
    }

    /* ---------- cache ---------- */

    pub fn cached(&self, name: &str) -> Option<&Script> {
        self.cache.get(name)
    }

    pub fn store(&mut self, script: Script) {
        self.cache.insert(script.name.clone(), script);
    }

    /// Every cached script, in load order
    pub fn scripts(&self) -> impl Iterator<Item = &Script> {
        self.cache.values()
    }
}

/// Modules under one location, source and artifact paired by name
fn scan(tier: Tier, location: &Path) -> Result<IndexMap<String, ModuleFiles>, EnvironmentError> {
    let mut found: IndexMap<String, ModuleFiles> = IndexMap::new();

    for entry in WalkDir::new(location).sort_by_file_name() {
        let entry = entry.map_err(|source| EnvironmentError::Index {
            path: location.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_source = match path.extension().and_then(|e| e.to_str()) {
            Some(SOURCE_EXTENSION) => true,
            Some(ARTIFACT_EXTENSION) => false,
            _ => continue,
        };
        let Some(name) = path.strip_prefix(location).ok().and_then(module_name) else {
            warn!(path = %path.display(), "skipping file with unusable module name");
            continue;
        };

        let files = found.entry(name).or_insert_with(|| ModuleFiles {
            tier,
            source: None,
            artifact: None,
        });
        if is_source {
            files.source = Some(path.to_path_buf());
        } else {
            files.artifact = Some(path.to_path_buf());
        }
    }

    Ok(found)
}

/// `a/b/c.lilt` -> `a.b.c`
fn module_name(relative: &Path) -> Option<String> {
    let stem = relative.with_extension("");
    let parts: Option<Vec<&str>> = stem.components().map(|c| c.as_os_str().to_str()).collect();
    let parts = parts?;
    if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts.join("."))
}
