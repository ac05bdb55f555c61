//! Runtime configuration
//!
//! Layers, lowest precedence first:
//! 1. `.env` file (loaded into the process environment)
//! 2. TOML file: `config_path(..)`, else `LILT_CONFIG_PATH`, else `lilt.toml` if present
//! 3. Environment variables: `LILT__RUNTIME__MAX_STEPS=1000`, `LILT__SEARCH__NORMAL=a,b`
//! 4. Builder overrides

use crate::environment::Tier;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_VAR: &str = "LILT_CONFIG_PATH";
pub const DEFAULT_CONFIG_FILE: &str = "lilt.toml";
pub const DEFAULT_TRACEBACK_LIMIT: usize = 256;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 20_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub runtime: RuntimeConfig,
}

/// Search locations per tier, in lookup order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub natives: Vec<PathBuf>,
    pub builtins: Vec<PathBuf>,
    pub pre_library: Vec<PathBuf>,
    pub normal: Vec<PathBuf>,
}

impl SearchConfig {
    pub fn locations(&self, tier: Tier) -> &[PathBuf] {
        match tier {
            Tier::Native => &self.natives,
            Tier::Builtin => &self.builtins,
            Tier::PreLibrary => &self.pre_library,
            Tier::Normal => &self.normal,
        }
    }

    fn locations_mut(&mut self, tier: Tier) -> &mut Vec<PathBuf> {
        match tier {
            Tier::Native => &mut self.natives,
            Tier::Builtin => &mut self.builtins,
            Tier::PreLibrary => &mut self.pre_library,
            Tier::Normal => &mut self.normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Step budget per `run_script`; unlimited when absent
    pub max_steps: Option<u64>,
    /// Trace frames kept before the oldest are dropped (0 = unbounded)
    pub traceback_limit: usize,
    /// Nested user calls before a call throws `stack_overflow` (0 = unbounded)
    pub max_call_depth: usize,
    /// Write `.liltc` artifacts after parsing sources
    pub write_artifacts: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            traceback_limit: DEFAULT_TRACEBACK_LIMIT,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            write_artifacts: false,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}

/* ===================== Builder ===================== */

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    max_steps: Option<u64>,
    traceback_limit: Option<usize>,
    max_call_depth: Option<usize>,
    write_artifacts: Option<bool>,
    search: Vec<(Tier, PathBuf)>,
}

impl ConfigBuilder {
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn traceback_limit(mut self, limit: usize) -> Self {
        self.traceback_limit = Some(limit);
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = Some(depth);
        self
    }

    pub fn write_artifacts(mut self, enabled: bool) -> Self {
        self.write_artifacts = Some(enabled);
        self
    }

    /// Append a search location after any configured ones
    pub fn search_location(mut self, tier: Tier, path: impl Into<PathBuf>) -> Self {
        self.search.push((tier, path.into()));
        self
    }

    pub fn build(self) -> Result<Config> {
        dotenvy::dotenv().ok();

        let mut sources = config::Config::builder();
        if let Some(path) = self.resolve_config_path() {
            sources = sources.add_source(config::File::from(path.as_path()).required(true));
        }
        sources = sources.add_source(
            config::Environment::with_prefix("LILT")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("search.natives")
                .with_list_parse_key("search.builtins")
                .with_list_parse_key("search.pre_library")
                .with_list_parse_key("search.normal"),
        );

        let mut config: Config = sources
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if let Some(steps) = self.max_steps {
            config.runtime.max_steps = Some(steps);
        }
        if let Some(limit) = self.traceback_limit {
            config.runtime.traceback_limit = limit;
        }
        if let Some(depth) = self.max_call_depth {
            config.runtime.max_call_depth = depth;
        }
        if let Some(enabled) = self.write_artifacts {
            config.runtime.write_artifacts = enabled;
        }
        for (tier, path) in self.search {
            config.search.locations_mut(tier).push(path);
        }

        Ok(config)
    }

    fn resolve_config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            return Some(PathBuf::from(path));
        }
        let default = Path::new(DEFAULT_CONFIG_FILE);
        default.exists().then(|| default.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_file(contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lilt-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("lilt.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.runtime.traceback_limit, DEFAULT_TRACEBACK_LIMIT);
        assert_eq!(config.runtime.max_steps, None);
        assert_eq!(config.runtime.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        assert!(!config.runtime.write_artifacts);
        assert!(config.search.normal.is_empty());
    }

    #[test]
    fn test_file_then_overrides() {
        let path = temp_file(
            r#"
            [search]
            builtins = ["lib/builtins"]
            normal = ["scripts"]

            [runtime]
            max_steps = 500
            max_call_depth = 64
            write_artifacts = true
            "#,
        );

        let config = Config::builder()
            .config_path(Some(path))
            .max_steps(10)
            .search_location(Tier::Normal, "more")
            .build()
            .unwrap();

        assert_eq!(config.runtime.max_steps, Some(10));
        assert_eq!(config.runtime.max_call_depth, 64);
        assert!(config.runtime.write_artifacts);
        assert_eq!(config.search.builtins, vec![PathBuf::from("lib/builtins")]);
        assert_eq!(
            config.search.locations(Tier::Normal),
            [PathBuf::from("scripts"), PathBuf::from("more")]
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let missing = std::env::temp_dir().join(format!("lilt-missing-{}.toml", uuid::Uuid::new_v4()));
        assert!(Config::builder().config_path(Some(missing)).build().is_err());
    }

    #[test]
    fn test_to_toml_round_trip() {
        let config = Config::builder()
            .config_path(Some(temp_file("")))
            .traceback_limit(8)
            .search_location(Tier::Native, "natives")
            .build()
            .unwrap();

        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.runtime.traceback_limit, 8);
        assert_eq!(parsed.search.natives, vec![PathBuf::from("natives")]);
    }
}
