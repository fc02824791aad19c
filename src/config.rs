use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::formula::{CompileOptions, Dialect};

/// User settings read from `<config dir>/formula-sql/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_dialect: Dialect,
    /// Fail compilation on pass-through functions instead of emitting them.
    pub strict: bool,
    /// Column `RECORD_ID()` refers to.
    pub record_id_column: String,
    pub table_alias: Option<String>,
    /// Re-parse compiled SQL before printing it.
    pub verify: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_dialect: Dialect::Postgres,
            strict: false,
            record_id_column: "id".to_string(),
            table_alias: None,
            verify: false,
        }
    }
}

impl EngineConfig {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("formula-sql")
            .join("config.toml")
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        debug!(path = %path.display(), dialect = %config.default_dialect, "loaded config");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            table_alias: self.table_alias.clone(),
            record_id_column: self.record_id_column.clone(),
            ..CompileOptions::default()
        }
    }
}
