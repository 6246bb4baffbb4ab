//! # Configuration
//!
//! `DexConfig` is read from `<runtime>/config.json` when present. Every field
//! has a default, so a partial file is fine. Relative paths are resolved
//! against the runtime directory. `DEXKEEPER_OWNER_ID` and
//! `DEXKEEPER_DB_PATH` override the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::render::GridConfig;
use crate::search::DEFAULT_THRESHOLD;
use crate::state::db::DB_FILE_NAME;
use crate::state::io::get_runtime_path;

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const OWNER_ID_ENV: &str = "DEXKEEPER_OWNER_ID";
pub const DB_PATH_ENV: &str = "DEXKEEPER_DB_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DexConfig {
    /// Full catalog JSON
    pub catalog_path: PathBuf,
    /// Ordered display subset JSON
    pub display_path: PathBuf,
    pub db_path: PathBuf,
    /// Base directory for non-URL image references
    pub asset_dir: PathBuf,
    pub grid: GridConfig,
    pub session_timeout_secs: u64,
    pub fuzzy_threshold: f64,
    /// Only this user may use the routes; anyone when unset
    pub owner_id: Option<String>,
    pub port: u16,
    #[serde(skip)]
    runtime_dir: PathBuf,
}

impl Default for DexConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("pokedex.json"),
            display_path: PathBuf::from("swsh.json"),
            db_path: PathBuf::from(DB_FILE_NAME),
            asset_dir: PathBuf::from("assets"),
            grid: GridConfig::default(),
            session_timeout_secs: 60,
            fuzzy_threshold: DEFAULT_THRESHOLD,
            owner_id: None,
            port: 3000,
            runtime_dir: PathBuf::from("."),
        }
    }
}

impl DexConfig {
    /// Load from the runtime directory and apply environment overrides
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from(get_runtime_path()).await?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load `config.json` from a directory, falling back to defaults
    pub async fn load_from(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let path = dir.join(CONFIG_FILE_NAME);

        let mut config = if path.exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read config: {:?}", path))?;
            serde_json::from_str::<Self>(&content)
                .with_context(|| format!("Failed to parse config: {:?}", path))?
        } else {
            tracing::debug!(?path, "No config file, using defaults");
            Self::default()
        };

        config.runtime_dir = dir.to_path_buf();
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(owner) = lookup(OWNER_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.owner_id = Some(owner.trim().to_string());
        }
        if let Some(db_path) = lookup(DB_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.db_path = PathBuf::from(db_path);
        }
    }

    /// Use a different base directory for relative paths
    pub fn with_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    pub fn runtime_dir(&self) -> &Path {
        &self.runtime_dir
    }

    /// Resolve a configured path against the runtime directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.runtime_dir.join(path)
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs.max(1))
    }
}
