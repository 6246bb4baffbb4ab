//! # IO Utilities
//!
//! File system helpers for the `.dexkeeper` runtime directory, which holds
//! the catalog files, config, database and local image assets.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable that relocates the runtime directory
pub const RUNTIME_PATH_ENV: &str = "DEXKEEPER_RUNTIME_PATH";

/// Get the runtime directory path (.dexkeeper)
pub fn get_runtime_path() -> PathBuf {
    if let Ok(path) = std::env::var(RUNTIME_PATH_ENV) {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".dexkeeper")
}

/// Write bytes to a path, creating parent directories
pub async fn write_bytes(path: impl AsRef<Path>, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write file: {:?}", path))
}
