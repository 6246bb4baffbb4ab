//! # Image Assets
//!
//! Fetching and caching of per-entry images for the grid.
//!
//! References starting with `http://` or `https://` are downloaded; anything
//! else is a path relative to the local asset directory. Decoded images are
//! resized to the cell size once and kept in memory. Failures are not cached,
//! so a flaky asset is retried on the next render.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::RgbaImage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Per-cell asset failure; never fatal for a render
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to fetch '{reference}': {reason}")]
    Fetch { reference: String, reason: String },

    #[error("failed to decode '{reference}': {reason}")]
    Decode { reference: String, reason: String },
}

/// Something that can turn an image reference into raw bytes
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError>;
}

/// Downloads `http(s)` references
pub struct HttpAssetSource {
    client: reqwest::Client,
}

impl HttpAssetSource {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("dexkeeper/0.1")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        let fetch_err = |reason: String| AssetError::Fetch {
            reference: reference.to_string(),
            reason,
        };

        let response = self
            .client
            .get(reference)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_err(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Reads references as paths under a base directory
pub struct DirAssetSource {
    base: PathBuf,
}

impl DirAssetSource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl AssetSource for DirAssetSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        let path = self.base.join(reference.trim_start_matches('/'));
        tokio::fs::read(&path).await.map_err(|e| AssetError::Fetch {
            reference: reference.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Routes remote references to HTTP and everything else to the asset directory
pub struct DefaultAssetSource {
    http: HttpAssetSource,
    local: DirAssetSource,
}

impl DefaultAssetSource {
    pub fn new(asset_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpAssetSource::new()?,
            local: DirAssetSource::new(asset_dir),
        })
    }
}

#[async_trait]
impl AssetSource for DefaultAssetSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        if is_remote(reference) {
            self.http.fetch(reference).await
        } else {
            self.local.fetch(reference).await
        }
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// In-memory source keyed by reference
#[derive(Default)]
pub struct MemoryAssetSource {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.assets.insert(reference.into(), bytes);
        self
    }
}

#[async_trait]
impl AssetSource for MemoryAssetSource {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, AssetError> {
        self.assets
            .get(reference)
            .cloned()
            .ok_or_else(|| AssetError::Fetch {
                reference: reference.to_string(),
                reason: "not found".to_string(),
            })
    }
}

/// Decoded, cell-sized images keyed by reference
pub struct AssetCache {
    source: Arc<dyn AssetSource>,
    size: u32,
    images: RwLock<HashMap<String, Arc<RgbaImage>>>,
}

impl AssetCache {
    pub fn new(source: Arc<dyn AssetSource>, size: u32) -> Self {
        Self {
            source,
            size: size.max(1),
            images: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch, decode and resize an image, or return the cached copy
    pub async fn get(&self, reference: &str) -> Result<Arc<RgbaImage>, AssetError> {
        if let Some(image) = self.images.read().await.get(reference) {
            return Ok(Arc::clone(image));
        }

        let bytes = self.source.fetch(reference).await?;
        let image = Arc::new(self.decode(reference, &bytes)?);

        self.images
            .write()
            .await
            .insert(reference.to_string(), Arc::clone(&image));
        tracing::debug!(reference, "Asset cached");

        Ok(image)
    }

    pub async fn len(&self) -> usize {
        self.images.read().await.len()
    }

    fn decode(&self, reference: &str, bytes: &[u8]) -> Result<RgbaImage, AssetError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| AssetError::Decode {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;

        Ok(decoded
            .resize_exact(self.size, self.size, FilterType::Triangle)
            .to_rgba8())
    }
}
