//! Shared fixtures for unit tests.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use crate::catalog::{Catalog, CatalogEntry, DisplaySubset, EntryMetadata, TypeName};
use crate::events::{Response, ResponseSink};
use crate::render::{AssetCache, GridConfig, GridRenderer, MemoryAssetSource};
use crate::search::FuzzyResolver;
use crate::state::DexDb;

pub const SAMPLE_CATALOG: &str = r#"[
    {"id": 1, "name": {"english": "Bulbasaur"}, "type": ["Grass", "Poison"],
     "image": {"sprite": "sprites/1.png", "hires": "hires/1.png"}},
    {"id": 4, "name": {"english": "Charmander"}, "type": ["Fire"],
     "image": {"sprite": "sprites/4.png"}},
    {"id": 6, "name": {"english": "Charizard"}, "type": ["Fire", "Flying"],
     "image": {"sprite": "sprites/6.png"}},
    {"id": 7, "name": {"english": "Squirtle"}, "type": ["Water"],
     "image": {"sprite": "sprites/7.png"}},
    {"id": 25, "name": {"english": "Pikachu"}, "type": ["Electric"],
     "image": {"sprite": "sprites/25.png", "hires": "hires/25.png"}},
    {"id": 94, "name": {"english": "Gengar"}, "type": ["Ghost", "Poison"],
     "image": {"sprite": "sprites/94.png"}},
    {"id": 151, "name": {"english": "Mew"}, "type": ["Psychic"]},
    {"id": 260, "name": {"english": "Swampert"}, "type": ["Water", "Ground"],
     "image": {"sprite": "sprites/260.png"}}
]"#;

/// Display order; "Ghostly" has no catalog entry
pub const SAMPLE_SUBSET: [&str; 9] = [
    "Bulbasaur",
    "Charmander",
    "Charizard",
    "Squirtle",
    "Pikachu",
    "Gengar",
    "Mew",
    "Swampert",
    "Ghostly",
];

pub fn sample_catalog() -> Catalog {
    Catalog::from_json(SAMPLE_CATALOG).unwrap()
}

pub fn sample_subset() -> DisplaySubset {
    DisplaySubset::new(SAMPLE_SUBSET.iter().map(|n| n.to_string()).collect()).unwrap()
}

pub fn sample_resolver() -> Arc<FuzzyResolver> {
    Arc::new(FuzzyResolver::new(&sample_subset()))
}

/// One opaque sprite per catalog entry that has an image
pub fn sample_assets() -> MemoryAssetSource {
    sample_catalog()
        .iter()
        .filter_map(|entry| entry.image.clone().map(|image| (entry.id, image)))
        .fold(MemoryAssetSource::new(), |source, (id, image)| {
            let shade = (id % 200) as u8 + 40;
            source.with_asset(image, solid_png(8, [shade, 80, 200 - shade / 2]))
        })
}

/// PNG bytes of a square of one opaque color
pub fn solid_png(size: u32, rgb: [u8; 3]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(size, size, Rgba([rgb[0], rgb[1], rgb[2], 255]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn temp_db() -> (tempfile::TempDir, DexDb) {
    let dir = tempfile::tempdir().unwrap();
    let db = DexDb::open_at(dir.path().join("dex.db")).unwrap();
    (dir, db)
}

/// Catalog and subset of `n` imageless entries named "Entry 0".."Entry n-1"
pub fn padded_data(n: usize) -> (Catalog, DisplaySubset) {
    let names: Vec<String> = (0..n).map(|i| format!("Entry {}", i)).collect();
    let entries = names
        .iter()
        .enumerate()
        .map(|(i, name)| CatalogEntry {
            id: i as u32 + 1,
            name: name.clone(),
            types: vec![TypeName::Normal],
            image: None,
            thumbnail: None,
            metadata: EntryMetadata::default(),
        })
        .collect();

    (
        Catalog::from_entries(entries).unwrap(),
        DisplaySubset::new(names).unwrap(),
    )
}

/// Default-geometry renderer over `padded_data(n)` with its resolver
pub fn padded_renderer(n: usize) -> (Arc<GridRenderer>, Arc<FuzzyResolver>) {
    let (catalog, subset) = padded_data(n);
    let resolver = Arc::new(FuzzyResolver::new(&subset));
    let config = GridConfig::default();
    let assets = AssetCache::new(Arc::new(MemoryAssetSource::new()), config.cell_size);
    let renderer = GridRenderer::new(
        Arc::new(catalog),
        Arc::new(subset),
        Arc::new(assets),
        config,
    );
    (Arc::new(renderer), resolver)
}

#[derive(Debug, Clone)]
pub enum SinkCall {
    Send(Response),
    Update(Response),
}

/// Sink that records every call and tracks the merged current response
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
    current: Mutex<Option<Response>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_response(&self) -> Option<Response> {
        self.current.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseSink for RecordingSink {
    async fn send(&self, response: Response) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(SinkCall::Send(response.clone()));
        *self.current.lock().unwrap() = Some(response);
        Ok(())
    }

    async fn update(&self, response: Response) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Update(response.clone()));
        self.current
            .lock()
            .unwrap()
            .get_or_insert_with(Response::default)
            .apply_update(response);
        Ok(())
    }
}
