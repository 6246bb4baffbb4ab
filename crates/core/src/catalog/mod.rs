//! # Catalog Store
//!
//! Immutable reference data loaded once at startup: the full catalog of
//! entries and the ordered display subset that fixes paging order.
//!
//! The catalog file follows the public `pokemon-data.json` layout:
//!
//! ```text
//! [{ "id": 1, "name": { "english": "Bulbasaur" }, "type": ["Grass", "Poison"],
//!    "image": { "sprite": "...", "thumbnail": "...", "hires": "..." }, ... }]
//! ```

pub mod types;

pub use types::{chart_multiplier, Effectiveness, EffectivenessClass, TypeName};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Auxiliary metadata carried alongside an entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EntryMetadata {
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Base stats keyed by stat name
    #[serde(default)]
    pub base: BTreeMap<String, u32>,
    #[serde(default)]
    pub profile: Option<serde_json::Value>,
}

/// One catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub id: u32,
    /// Canonical name, unique across the catalog
    pub name: String,
    /// One or two category tags, in order
    pub types: Vec<TypeName>,
    /// Image reference drawn in the grid
    pub image: Option<String>,
    /// High resolution image reference used as info-card thumbnail
    pub thumbnail: Option<String>,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Deserialize)]
struct RawName {
    english: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawImages {
    sprite: Option<String>,
    thumbnail: Option<String>,
    hires: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: u32,
    name: RawName,
    #[serde(rename = "type")]
    types: Vec<String>,
    #[serde(default)]
    image: RawImages,
    #[serde(default)]
    species: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    base: BTreeMap<String, u32>,
    #[serde(default)]
    profile: Option<serde_json::Value>,
}

impl RawEntry {
    fn into_entry(self) -> Result<CatalogEntry> {
        let name = self.name.english;
        if self.types.is_empty() || self.types.len() > 2 {
            anyhow::bail!("{} has {} types, expected 1 or 2", name, self.types.len());
        }

        let types = self
            .types
            .iter()
            .map(|t| TypeName::parse(t).with_context(|| format!("{} has unknown type '{}'", name, t)))
            .collect::<Result<Vec<_>>>()?;

        let image = self
            .image
            .sprite
            .clone()
            .or_else(|| self.image.thumbnail.clone())
            .or_else(|| self.image.hires.clone());

        Ok(CatalogEntry {
            id: self.id,
            name,
            types,
            image,
            thumbnail: self.image.hires,
            metadata: EntryMetadata {
                species: self.species,
                description: self.description,
                base: self.base,
                profile: self.profile,
            },
        })
    }
}

/// The full catalog, keyed by canonical name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Load the catalog from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog: {:?}", path))?;
        let catalog = Self::from_json(&json)
            .with_context(|| format!("Failed to parse catalog: {:?}", path))?;

        tracing::info!(entries = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Parse a catalog from JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawEntry> = serde_json::from_str(json).context("Invalid catalog JSON")?;
        let entries = raw
            .into_iter()
            .map(RawEntry::into_entry)
            .collect::<Result<Vec<_>>>()?;
        Self::from_entries(entries)
    }

    /// Build a catalog from already-parsed entries
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if by_name.insert(entry.name.clone(), idx).is_some() {
                anyhow::bail!("Duplicate catalog entry: {}", entry.name);
            }
        }
        Ok(Self { entries, by_name })
    }

    /// Look up an entry by canonical name
    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name.get(name).map(|idx| &self.entries[*idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered list of names that fixes paging order for one edition
#[derive(Debug, Clone, Default)]
pub struct DisplaySubset {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl DisplaySubset {
    /// Load the subset from a JSON array of names
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read display subset: {:?}", path))?;
        let names: Vec<String> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse display subset: {:?}", path))?;
        let subset = Self::new(names)?;

        tracing::info!(names = subset.len(), "Display subset loaded");
        Ok(subset)
    }

    /// Build a subset, rejecting duplicate names
    pub fn new(names: Vec<String>) -> Result<Self> {
        let mut positions = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if positions.insert(name.clone(), idx).is_some() {
                anyhow::bail!("Duplicate display subset entry: {}", name);
            }
        }
        Ok(Self { names, positions })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Zero-based display index of a canonical name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of pages at the given capacity; never less than one
    pub fn total_pages(&self, capacity: usize) -> u32 {
        let capacity = capacity.max(1);
        (self.names.len().div_ceil(capacity)).max(1) as u32
    }

    /// Names on a 1-based page, with the display index of the first one
    pub fn page_window(&self, page: u32, capacity: usize) -> (usize, &[String]) {
        let capacity = capacity.max(1);
        let start = (page.max(1) as usize - 1) * capacity;
        if start >= self.names.len() {
            return (start, &[]);
        }
        let end = (start + capacity).min(self.names.len());
        (start, &self.names[start..end])
    }
}
