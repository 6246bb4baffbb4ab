//! # Rendering
//!
//! - `assets` - image fetching and the decoded-image cache
//! - `font` - bitmap glyphs for labels
//! - `grid` - page rendering

pub mod assets;
pub mod font;
pub mod grid;

pub use assets::{AssetCache, AssetError, AssetSource, DefaultAssetSource, MemoryAssetSource};
pub use grid::{label_color, CellSummary, GridConfig, GridRenderer, RenderedPage, GRID_FILE_NAME};
