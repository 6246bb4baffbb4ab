//! # Grid Renderer
//!
//! Draws one page of the display subset as a PNG. Each cell holds the
//! entry's image (faded when uncaught), its 1-based display position in the
//! top-left corner and its name centered along the bottom. Label colors
//! depend on whether the cell is highlighted and whether it is caught.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;

use super::assets::AssetCache;
use super::font;
use crate::catalog::{Catalog, CatalogEntry, DisplaySubset};
use crate::error::{DexError, DexResult};

/// File name used when the page is attached to a response
pub const GRID_FILE_NAME: &str = "dexgrid.png";

/// Grid geometry and styling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
    pub cell_size: u32,
    pub padding: u32,
    /// Extra space under the last row
    pub label_height: u32,
    /// Target label height in pixels
    pub font_size: u32,
    /// Image opacity for uncaught entries
    pub uncaught_opacity: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 5,
            cols: 5,
            cell_size: 96,
            padding: 8,
            label_height: 14,
            font_size: 14,
            uncaught_opacity: 0.5,
        }
    }
}

impl GridConfig {
    /// Cells per page
    pub fn capacity(&self) -> usize {
        (self.rows.max(1) * self.cols.max(1)) as usize
    }

    /// Canvas width and height in pixels
    pub fn canvas_size(&self) -> (u32, u32) {
        let stride = self.cell_size + self.padding;
        (
            self.cols.max(1) * stride + self.padding,
            self.rows.max(1) * stride + self.padding + self.label_height,
        )
    }

    /// Top-left corner of a cell by its index on the page
    fn cell_origin(&self, index: usize) -> (u32, u32) {
        let cols = self.cols.max(1) as usize;
        let stride = self.cell_size + self.padding;
        let col = (index % cols) as u32;
        let row = (index / cols) as u32;
        (self.padding + col * stride, self.padding + row * stride)
    }

    fn font_scale(&self) -> u32 {
        (self.font_size / font::GLYPH_HEIGHT).max(1)
    }
}

/// Label color keyed by (highlighted, caught)
pub fn label_color(highlighted: bool, caught: bool) -> Rgba<u8> {
    match (highlighted, caught) {
        (true, true) => Rgba([0xff, 0xe6, 0x00, 0xff]),
        (true, false) => Rgba([0xbf, 0xa6, 0x00, 0xff]),
        (false, true) => Rgba([0xff, 0xff, 0xff, 0xff]),
        (false, false) => Rgba([0xff, 0x55, 0x55, 0xff]),
    }
}

/// What was drawn in one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSummary {
    /// 1-based position in the display subset
    pub position: usize,
    /// Index of the cell on the page
    pub cell: usize,
    pub name: String,
    pub caught: bool,
    pub highlighted: bool,
    pub image_drawn: bool,
}

/// One rendered page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub png: Arc<[u8]>,
    pub page: u32,
    pub total_pages: u32,
    pub highlight: Option<usize>,
    pub cells: Vec<CellSummary>,
    pub width: u32,
    pub height: u32,
}

impl RenderedPage {
    /// Caption text for the page
    pub fn caption(&self) -> String {
        format!("Page {}/{}", self.page, self.total_pages)
    }
}

/// Renders pages of the display subset
pub struct GridRenderer {
    catalog: Arc<Catalog>,
    subset: Arc<DisplaySubset>,
    assets: Arc<AssetCache>,
    config: GridConfig,
}

impl GridRenderer {
    pub fn new(
        catalog: Arc<Catalog>,
        subset: Arc<DisplaySubset>,
        assets: Arc<AssetCache>,
        config: GridConfig,
    ) -> Self {
        Self {
            catalog,
            subset,
            assets,
            config,
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    pub fn total_pages(&self) -> u32 {
        self.subset.total_pages(self.capacity())
    }

    /// Render a page. Out-of-range pages are clamped; a highlight outside
    /// the page capacity is dropped. Missing catalog entries leave an empty
    /// cell and a failed image leaves a labels-only cell.
    pub async fn render(
        &self,
        page: u32,
        caught: &HashSet<String>,
        highlight: Option<usize>,
    ) -> DexResult<RenderedPage> {
        let capacity = self.capacity();
        let total_pages = self.total_pages();
        let page = page.clamp(1, total_pages);
        let highlight = highlight.filter(|cell| *cell < capacity);

        let (start, window) = self.subset.page_window(page, capacity);
        let (width, height) = self.config.canvas_size();
        let mut canvas = RgbaImage::new(width, height);
        let mut cells = Vec::with_capacity(window.len());

        for (cell, name) in window.iter().enumerate() {
            let Some(entry) = self.catalog.get(name) else {
                tracing::debug!(name = %name, "Display entry missing from catalog, skipping cell");
                continue;
            };

            let is_caught = caught.contains(name);
            let highlighted = highlight == Some(cell);
            let image_drawn = self
                .draw_cell(&mut canvas, cell, start + cell + 1, entry, is_caught, highlighted)
                .await;

            cells.push(CellSummary {
                position: start + cell + 1,
                cell,
                name: name.clone(),
                caught: is_caught,
                highlighted,
                image_drawn,
            });
        }

        let png = encode_png(canvas)?;
        tracing::debug!(page, total_pages, cells = cells.len(), "Grid rendered");

        Ok(RenderedPage {
            png,
            page,
            total_pages,
            highlight,
            cells,
            width,
            height,
        })
    }

    /// Draw one cell; returns whether the image was drawn
    async fn draw_cell(
        &self,
        canvas: &mut RgbaImage,
        cell: usize,
        position: usize,
        entry: &CatalogEntry,
        caught: bool,
        highlighted: bool,
    ) -> bool {
        let (x, y) = self.config.cell_origin(cell);
        let size = self.config.cell_size;

        let image_drawn = match &entry.image {
            Some(reference) => match self.assets.get(reference).await {
                Ok(image) => {
                    let opacity = if caught {
                        1.0
                    } else {
                        self.config.uncaught_opacity.clamp(0.0, 1.0)
                    };
                    blit(canvas, &image, x, y, opacity);
                    true
                }
                Err(e) => {
                    tracing::warn!(name = %entry.name, error = %e, "Image unavailable, drawing labels only");
                    false
                }
            },
            None => false,
        };

        let color = label_color(highlighted, caught);
        let scale = self.config.font_scale();

        let number = position.to_string();
        font::draw_text(canvas, &number, x as i64 + 4, y as i64 + 2, scale, color);

        let name_scale = font::fit_scale(&entry.name, size.saturating_sub(4), scale);
        let name_width = font::text_width(&entry.name, name_scale) as i64;
        let name_x = x as i64 + (size as i64 - name_width) / 2;
        let name_y = y as i64 + size as i64 - 8 - (font::GLYPH_HEIGHT * name_scale) as i64;
        font::draw_text(canvas, &entry.name, name_x, name_y, name_scale, color);

        image_drawn
    }
}

/// Alpha-blend `src` onto `canvas` at (x, y) with an extra opacity factor
fn blit(canvas: &mut RgbaImage, src: &RgbaImage, x: u32, y: u32, opacity: f32) {
    for (dx, dy, pixel) in src.enumerate_pixels() {
        let (out_x, out_y) = (x + dx, y + dy);
        if out_x >= canvas.width() || out_y >= canvas.height() {
            continue;
        }
        let dst = canvas.get_pixel(out_x, out_y).0;
        canvas.put_pixel(out_x, out_y, Rgba(blend(pixel.0, dst, opacity)));
    }
}

/// Normal "source over" blending
fn blend(src: [u8; 4], dst: [u8; 4], opacity: f32) -> [u8; 4] {
    let src_a = (src[3] as f32 / 255.0) * opacity;
    if src_a <= 0.0 {
        return dst;
    }

    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return [0, 0, 0, 0];
    }

    let channel = |s: u8, d: u8| -> u8 {
        let s = s as f32 / 255.0;
        let d = d as f32 / 255.0;
        let out = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
        (out * 255.0).round().clamp(0.0, 255.0) as u8
    };

    [
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_a * 255.0) as u8,
    ]
}

fn encode_png(canvas: RgbaImage) -> DexResult<Arc<[u8]>> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| DexError::Render(e.to_string()))?;
    Ok(Arc::from(buf.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::assets::MemoryAssetSource;
    use crate::testing;

    fn renderer(config: GridConfig) -> GridRenderer {
        let assets = AssetCache::new(Arc::new(testing::sample_assets()), config.cell_size);
        GridRenderer::new(
            Arc::new(testing::sample_catalog()),
            Arc::new(testing::sample_subset()),
            Arc::new(assets),
            config,
        )
    }

    fn decode(page: &RenderedPage) -> RgbaImage {
        image::load_from_memory(&page.png).unwrap().to_rgba8()
    }

    #[test]
    fn test_label_palette() {
        assert_eq!(label_color(true, true), Rgba([0xff, 0xe6, 0x00, 0xff]));
        assert_eq!(label_color(true, false), Rgba([0xbf, 0xa6, 0x00, 0xff]));
        assert_eq!(label_color(false, true), Rgba([0xff, 0xff, 0xff, 0xff]));
        assert_eq!(label_color(false, false), Rgba([0xff, 0x55, 0x55, 0xff]));
    }

    #[test]
    fn test_default_geometry() {
        let config = GridConfig::default();
        assert_eq!(config.capacity(), 25);
        assert_eq!(config.canvas_size(), (528, 542));
        assert_eq!(config.cell_origin(0), (8, 8));
        assert_eq!(config.cell_origin(6), (112, 112));
    }

    #[tokio::test]
    async fn test_render_page_with_caught_and_highlight() {
        let renderer = renderer(GridConfig::default());
        let caught: HashSet<String> = ["Pikachu".to_string()].into_iter().collect();

        let page = renderer.render(1, &caught, Some(0)).await.unwrap();
        assert_eq!((page.page, page.total_pages), (1, 1));
        assert_eq!(page.caption(), "Page 1/1");

        // "Ghostly" has no catalog entry and draws no cell
        assert_eq!(page.cells.len(), testing::SAMPLE_SUBSET.len() - 1);
        assert!(page.cells.iter().all(|c| c.name != "Ghostly"));

        let bulbasaur = &page.cells[0];
        assert_eq!(bulbasaur.position, 1);
        assert!(bulbasaur.highlighted && !bulbasaur.caught && bulbasaur.image_drawn);

        let pikachu = page.cells.iter().find(|c| c.name == "Pikachu").unwrap();
        assert!(pikachu.caught && !pikachu.highlighted);

        let image = decode(&page);
        assert_eq!(image.dimensions(), (page.width, page.height));

        // Caught entries are opaque, uncaught ones are faded
        let (px, py) = GridConfig::default().cell_origin(pikachu.cell);
        assert_eq!(image.get_pixel(px + 48, py + 48)[3], 255);
        assert_eq!(image.get_pixel(56, 56)[3], 127);

        // Top of the highlighted "1" label
        assert_eq!(*image.get_pixel(16, 10), label_color(true, false));
    }

    #[tokio::test]
    async fn test_missing_asset_renders_labels_only() {
        let config = GridConfig::default();
        let assets = AssetCache::new(Arc::new(MemoryAssetSource::new()), config.cell_size);
        let renderer = GridRenderer::new(
            Arc::new(testing::sample_catalog()),
            Arc::new(testing::sample_subset()),
            Arc::new(assets),
            config,
        );

        let page = renderer.render(1, &HashSet::new(), None).await.unwrap();
        assert!(!page.cells.is_empty());
        assert!(page.cells.iter().all(|c| !c.image_drawn));
    }

    #[tokio::test]
    async fn test_paging_and_clamping() {
        let config = GridConfig {
            rows: 2,
            cols: 2,
            cell_size: 32,
            ..GridConfig::default()
        };
        let renderer = renderer(config);
        assert_eq!(renderer.capacity(), 4);
        assert_eq!(renderer.total_pages(), 3);

        let page = renderer.render(2, &HashSet::new(), Some(9)).await.unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.highlight, None);
        assert_eq!(page.cells[0].position, 5);

        let last = renderer.render(99, &HashSet::new(), None).await.unwrap();
        assert_eq!(last.page, 3);

        let first = renderer.render(0, &HashSet::new(), None).await.unwrap();
        assert_eq!(first.page, 1);
    }

    #[test]
    fn test_blend() {
        assert_eq!(blend([255, 0, 0, 255], [0, 0, 0, 0], 1.0), [255, 0, 0, 255]);
        assert_eq!(blend([255, 0, 0, 255], [0, 0, 0, 0], 0.5), [255, 0, 0, 127]);
        assert_eq!(blend([255, 0, 0, 0], [1, 2, 3, 4], 1.0), [1, 2, 3, 4]);
    }
}
