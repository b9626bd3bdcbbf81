//! Frame renderer: draws the selected frame onto a fixed-size surface.
//!
//! Rules:
//! - Draw only when the asset is decoded; otherwise leave the previous frame up
//! - Never draw the same index twice in a row
//! - A skipped index is not remembered as drawn, so re-delivering it after
//!   decode completes draws it

use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use log::trace;

use super::frame::FrameAsset;
use super::frame_cache::FrameCache;
use super::mapping::FrameIndex;

/// Drawing target with fixed pixel dimensions.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    /// Replace all contents with `asset` placed at the origin.
    fn draw(&mut self, asset: &FrameAsset);
}

/// CPU canvas backed by an RGBA image.
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    image: RgbaImage,
}

impl CanvasSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save(path)
            .with_context(|| format!("Failed to write canvas to {}", path.display()))
    }
}

impl Surface for CanvasSurface {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn draw(&mut self, asset: &FrameAsset) {
        for px in self.image.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
        // Clips anything beyond the canvas bounds
        image::imageops::replace(&mut self.image, asset.image(), 0, 0);
    }
}

/// What a render request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Drawn,
    /// Index already on the surface
    Unchanged,
    /// Asset not decoded (or outside the sequence)
    NotReady,
}

/// Renders cache frames onto a surface, skipping redundant draws.
#[derive(Debug)]
pub struct FrameRenderer<S: Surface> {
    surface: S,
    last_drawn: Option<FrameIndex>,
    draw_count: u64,
}

impl<S: Surface> FrameRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            last_drawn: None,
            draw_count: 0,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn last_drawn(&self) -> Option<FrameIndex> {
        self.last_drawn
    }

    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }

    pub fn render(&mut self, index: FrameIndex, cache: &FrameCache) -> RenderOutcome {
        if self.last_drawn == Some(index) {
            return RenderOutcome::Unchanged;
        }
        let Some(asset) = cache.get(index) else {
            trace!("Renderer: frame {} not ready, keeping {:?}", index, self.last_drawn);
            return RenderOutcome::NotReady;
        };
        self.surface.draw(&asset);
        self.last_drawn = Some(index);
        self.draw_count += 1;
        trace!("Renderer: drew frame {}", index);
        RenderOutcome::Drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FramePattern;
    use std::num::NonZeroU32;

    /// Records draws instead of touching pixels
    #[derive(Default)]
    struct RecordingSurface {
        draws: Vec<u32>,
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            (1000, 1000)
        }

        fn draw(&mut self, asset: &FrameAsset) {
            self.draws.push(asset.index().get());
        }
    }

    fn idx(i: u32) -> FrameIndex {
        FrameIndex::new(i).unwrap()
    }

    fn cache(n: u32) -> FrameCache {
        FrameCache::new(FramePattern::new("/nowhere/{}.png"), NonZeroU32::new(n).unwrap())
    }

    #[test]
    fn test_same_index_draws_once() {
        let cache = cache(3);
        cache.insert(idx(2), RgbaImage::new(1, 1));
        let mut renderer = FrameRenderer::new(RecordingSurface::default());

        assert_eq!(renderer.render(idx(2), &cache), RenderOutcome::Drawn);
        assert_eq!(renderer.render(idx(2), &cache), RenderOutcome::Unchanged);
        assert_eq!(renderer.surface().draws, vec![2]);
    }

    #[test]
    fn test_not_ready_skips_then_draws_on_redelivery() {
        let cache = cache(86);
        let mut renderer = FrameRenderer::new(RecordingSurface::default());

        // Progress 0 with frame 1 undecoded: nothing drawn, no panic
        assert_eq!(renderer.render(idx(1), &cache), RenderOutcome::NotReady);
        assert!(renderer.surface().draws.is_empty());
        assert_eq!(renderer.last_drawn(), None);

        cache.insert(idx(1), RgbaImage::new(1, 1));
        assert_eq!(renderer.render(idx(1), &cache), RenderOutcome::Drawn);
        assert_eq!(renderer.surface().draws, vec![1]);
    }

    #[test]
    fn test_missing_frame_keeps_previous() {
        let cache = cache(3);
        cache.insert(idx(1), RgbaImage::new(1, 1));
        let mut renderer = FrameRenderer::new(RecordingSurface::default());

        renderer.render(idx(1), &cache);
        assert_eq!(renderer.render(idx(3), &cache), RenderOutcome::NotReady);
        assert_eq!(renderer.last_drawn(), Some(idx(1)));
        assert_eq!(renderer.draw_count(), 1);
    }

    #[test]
    fn test_out_of_range_never_draws() {
        let cache = cache(3);
        let mut renderer = FrameRenderer::new(RecordingSurface::default());
        assert_eq!(renderer.render(idx(4), &cache), RenderOutcome::NotReady);
        assert!(renderer.surface().draws.is_empty());
    }

    #[test]
    fn test_canvas_replaces_contents_at_origin() {
        let mut canvas = CanvasSurface::new(4, 4);
        let big = FrameAsset::new(idx(1), RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let small = FrameAsset::new(idx(2), RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255])));

        canvas.draw(&big);
        canvas.draw(&small);

        assert_eq!(canvas.image().get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
        assert_eq!(canvas.image().get_pixel(1, 1), &Rgba([0, 255, 0, 255]));
        // Previous frame fully cleared outside the new one
        assert_eq!(canvas.image().get_pixel(3, 3), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_canvas_clips_oversized_frame() {
        let mut canvas = CanvasSurface::new(2, 2);
        let big = FrameAsset::new(idx(1), RgbaImage::from_pixel(5, 5, Rgba([9, 9, 9, 255])));
        canvas.draw(&big);
        assert_eq!(canvas.size(), (2, 2));
        assert_eq!(canvas.image().get_pixel(1, 1), &Rgba([9, 9, 9, 255]));
    }
}
