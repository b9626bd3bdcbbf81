//! Scroll-scrubbed image sequence: tracker -> index mapper -> cache -> canvas.

use std::num::NonZeroU32;

use image::RgbaImage;
use log::debug;
use uuid::Uuid;

use crate::core::event_bus::SceneEmitter;
use crate::core::events::{FrameDrawnEvent, FrameIndexChangedEvent, FrameSkippedEvent};
use crate::core::frame_cache::FrameCache;
use crate::core::mapping::{FrameIndex, FrameIndexMapper};
use crate::core::renderer::{CanvasSurface, FrameRenderer, RenderOutcome};
use crate::core::scroll::{RegionRect, ScrollOffset, ScrollProgress, ScrollTracker, Viewport};

#[derive(Debug)]
pub struct FrameSequenceScene {
    tracker: ScrollTracker,
    mapper: FrameIndexMapper,
    cache: FrameCache,
    renderer: FrameRenderer<CanvasSurface>,
    /// Index selected by the latest progress
    index: FrameIndex,
    emitter: SceneEmitter,
}

impl FrameSequenceScene {
    pub fn new(cache: FrameCache, offset: ScrollOffset, canvas: (u32, u32), emitter: SceneEmitter) -> Self {
        let count = NonZeroU32::new(cache.frame_count()).unwrap_or(NonZeroU32::MIN);
        debug!(
            "FrameSequenceScene: {} frames onto {}x{} canvas",
            count, canvas.0, canvas.1
        );
        Self {
            tracker: ScrollTracker::new(offset, emitter.clone()),
            mapper: FrameIndexMapper::new(count),
            cache,
            renderer: FrameRenderer::new(CanvasSurface::new(canvas.0, canvas.1)),
            index: FrameIndex::FIRST,
            emitter,
        }
    }

    pub fn tracker_id(&self) -> Uuid {
        self.tracker.id()
    }

    pub fn tracker(&self) -> &ScrollTracker {
        &self.tracker
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn current_index(&self) -> FrameIndex {
        self.index
    }

    pub fn last_drawn(&self) -> Option<FrameIndex> {
        self.renderer.last_drawn()
    }

    pub fn draw_count(&self) -> u64 {
        self.renderer.draw_count()
    }

    pub fn canvas(&self) -> &RgbaImage {
        self.renderer.surface().image()
    }

    pub fn canvas_surface(&self) -> &CanvasSurface {
        self.renderer.surface()
    }

    // === Page input (forwarded to the tracker, which emits progress) ===

    pub fn mount(&mut self, region: RegionRect) {
        self.tracker.mount(region);
    }

    pub fn set_region(&mut self, region: RegionRect) {
        self.tracker.set_region(region);
    }

    pub fn on_scroll(&mut self, viewport: Viewport) {
        self.tracker.on_scroll(viewport);
    }

    pub fn on_resize(&mut self, viewport: Viewport) {
        self.tracker.on_resize(viewport);
    }

    // === Progress ===

    /// Select and draw the frame for `progress`.
    pub fn apply_progress(&mut self, progress: ScrollProgress) -> RenderOutcome {
        let index = self.mapper.index(progress);
        if index != self.index {
            self.index = index;
            self.emitter.emit(FrameIndexChangedEvent { index });
        }
        let outcome = self.renderer.render(self.index, &self.cache);
        self.report(outcome);
        outcome
    }

    pub fn unmount(&mut self) {
        self.tracker.unmount();
        self.cache.cancel_pending();
    }

    fn report(&self, outcome: RenderOutcome) {
        match outcome {
            RenderOutcome::Drawn => self.emitter.emit(FrameDrawnEvent { index: self.index }),
            RenderOutcome::NotReady => self.emitter.emit(FrameSkippedEvent { index: self.index }),
            RenderOutcome::Unchanged => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::{EventBus, downcast_event};
    use crate::core::frame::FramePattern;
    use image::Rgba;

    fn scene(n: u32, emitter: SceneEmitter) -> FrameSequenceScene {
        let cache = FrameCache::new(FramePattern::new("/nowhere/{}.png"), NonZeroU32::new(n).unwrap());
        FrameSequenceScene::new(cache, ScrollOffset::CONTAIN, (4, 4), emitter)
    }

    fn fill(scene: &FrameSequenceScene, frames: impl IntoIterator<Item = u32>) {
        for i in frames {
            let img = RgbaImage::from_pixel(4, 4, Rgba([i as u8, 0, 0, 255]));
            scene.cache().insert(FrameIndex::new(i).unwrap(), img);
        }
    }

    #[test]
    fn test_progress_selects_and_draws_frame() {
        let mut s = scene(86, SceneEmitter::dummy());
        fill(&s, 1..=86);

        assert_eq!(s.apply_progress(ScrollProgress::new(0.5)), RenderOutcome::Drawn);
        assert_eq!(s.current_index().get(), 44);
        assert_eq!(s.canvas().get_pixel(0, 0), &Rgba([44, 0, 0, 255]));

        assert_eq!(s.apply_progress(ScrollProgress::new(0.999)), RenderOutcome::Drawn);
        assert_eq!(s.current_index().get(), 86);
    }

    #[test]
    fn test_small_progress_change_same_index_no_redraw() {
        let mut s = scene(86, SceneEmitter::dummy());
        fill(&s, 1..=86);
        s.apply_progress(ScrollProgress::new(0.5));
        assert_eq!(s.apply_progress(ScrollProgress::new(0.501)), RenderOutcome::Unchanged);
        assert_eq!(s.draw_count(), 1);
    }

    #[test]
    fn test_undecoded_frame_drawn_when_progress_redelivered() {
        let mut s = scene(10, SceneEmitter::dummy());
        assert_eq!(s.apply_progress(ScrollProgress::ZERO), RenderOutcome::NotReady);

        // Decoding alone does not draw
        fill(&s, [1]);
        assert_eq!(s.last_drawn(), None);
        assert_eq!(s.draw_count(), 0);

        // Next progress for the same index re-reads the cache
        assert_eq!(s.apply_progress(ScrollProgress::new(0.02)), RenderOutcome::Drawn);
        assert_eq!(s.last_drawn(), Some(FrameIndex::FIRST));
        assert_eq!(s.apply_progress(ScrollProgress::new(0.03)), RenderOutcome::Unchanged);
    }

    #[test]
    fn test_tracker_drives_scene_through_bus() {
        let bus = EventBus::new();
        let mut s = scene(11, SceneEmitter::from_emitter(bus.emitter()));
        fill(&s, 1..=11);

        s.mount(RegionRect { top: 0.0, height: 2000.0 });
        s.on_scroll(Viewport { scroll_y: 500.0, height: 1000.0 });

        let events = bus.poll();
        let progress = events
            .iter()
            .find_map(|e| downcast_event::<crate::core::events::ScrollProgressEvent>(e))
            .map(|e| (e.tracker, e.progress))
            .unwrap();
        assert_eq!(progress.0, s.tracker_id());

        s.apply_progress(progress.1);
        assert_eq!(s.current_index().get(), 6);

        let events = bus.poll();
        assert!(events.iter().any(|e| downcast_event::<FrameIndexChangedEvent>(e).is_some()));
        assert!(events.iter().any(|e| downcast_event::<FrameDrawnEvent>(e).is_some()));
    }
}
