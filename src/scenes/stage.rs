//! Stage: one page with a scrubbed frame sequence and a scroll-synced video.
//!
//! **Flow** (single-threaded, time passed in by the host):
//! 1. Page input (`scroll_to`, `resize`, `set_layout`) goes to the trackers
//! 2. Trackers publish `ScrollProgressEvent`s tagged with their id
//! 3. `dispatch()` drains the bus and routes each progress event to the scene
//!    owning that tracker; scene reactions are drained in the same pass
//! 4. `pump(now)` drives time: media readiness, idle timer, playback clock
//!
//! Every drained event is kept until the host collects it with `take_events()`.

use std::time::Instant;

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use crate::core::event_bus::{BoxedEvent, EventBus, downcast_event};
use crate::core::events::ScrollProgressEvent;
use crate::core::frame_cache::CacheCounts;
use crate::core::scroll::{RegionRect, Viewport};
use crate::core::workers::Workers;

use super::frame_sequence::FrameSequenceScene;
use super::scroll_video::ScrollVideoScene;

/// Reaction chains longer than this are cut off
const MAX_DISPATCH_ROUNDS: usize = 8;

/// Page geometry: where the two tracked regions sit and how tall the window is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub frames_region: RegionRect,
    pub video_region: RegionRect,
    pub viewport_height: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            frames_region: RegionRect { top: 1000.0, height: 2000.0 },
            video_region: RegionRect { top: 4000.0, height: 3000.0 },
            viewport_height: 1000.0,
        }
    }
}

impl PageLayout {
    /// Total scrollable height (bottom of the lowest region plus a trailing screen)
    pub fn page_height(&self) -> f64 {
        let frames_end = self.frames_region.top + self.frames_region.height;
        let video_end = self.video_region.top + self.video_region.height;
        frames_end.max(video_end) + self.viewport_height
    }

    pub fn max_scroll(&self) -> f64 {
        (self.page_height() - self.viewport_height).max(0.0)
    }
}

pub struct Stage {
    bus: EventBus,
    layout: PageLayout,
    scroll_y: f64,
    frames: Option<FrameSequenceScene>,
    video: Option<ScrollVideoScene>,
    /// Decode pools, one per cache
    loaders: Vec<Workers>,
    drained: Vec<BoxedEvent>,
    mounted: bool,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("layout", &self.layout)
            .field("scroll_y", &self.scroll_y)
            .field("mounted", &self.mounted)
            .field("pending_events", &self.drained.len())
            .finish()
    }
}

impl Stage {
    pub fn new(bus: EventBus, layout: PageLayout) -> Self {
        Self {
            bus,
            layout,
            scroll_y: 0.0,
            frames: None,
            video: None,
            loaders: Vec::new(),
            drained: Vec::new(),
            mounted: false,
        }
    }

    pub fn with_frames(mut self, scene: FrameSequenceScene) -> Self {
        self.frames = Some(scene);
        self
    }

    pub fn with_video(mut self, scene: ScrollVideoScene) -> Self {
        self.video = Some(scene);
        self
    }

    // === Accessors ===

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            scroll_y: self.scroll_y,
            height: self.layout.viewport_height,
        }
    }

    pub fn frames(&self) -> Option<&FrameSequenceScene> {
        self.frames.as_ref()
    }

    pub fn video(&self) -> Option<&ScrollVideoScene> {
        self.video.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Earliest instant a `pump()` has work scheduled (idle timer).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.video.as_ref().and_then(|v| v.next_deadline())
    }

    // === Lifecycle ===

    /// Start background decoding of every frame of both scenes. Returns frames queued.
    pub fn preload(&mut self, threads: usize) -> usize {
        let mut queued = 0;
        let caches = self
            .frames
            .iter()
            .map(|f| f.cache().clone())
            .chain(self.video.iter().map(|v| v.media().cache().clone()));
        for cache in caches {
            let workers = Workers::new(threads, cache.epoch_ref());
            queued += cache.preload(&workers);
            self.loaders.push(workers);
        }
        info!("Stage: preloading {} frames", queued);
        queued
    }

    /// Block until both caches settle or `timeout` passes (headless use).
    pub fn wait_decoded(&self, timeout: std::time::Duration) -> Vec<CacheCounts> {
        let deadline = Instant::now() + timeout;
        self.frames
            .iter()
            .map(|f| f.cache().clone())
            .chain(self.video.iter().map(|v| v.media().cache().clone()))
            .map(|cache| cache.wait_settled(deadline.saturating_duration_since(Instant::now())))
            .collect()
    }

    /// Attach both regions and deliver the initial viewport.
    pub fn mount(&mut self, now: Instant) {
        let viewport = self.viewport();
        if let Some(frames) = self.frames.as_mut() {
            frames.mount(self.layout.frames_region);
            frames.on_scroll(viewport);
        }
        if let Some(video) = self.video.as_mut() {
            video.mount(self.layout.video_region);
            video.on_scroll(viewport);
        }
        self.mounted = true;
        debug!("Stage mounted: page height {}", self.layout.page_height());
        self.dispatch(now);
    }

    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        if let Some(frames) = self.frames.as_mut() {
            frames.unmount();
        }
        if let Some(video) = self.video.as_mut() {
            video.unload();
        }
        self.mounted = false;
        debug!("Stage unmounted");
    }

    // === Page input ===

    pub fn scroll_to(&mut self, y: f64, now: Instant) {
        if !self.mounted {
            warn!("Stage: scroll before mount ignored");
            return;
        }
        let y = y.clamp(0.0, self.layout.max_scroll());
        if y == self.scroll_y {
            return;
        }
        trace!("Stage: scroll {} -> {}", self.scroll_y, y);
        self.scroll_y = y;

        let viewport = self.viewport();
        if let Some(frames) = self.frames.as_mut() {
            frames.on_scroll(viewport);
        }
        if let Some(video) = self.video.as_mut() {
            video.on_scroll(viewport);
        }
        self.dispatch(now);
    }

    pub fn resize(&mut self, viewport_height: f64, now: Instant) {
        if !self.mounted || viewport_height <= 0.0 {
            return;
        }
        debug!("Stage: viewport height {} -> {}", self.layout.viewport_height, viewport_height);
        self.layout.viewport_height = viewport_height;
        self.scroll_y = self.scroll_y.clamp(0.0, self.layout.max_scroll());

        let viewport = self.viewport();
        if let Some(frames) = self.frames.as_mut() {
            frames.on_resize(viewport);
        }
        if let Some(video) = self.video.as_mut() {
            video.on_resize(viewport);
        }
        self.dispatch(now);
    }

    /// Region geometry changed (reflow). Progress is recomputed for moved regions.
    pub fn set_layout(&mut self, layout: PageLayout, now: Instant) {
        let resized = layout.viewport_height != self.layout.viewport_height;
        self.layout = layout;
        if !self.mounted {
            return;
        }
        if let Some(frames) = self.frames.as_mut() {
            frames.set_region(layout.frames_region);
        }
        if let Some(video) = self.video.as_mut() {
            video.set_region(layout.video_region);
        }
        if resized {
            self.resize(layout.viewport_height, now);
        } else {
            self.dispatch(now);
        }
    }

    /// Advance time-driven work.
    pub fn pump(&mut self, now: Instant) {
        if !self.mounted {
            return;
        }
        if let Some(video) = self.video.as_mut() {
            video.pump(now);
        }
        self.dispatch(now);
    }

    /// Events drained since the last call, in emission order.
    pub fn take_events(&mut self) -> Vec<BoxedEvent> {
        std::mem::take(&mut self.drained)
    }

    fn dispatch(&mut self, now: Instant) {
        for _ in 0..MAX_DISPATCH_ROUNDS {
            let events = self.bus.poll();
            if events.is_empty() {
                return;
            }
            for event in &events {
                if let Some(e) = downcast_event::<ScrollProgressEvent>(event) {
                    self.route_progress(e, now);
                }
            }
            self.drained.extend(events);
        }
        warn!("Stage: event dispatch did not settle after {} rounds", MAX_DISPATCH_ROUNDS);
    }

    fn route_progress(&mut self, event: &ScrollProgressEvent, now: Instant) {
        if let Some(frames) = self.frames.as_mut()
            && frames.tracker_id() == event.tracker
        {
            frames.apply_progress(event.progress);
            return;
        }
        if let Some(video) = self.video.as_mut()
            && video.tracker_id() == event.tracker
        {
            video.apply_progress(event.progress, now);
            return;
        }
        trace!("Stage: progress from unknown tracker {}", event.tracker);
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        self.unmount();
    }
}
