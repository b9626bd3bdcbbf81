//! Scroll-synced media: tracker -> playback controller.

use std::time::Instant;

use log::debug;
use uuid::Uuid;

use crate::core::event_bus::SceneEmitter;
use crate::core::media::{MediaElement, MediaEvent};
use crate::core::playback::{PlaybackConfig, PlaybackController, PlaybackMode};
use crate::core::scroll::{RegionRect, ScrollOffset, ScrollProgress, ScrollTracker, Viewport};
use crate::core::sequence_media::SequenceMedia;

#[derive(Debug)]
pub struct ScrollVideoScene<M: MediaElement = SequenceMedia> {
    tracker: ScrollTracker,
    controller: PlaybackController<M>,
}

impl<M: MediaElement> ScrollVideoScene<M> {
    pub fn new(media: M, config: PlaybackConfig, offset: ScrollOffset, emitter: SceneEmitter) -> Self {
        Self {
            tracker: ScrollTracker::new(offset, emitter.clone()),
            controller: PlaybackController::new(media, config, emitter),
        }
    }

    pub fn tracker_id(&self) -> Uuid {
        self.tracker.id()
    }

    pub fn tracker(&self) -> &ScrollTracker {
        &self.tracker
    }

    pub fn controller(&self) -> &PlaybackController<M> {
        &self.controller
    }

    pub fn mode(&self) -> Option<PlaybackMode> {
        self.controller.mode()
    }

    pub fn media(&self) -> &M {
        self.controller.media()
    }

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

    pub fn apply_progress(&mut self, progress: ScrollProgress, now: Instant) {
        self.controller.on_progress(progress, now);
    }

    pub fn on_media_event(&mut self, event: MediaEvent, now: Instant) {
        self.controller.on_media_event(event, now);
    }

    pub fn tick(&mut self, now: Instant) {
        self.controller.tick(now);
    }

    /// Earliest instant the scene needs a tick
    pub fn next_deadline(&self) -> Option<Instant> {
        self.controller.idle_deadline()
    }

    pub fn unmount(&mut self) {
        debug!("ScrollVideoScene {}: unmount", self.tracker.id());
        self.tracker.unmount();
        self.controller.teardown();
    }
}

impl ScrollVideoScene<SequenceMedia> {
    /// Drive the sequence-backed media: readiness, idle timer, playback clock.
    pub fn pump(&mut self, now: Instant) {
        let ready = self.controller.media_mut().poll_readiness();
        for event in ready {
            self.controller.on_media_event(event, now);
        }

        self.controller.tick(now);

        let played = self.controller.media_mut().advance(now);
        for event in played {
            self.controller.on_media_event(event, now);
        }
    }

    /// Stop background decoding along with playback.
    pub fn unload(&mut self) {
        self.unmount();
        self.controller.media().cache().cancel_pending();
    }
}
