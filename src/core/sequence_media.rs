//! Image-sequence media: a [`MediaElement`] that plays a frame cache at a fixed rate.
//!
//! Frame `i` covers `[(i-1)/fps, i/fps)`; duration is `N / fps`.
//! Readiness follows the cache:
//! - first frame decoded -> `HaveCurrentData` (LoadedData)
//! - every slot settled with at least one frame -> `HaveEnoughData` (CanPlayThrough)
//!
//! The clock only moves in [`SequenceMedia::advance`], with time supplied by the host.

use std::time::Instant;

use log::{debug, trace};

use super::frame::{FrameAsset, FrameStatus};
use super::frame_cache::FrameCache;
use super::mapping::FrameIndex;
use super::media::{MediaElement, MediaEvent, PlaybackError, ReadyState};

#[derive(Debug, Clone)]
pub struct SequenceMedia {
    cache: FrameCache,
    fps: f64,
    time: f64,
    paused: bool,
    last_advance: Option<Instant>,
    loaded_signalled: bool,
    can_play_signalled: bool,
}

impl SequenceMedia {
    /// `fps` must be positive; non-positive rates fall back to 24.
    pub fn new(cache: FrameCache, fps: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 24.0 };
        debug!(
            "SequenceMedia: {} frames @ {}fps ({:.3}s)",
            cache.frame_count(),
            fps,
            f64::from(cache.frame_count()) / fps
        );
        Self {
            cache,
            fps,
            time: 0.0,
            paused: true,
            last_advance: None,
            loaded_signalled: false,
            can_play_signalled: false,
        }
    }

    pub fn cache(&self) -> &FrameCache {
        &self.cache
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    fn total_duration(&self) -> f64 {
        f64::from(self.cache.frame_count()) / self.fps
    }

    /// Frame shown at the current position.
    pub fn current_frame(&self) -> FrameIndex {
        let n = self.cache.frame_count().max(1);
        let raw = (self.time * self.fps).floor() as u32 + 1;
        FrameIndex::new(raw.min(n)).unwrap_or(FrameIndex::FIRST)
    }

    /// Decoded picture at the current position, if available.
    pub fn current_asset(&self) -> Option<FrameAsset> {
        self.cache.get(self.current_frame())
    }

    /// Readiness notifications not yet delivered. Each fires at most once.
    pub fn poll_readiness(&mut self) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        let state = self.ready_state();
        if !self.loaded_signalled && state >= ReadyState::HaveCurrentData {
            self.loaded_signalled = true;
            events.push(MediaEvent::LoadedData);
        }
        if !self.can_play_signalled && state >= ReadyState::HaveEnoughData {
            self.can_play_signalled = true;
            events.push(MediaEvent::CanPlayThrough);
        }
        if !events.is_empty() {
            debug!("SequenceMedia: {:?}", events);
        }
        events
    }

    /// Move the playhead by wall time since the previous call while playing.
    pub fn advance(&mut self, now: Instant) -> Vec<MediaEvent> {
        if self.paused {
            self.last_advance = None;
            return Vec::new();
        }
        let Some(prev) = self.last_advance.replace(now) else {
            return Vec::new();
        };
        let dt = now.saturating_duration_since(prev).as_secs_f64();
        if dt <= 0.0 {
            return Vec::new();
        }

        let duration = self.total_duration();
        self.time += dt;
        if self.time >= duration {
            self.time = duration;
            self.paused = true;
            self.last_advance = None;
            trace!("SequenceMedia: ended at {:.3}s", duration);
            return vec![MediaEvent::TimeUpdate, MediaEvent::Ended];
        }
        vec![MediaEvent::TimeUpdate]
    }
}

impl MediaElement for SequenceMedia {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn duration(&self) -> Option<f64> {
        Some(self.total_duration())
    }

    fn ready_state(&self) -> ReadyState {
        let counts = self.cache.counts();
        if counts.is_settled() && counts.ready > 0 {
            ReadyState::HaveEnoughData
        } else if self.cache.status(FrameIndex::FIRST) == Some(FrameStatus::Ready) {
            ReadyState::HaveCurrentData
        } else {
            ReadyState::HaveMetadata
        }
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn seek(&mut self, seconds: f64) {
        let target = if seconds.is_nan() { 0.0 } else { seconds.clamp(0.0, self.total_duration()) };
        trace!("SequenceMedia: seek {:.3}s -> {:.3}s", self.time, target);
        self.time = target;
    }

    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.ready_state() < ReadyState::HaveCurrentData {
            return Err(PlaybackError::NotReady);
        }
        if self.paused {
            self.paused = false;
            // Clock restarts from the next advance
            self.last_advance = None;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
        self.last_advance = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FramePattern;
    use image::RgbaImage;
    use std::num::NonZeroU32;
    use std::time::Duration;

    fn media(n: u32, fps: f64) -> SequenceMedia {
        let cache = FrameCache::new(FramePattern::new("/nowhere/{}.png"), NonZeroU32::new(n).unwrap());
        SequenceMedia::new(cache, fps)
    }

    fn fill(media: &SequenceMedia, frames: impl IntoIterator<Item = u32>) {
        for i in frames {
            media.cache().insert(FrameIndex::new(i).unwrap(), RgbaImage::new(1, 1));
        }
    }

    #[test]
    fn test_duration_from_frame_count() {
        let m = media(48, 24.0);
        assert_eq!(m.duration(), Some(2.0));
        assert_eq!(media(10, -1.0).fps(), 24.0);
    }

    #[test]
    fn test_readiness_events_fire_once() {
        let mut m = media(3, 10.0);
        assert_eq!(m.ready_state(), ReadyState::HaveMetadata);
        assert!(m.poll_readiness().is_empty());

        fill(&m, [1]);
        assert_eq!(m.poll_readiness(), vec![MediaEvent::LoadedData]);

        fill(&m, [2, 3]);
        assert_eq!(m.poll_readiness(), vec![MediaEvent::CanPlayThrough]);
        assert!(m.poll_readiness().is_empty());
        assert!(m.ready_state().is_playable());
    }

    #[test]
    fn test_play_refused_before_first_frame() {
        let mut m = media(3, 10.0);
        assert_eq!(m.play(), Err(PlaybackError::NotReady));
        assert!(m.is_paused());
    }

    #[test]
    fn test_advance_moves_clock_while_playing() {
        let mut m = media(100, 10.0);
        fill(&m, 1..=100);
        let t0 = Instant::now();

        assert!(m.advance(t0).is_empty());
        m.play().unwrap();
        assert!(m.advance(t0).is_empty());
        assert_eq!(m.advance(t0 + Duration::from_millis(500)), vec![MediaEvent::TimeUpdate]);
        assert!((m.current_time() - 0.5).abs() < 1e-9);
        assert_eq!(m.current_frame().get(), 6);

        m.pause();
        assert!(m.advance(t0 + Duration::from_secs(3)).is_empty());
        assert!((m.current_time() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_advance_clamps_and_ends() {
        let mut m = media(10, 10.0);
        fill(&m, 1..=10);
        let t0 = Instant::now();
        m.seek(0.9);
        m.play().unwrap();
        m.advance(t0);

        let events = m.advance(t0 + Duration::from_millis(400));
        assert_eq!(events, vec![MediaEvent::TimeUpdate, MediaEvent::Ended]);
        assert_eq!(m.current_time(), 1.0);
        assert!(m.is_paused());
        assert_eq!(m.current_frame().get(), 10);
    }

    #[test]
    fn test_seek_clamps() {
        let mut m = media(20, 10.0);
        m.seek(-3.0);
        assert_eq!(m.current_time(), 0.0);
        m.seek(99.0);
        assert_eq!(m.current_time(), 2.0);
        m.seek(f64::NAN);
        assert_eq!(m.current_time(), 0.0);
    }

    #[test]
    fn test_current_asset_follows_playhead() {
        let mut m = media(4, 2.0);
        fill(&m, [1, 3]);
        m.seek(1.0);
        assert_eq!(m.current_frame().get(), 3);
        assert!(m.current_asset().is_some());
        m.seek(0.5);
        assert!(m.current_asset().is_none());
    }
}
