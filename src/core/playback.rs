//! Scroll-synchronized playback controller.
//!
//! **Architecture**: the controller owns the media element and the idle timer.
//! The host feeds it three kinds of input, one at a time:
//! - scroll progress changes (`on_progress`)
//! - media notifications (`on_media_event`)
//! - clock ticks for the idle timer (`tick`)
//!
//! # States
//!
//! - **AwaitingMedia**: nothing touches the media until it reports it is playable
//!   and has a positive duration. First readiness seeks to the position implied by
//!   the current scroll progress and enters Scrubbing.
//! - **Scrubbing**: each progress change maps to a timestamp; the media is seeked
//!   only when it is more than `seek_tolerance` away. Never plays.
//! - **Looping**: entered when scrolling has been idle for `idle_delay`. Seeks to
//!   the loop start and plays; a time-update listener wraps playback back to the
//!   loop start whenever the position reaches the loop end.
//!
//! Any progress change while Looping pauses, drops the time-update listener and
//! returns to Scrubbing before the new position is applied.

use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};

use super::debounce::DebounceTimer;
use super::event_bus::SceneEmitter;
use super::events::{MediaReadyEvent, MediaSeekEvent, PlaybackModeChangedEvent};
use super::mapping::{MediaTimestamp, TimeMapper};
use super::media::{MediaElement, MediaEvent};
use super::scroll::ScrollProgress;

/// Default seek threshold in seconds
pub const DEFAULT_SEEK_TOLERANCE: f64 = 0.05;

/// Default scroll inactivity before looping
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackMode {
    Scrubbing,
    Looping,
}

/// Sub-range of the media timeline played while idle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopWindow {
    pub start: f64,
    pub end: f64,
}

impl LoopWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.end > self.start
    }
}

impl Default for LoopWindow {
    fn default() -> Self {
        Self::new(4.0, 5.0)
    }
}

/// Controller tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    pub loop_window: LoopWindow,
    pub seek_tolerance: f64,
    pub idle_delay: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            loop_window: LoopWindow::default(),
            seek_tolerance: DEFAULT_SEEK_TOLERANCE,
            idle_delay: DEFAULT_IDLE_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct IdleTimeout;

/// Time-update handler, alive only while Looping.
#[derive(Debug)]
struct LoopListener {
    window: LoopWindow,
}

#[derive(Debug)]
enum ControllerState {
    AwaitingMedia,
    Scrubbing,
    Looping(LoopListener),
    /// Torn down; all input ignored
    Detached,
}

/// Drives one media element from scroll progress.
#[derive(Debug)]
pub struct PlaybackController<M: MediaElement> {
    media: M,
    config: PlaybackConfig,
    mapper: TimeMapper,
    state: ControllerState,
    idle: DebounceTimer<IdleTimeout>,
    progress: ScrollProgress,
    emitter: SceneEmitter,
}

impl<M: MediaElement> PlaybackController<M> {
    pub fn new(media: M, config: PlaybackConfig, emitter: SceneEmitter) -> Self {
        debug!(
            "PlaybackController: loop [{}, {}], tolerance {}s, idle {}ms",
            config.loop_window.start,
            config.loop_window.end,
            config.seek_tolerance,
            config.idle_delay.as_millis()
        );
        Self {
            media,
            config,
            mapper: TimeMapper::new(),
            state: ControllerState::AwaitingMedia,
            idle: DebounceTimer::new(),
            progress: ScrollProgress::ZERO,
            emitter,
        }
    }

    // === Accessors ===

    /// None until the media is ready (and after teardown)
    pub fn mode(&self) -> Option<PlaybackMode> {
        match self.state {
            ControllerState::Scrubbing => Some(PlaybackMode::Scrubbing),
            ControllerState::Looping(_) => Some(PlaybackMode::Looping),
            ControllerState::AwaitingMedia | ControllerState::Detached => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.mode().is_some()
    }

    pub fn has_loop_listener(&self) -> bool {
        matches!(self.state, ControllerState::Looping(_))
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn time_mapper(&self) -> &TimeMapper {
        &self.mapper
    }

    pub fn progress(&self) -> ScrollProgress {
        self.progress
    }

    /// When the idle timer will fire, if armed
    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle.deadline()
    }

    // === Input ===

    /// Scroll progress changed.
    pub fn on_progress(&mut self, progress: ScrollProgress, now: Instant) {
        if matches!(self.state, ControllerState::Detached) {
            return;
        }
        self.progress = progress;

        if self.has_loop_listener() {
            self.exit_loop();
        }
        self.idle.reset(self.config.idle_delay, IdleTimeout, now);
        self.scrub();
    }

    pub fn on_media_event(&mut self, event: MediaEvent, now: Instant) {
        match event {
            MediaEvent::LoadedData | MediaEvent::CanPlayThrough => self.try_become_ready(now),
            MediaEvent::TimeUpdate | MediaEvent::Ended => self.on_time_update(),
        }
    }

    /// Advance the idle timer.
    pub fn tick(&mut self, now: Instant) {
        if self.idle.tick(now).is_none() {
            return;
        }
        match self.state {
            ControllerState::Scrubbing => self.enter_loop(),
            ControllerState::AwaitingMedia => trace!("PlaybackController: idle before media ready"),
            ControllerState::Looping(_) | ControllerState::Detached => {}
        }
    }

    /// Release the timer and listener; pause if playing. Further input is ignored.
    pub fn teardown(&mut self) {
        if matches!(self.state, ControllerState::Detached) {
            return;
        }
        self.idle.cancel();
        if self.has_loop_listener() {
            self.media.pause();
        }
        self.state = ControllerState::Detached;
        debug!("PlaybackController: torn down");
    }

    // === Transitions ===

    fn try_become_ready(&mut self, now: Instant) {
        if !matches!(self.state, ControllerState::AwaitingMedia) {
            return;
        }
        let ready_state = self.media.ready_state();
        if !ready_state.is_playable() {
            trace!("PlaybackController: media at {:?}, waiting", ready_state);
            return;
        }
        let Some(duration) = self.media.duration() else {
            trace!("PlaybackController: media has no duration yet");
            return;
        };
        if !self.mapper.set_duration(duration) {
            return;
        }

        info!("Media ready: duration {:.3}s", duration);
        self.state = ControllerState::Scrubbing;
        self.emitter.emit(MediaReadyEvent { duration });
        self.emitter.emit(PlaybackModeChangedEvent {
            mode: PlaybackMode::Scrubbing,
        });

        // Match the picture to the current scroll position before any interaction
        if let Some(target) = self.mapper.time(self.progress) {
            self.seek(target);
        }
        self.idle.reset(self.config.idle_delay, IdleTimeout, now);
    }

    fn scrub(&mut self) {
        if !matches!(self.state, ControllerState::Scrubbing) {
            return;
        }
        let Some(target) = self.mapper.time(self.progress) else {
            return;
        };
        let current = self.media.current_time();
        if (current - target.seconds()).abs() > self.config.seek_tolerance {
            self.seek(target);
        }
    }

    fn enter_loop(&mut self) {
        let window = self.config.loop_window;
        debug!("PlaybackController: idle, looping [{}, {}]", window.start, window.end);

        self.seek(MediaTimestamp::clamped(window.start, self.mapper.duration()));
        self.start_playback();
        self.state = ControllerState::Looping(LoopListener { window });
        self.emitter.emit(PlaybackModeChangedEvent {
            mode: PlaybackMode::Looping,
        });
    }

    fn exit_loop(&mut self) {
        // Dropping the Looping state drops its listener
        self.state = ControllerState::Scrubbing;
        self.media.pause();
        debug!("PlaybackController: scroll resumed, scrubbing");
        self.emitter.emit(PlaybackModeChangedEvent {
            mode: PlaybackMode::Scrubbing,
        });
    }

    fn on_time_update(&mut self) {
        let ControllerState::Looping(listener) = &self.state else {
            return;
        };
        let window = listener.window;
        // Media shorter than the window ends (and pauses) before loop_end
        let wrap_at = window.end.min(self.mapper.duration());
        if self.media.current_time() >= wrap_at {
            trace!("PlaybackController: loop wrap at {:.3}s", self.media.current_time());
            self.seek(MediaTimestamp::clamped(window.start, self.mapper.duration()));
            self.start_playback();
        }
    }

    fn seek(&mut self, target: MediaTimestamp) {
        let from = self.media.current_time();
        self.media.seek(target.seconds());
        self.emitter.emit(MediaSeekEvent { from, to: target });
    }

    fn start_playback(&mut self) {
        if let Err(e) = self.media.play() {
            // Next loop wrap calls play() again
            warn!("Playback error: {}", e);
        }
    }
}

impl<M: MediaElement> Drop for PlaybackController<M> {
    fn drop(&mut self) {
        self.teardown();
    }
}
