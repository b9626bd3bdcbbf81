//! Engine events published on the [`EventBus`](super::event_bus::EventBus).

use uuid::Uuid;

use super::mapping::{FrameIndex, MediaTimestamp};
use super::playback::PlaybackMode;
use super::scroll::ScrollProgress;

// === Scroll ===

/// A tracker produced a new progress value.
#[derive(Clone, Debug, PartialEq)]
pub struct ScrollProgressEvent {
    pub tracker: Uuid,
    pub progress: ScrollProgress,
}

// === Frame sequence ===

#[derive(Clone, Debug, PartialEq)]
pub struct FrameIndexChangedEvent {
    pub index: FrameIndex,
}

/// Renderer replaced the surface contents.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDrawnEvent {
    pub index: FrameIndex,
}

/// Renderer wanted to draw but the asset is not decoded yet.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSkippedEvent {
    pub index: FrameIndex,
}

// === Media playback ===

#[derive(Clone, Debug, PartialEq)]
pub struct MediaReadyEvent {
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MediaSeekEvent {
    pub from: f64,
    pub to: MediaTimestamp,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackModeChangedEvent {
    pub mode: PlaybackMode,
}
