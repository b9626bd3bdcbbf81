//! Media element abstraction driven by the playback controller.
//!
//! Models the parts of a video element the controller touches: position,
//! seek, play/pause, duration and readiness. Implementations report progress
//! back through [`MediaEvent`]s that the host routes to the controller.

use std::fmt;

/// How much of the media is available, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    /// Frame at the current position is decoded
    HaveCurrentData,
    HaveFutureData,
    /// Enough buffered to play through without stalling
    HaveEnoughData,
}

impl ReadyState {
    /// Decoded data and sufficient buffering.
    pub fn is_playable(self) -> bool {
        self >= ReadyState::HaveEnoughData
    }
}

/// Notifications a media element raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    /// First frame decoded
    LoadedData,
    /// Fully buffered
    CanPlayThrough,
    /// Position advanced during playback
    TimeUpdate,
    /// Playback reached the end of the media
    Ended,
}

/// A playback start request was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackError {
    /// Host policy refused playback (e.g. autoplay blocked)
    NotAllowed(String),
    /// Media cannot play yet
    NotReady,
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::NotAllowed(reason) => write!(f, "Playback not allowed: {}", reason),
            PlaybackError::NotReady => write!(f, "Media not ready for playback"),
        }
    }
}

impl std::error::Error for PlaybackError {}

/// Seekable, playable media.
pub trait MediaElement {
    /// Current position in seconds
    fn current_time(&self) -> f64;

    /// Total length in seconds, None until metadata is known
    fn duration(&self) -> Option<f64>;

    fn ready_state(&self) -> ReadyState;

    fn is_paused(&self) -> bool;

    fn seek(&mut self, seconds: f64);

    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording media double shared by controller and scene tests.

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum MediaCall {
        Seek(f64),
        Play,
        Pause,
    }

    #[derive(Debug)]
    pub struct FakeMedia {
        pub time: f64,
        pub duration: Option<f64>,
        pub ready: ReadyState,
        pub paused: bool,
        pub reject_play: bool,
        pub calls: Vec<MediaCall>,
    }

    impl FakeMedia {
        pub fn new(duration: f64) -> Self {
            Self {
                time: 0.0,
                duration: Some(duration),
                ready: ReadyState::HaveNothing,
                paused: true,
                reject_play: false,
                calls: Vec::new(),
            }
        }

        pub fn seeks(&self) -> Vec<f64> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    MediaCall::Seek(t) => Some(*t),
                    _ => None,
                })
                .collect()
        }

        pub fn count(&self, call: &MediaCall) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }
    }

    impl MediaElement for FakeMedia {
        fn current_time(&self) -> f64 {
            self.time
        }

        fn duration(&self) -> Option<f64> {
            self.duration
        }

        fn ready_state(&self) -> ReadyState {
            self.ready
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn seek(&mut self, seconds: f64) {
            self.time = seconds;
            self.calls.push(MediaCall::Seek(seconds));
        }

        fn play(&mut self) -> Result<(), PlaybackError> {
            self.calls.push(MediaCall::Play);
            if self.reject_play {
                return Err(PlaybackError::NotAllowed("autoplay blocked".into()));
            }
            self.paused = false;
            Ok(())
        }

        fn pause(&mut self) {
            self.paused = true;
            self.calls.push(MediaCall::Pause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_state_order() {
        assert!(ReadyState::HaveEnoughData.is_playable());
        assert!(!ReadyState::HaveFutureData.is_playable());
        assert!(ReadyState::HaveCurrentData > ReadyState::HaveMetadata);
    }

    #[test]
    fn test_playback_error_display() {
        let err = PlaybackError::NotAllowed("autoplay blocked".into());
        assert_eq!(err.to_string(), "Playback not allowed: autoplay blocked");
    }
}
