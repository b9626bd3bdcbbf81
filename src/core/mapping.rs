//! Progress mappers: scroll progress -> frame index / media timestamp.

use std::fmt;
use std::num::NonZeroU32;

use log::debug;
use serde::{Deserialize, Serialize};

use super::scroll::ScrollProgress;

/// 1-based frame number within a sequence of N frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameIndex(NonZeroU32);

impl FrameIndex {
    pub const FIRST: FrameIndex = FrameIndex(NonZeroU32::MIN);

    /// None for 0
    pub fn new(index: u32) -> Option<Self> {
        NonZeroU32::new(index).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// 0-based slot for storage lookups
    pub fn slot(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `index(p) = round(1 + p * (N - 1))`, clamped to [1, N].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameIndexMapper {
    frame_count: NonZeroU32,
}

impl FrameIndexMapper {
    pub fn new(frame_count: NonZeroU32) -> Self {
        Self { frame_count }
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count.get()
    }

    pub fn last(&self) -> FrameIndex {
        FrameIndex(self.frame_count)
    }

    pub fn contains(&self, index: FrameIndex) -> bool {
        index.get() <= self.frame_count.get()
    }

    pub fn index(&self, progress: ScrollProgress) -> FrameIndex {
        let n = self.frame_count.get();
        let raw = (1.0 + progress.value() * f64::from(n - 1)).round();
        let clamped = raw.clamp(1.0, f64::from(n)) as u32;
        FrameIndex::new(clamped).unwrap_or(FrameIndex::FIRST)
    }
}

/// Position on the media timeline, within [0, duration].
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MediaTimestamp(f64);

impl MediaTimestamp {
    pub const ZERO: MediaTimestamp = MediaTimestamp(0.0);

    /// Clamp `seconds` into [0, duration].
    pub fn clamped(seconds: f64, duration: f64) -> Self {
        if seconds.is_nan() {
            return Self::ZERO;
        }
        Self(seconds.clamp(0.0, duration.max(0.0)))
    }

    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl fmt::Display for MediaTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

/// `time(p) = p * duration`.
///
/// Inert (no timestamps) until a positive duration is set. The duration may be
/// set once; later values are ignored.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimeMapper {
    duration: f64,
}

impl TimeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_ready(&self) -> bool {
        self.duration > 0.0
    }

    /// Returns true if the duration was accepted.
    pub fn set_duration(&mut self, duration: f64) -> bool {
        if self.is_ready() {
            if duration != self.duration {
                debug!(
                    "TimeMapper: ignoring duration change {} -> {}",
                    self.duration, duration
                );
            }
            return false;
        }
        if !duration.is_finite() || duration <= 0.0 {
            debug!("TimeMapper: rejecting duration {}", duration);
            return false;
        }
        self.duration = duration;
        true
    }

    pub fn time(&self, progress: ScrollProgress) -> Option<MediaTimestamp> {
        if !self.is_ready() {
            return None;
        }
        Some(MediaTimestamp::clamped(progress.value() * self.duration, self.duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(n: u32) -> FrameIndexMapper {
        FrameIndexMapper::new(NonZeroU32::new(n).unwrap())
    }

    #[test]
    fn test_index_endpoints() {
        let m = mapper(86);
        assert_eq!(m.index(ScrollProgress::ZERO).get(), 1);
        assert_eq!(m.index(ScrollProgress::ONE).get(), 86);
        assert_eq!(m.last().get(), 86);
    }

    #[test]
    fn test_index_near_end_does_not_overflow() {
        let m = mapper(86);
        assert_eq!(m.index(ScrollProgress::new(0.999)).get(), 86);
        assert_eq!(m.index(ScrollProgress::new(1.7)).get(), 86);
        assert_eq!(m.index(ScrollProgress::new(-3.0)).get(), 1);
    }

    #[test]
    fn test_index_rounds_to_nearest() {
        let m = mapper(11);
        // 1 + 0.5 * 10 = 6
        assert_eq!(m.index(ScrollProgress::new(0.5)).get(), 6);
        // 1 + 0.04 * 10 = 1.4 -> 1, 1 + 0.06 * 10 = 1.6 -> 2
        assert_eq!(m.index(ScrollProgress::new(0.04)).get(), 1);
        assert_eq!(m.index(ScrollProgress::new(0.06)).get(), 2);
    }

    #[test]
    fn test_index_in_range_and_monotonic() {
        for n in [1u32, 2, 7, 86, 240] {
            let m = mapper(n);
            let mut prev = 0;
            for step in 0..=1000 {
                let idx = m.index(ScrollProgress::new(step as f64 / 1000.0)).get();
                assert!((1..=n).contains(&idx), "n={} idx={}", n, idx);
                assert!(idx >= prev);
                prev = idx;
            }
        }
    }

    #[test]
    fn test_single_frame_sequence() {
        let m = mapper(1);
        assert_eq!(m.index(ScrollProgress::new(0.7)).get(), 1);
    }

    #[test]
    fn test_time_mapper_inert_until_duration() {
        let mut t = TimeMapper::new();
        assert_eq!(t.time(ScrollProgress::new(0.5)), None);
        assert!(!t.set_duration(0.0));
        assert!(!t.set_duration(f64::NAN));
        assert_eq!(t.time(ScrollProgress::new(0.5)), None);

        assert!(t.set_duration(10.0));
        assert_eq!(t.time(ScrollProgress::new(0.5)).map(|ts| ts.seconds()), Some(5.0));
        assert_eq!(t.time(ScrollProgress::ONE).map(|ts| ts.seconds()), Some(10.0));
    }

    #[test]
    fn test_time_mapper_duration_set_once() {
        let mut t = TimeMapper::new();
        assert!(t.set_duration(8.0));
        assert!(!t.set_duration(0.0));
        assert!(!t.set_duration(12.0));
        assert_eq!(t.duration(), 8.0);
    }

    #[test]
    fn test_time_is_linear() {
        let mut t = TimeMapper::new();
        t.set_duration(6.0);
        for step in 0..=20 {
            let p = step as f64 / 20.0;
            let ts = t.time(ScrollProgress::new(p)).unwrap().seconds();
            assert!((ts - p * 6.0).abs() < 1e-12);
            assert!((0.0..=6.0).contains(&ts));
        }
    }
}
