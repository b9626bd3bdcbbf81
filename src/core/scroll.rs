//! Scroll tracking: viewport position relative to a region -> normalized progress.
//!
//! An offset rule is two anchors. Each anchor pairs an edge of the tracked region
//! with an edge of the viewport; progress is 0 when the first pair lines up and 1
//! when the second pair lines up. `["start start", "end end"]` tracks the region
//! from the moment its top hits the viewport top until its bottom hits the
//! viewport bottom.
//!
//! Anchor pair `{r, v}` lines up at scroll offset
//! `region.top + r * region.height - v * viewport.height`.

use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event_bus::SceneEmitter;
use super::events::ScrollProgressEvent;

/// Normalized scroll progress, always within [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct ScrollProgress(f64);

impl ScrollProgress {
    pub const ZERO: ScrollProgress = ScrollProgress(0.0);
    pub const ONE: ScrollProgress = ScrollProgress(1.0);

    /// Clamp into [0, 1]; NaN collapses to 0.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for ScrollProgress {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<ScrollProgress> for f64 {
    fn from(p: ScrollProgress) -> Self {
        p.0
    }
}

impl fmt::Display for ScrollProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

/// Position along an axis of the region or viewport.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Edge {
    Start,
    Center,
    End,
    /// 0.0 = start, 1.0 = end
    Fraction(f64),
}

impl Edge {
    pub fn fraction(self) -> f64 {
        match self {
            Edge::Start => 0.0,
            Edge::Center => 0.5,
            Edge::End => 1.0,
            Edge::Fraction(f) => f,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Start => write!(f, "start"),
            Edge::Center => write!(f, "center"),
            Edge::End => write!(f, "end"),
            Edge::Fraction(v) => write!(f, "{}", v),
        }
    }
}

impl FromStr for Edge {
    type Err = OffsetParseError;

    /// Accepts `start`, `center`, `end`, a fraction (`0.25`) or a percentage (`25%`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "start" => return Ok(Edge::Start),
            "center" => return Ok(Edge::Center),
            "end" => return Ok(Edge::End),
            _ => {}
        }
        let value = match s.strip_suffix('%') {
            Some(pct) => pct.parse::<f64>().map(|v| v / 100.0),
            None => s.parse::<f64>(),
        }
        .map_err(|_| OffsetParseError::UnknownEdge(s.to_string()))?;

        if !(0.0..=1.0).contains(&value) {
            return Err(OffsetParseError::OutOfRange(s.to_string()));
        }
        Ok(Edge::Fraction(value))
    }
}

/// One `{region edge, viewport edge}` pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub region: Edge,
    pub viewport: Edge,
}

impl Anchor {
    pub const fn new(region: Edge, viewport: Edge) -> Self {
        Self { region, viewport }
    }

    /// Scroll offset at which this anchor pair lines up.
    pub fn scroll_position(&self, region: RegionRect, viewport_height: f64) -> f64 {
        region.top + self.region.fraction() * region.height
            - self.viewport.fraction() * viewport_height
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.region, self.viewport)
    }
}

impl FromStr for Anchor {
    type Err = OffsetParseError;

    /// `"center end"`: region edge first, viewport edge second.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(region), Some(viewport), None) => Ok(Anchor {
                region: region.parse()?,
                viewport: viewport.parse()?,
            }),
            _ => Err(OffsetParseError::Malformed(s.to_string())),
        }
    }
}

/// Offset rule: where progress is 0 (`enter`) and where it is 1 (`exit`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[String; 2]", into = "[String; 2]")]
pub struct ScrollOffset {
    pub enter: Anchor,
    pub exit: Anchor,
}

impl ScrollOffset {
    /// `["start start", "end end"]`
    pub const CONTAIN: ScrollOffset = ScrollOffset {
        enter: Anchor::new(Edge::Start, Edge::Start),
        exit: Anchor::new(Edge::End, Edge::End),
    };

    /// `["center end", "start start"]`
    pub const CENTER_ENTER: ScrollOffset = ScrollOffset {
        enter: Anchor::new(Edge::Center, Edge::End),
        exit: Anchor::new(Edge::Start, Edge::Start),
    };

    pub fn parse(enter: &str, exit: &str) -> Result<Self, OffsetParseError> {
        Ok(Self {
            enter: enter.parse()?,
            exit: exit.parse()?,
        })
    }

    /// Progress for a viewport position over a region.
    pub fn progress(&self, region: RegionRect, viewport: Viewport) -> ScrollProgress {
        let start = self.enter.scroll_position(region, viewport.height);
        let end = self.exit.scroll_position(region, viewport.height);
        let span = end - start;

        if span.abs() < f64::EPSILON {
            // Degenerate range: a step at the single anchor position
            return if viewport.scroll_y >= end {
                ScrollProgress::ONE
            } else {
                ScrollProgress::ZERO
            };
        }
        ScrollProgress::new((viewport.scroll_y - start) / span)
    }
}

impl TryFrom<[String; 2]> for ScrollOffset {
    type Error = OffsetParseError;

    fn try_from(value: [String; 2]) -> Result<Self, Self::Error> {
        Self::parse(&value[0], &value[1])
    }
}

impl From<ScrollOffset> for [String; 2] {
    fn from(offset: ScrollOffset) -> Self {
        [offset.enter.to_string(), offset.exit.to_string()]
    }
}

/// Offset string parse errors
#[derive(Debug, Clone, PartialEq)]
pub enum OffsetParseError {
    UnknownEdge(String),
    OutOfRange(String),
    Malformed(String),
}

impl fmt::Display for OffsetParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetParseError::UnknownEdge(s) => write!(f, "Unknown edge: '{}'", s),
            OffsetParseError::OutOfRange(s) => write!(f, "Edge fraction outside 0..1: '{}'", s),
            OffsetParseError::Malformed(s) => {
                write!(f, "Expected '<region edge> <viewport edge>', got '{}'", s)
            }
        }
    }
}

impl std::error::Error for OffsetParseError {}

/// Tracked region in page coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionRect {
    pub top: f64,
    pub height: f64,
}

/// Visible window onto the page.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub scroll_y: f64,
    pub height: f64,
}

/// Emits [`ScrollProgressEvent`]s for one region.
///
/// Nothing is emitted until both a region is mounted and a viewport has been
/// observed. After that, every scroll/resize that changes the progress value
/// emits exactly once.
#[derive(Debug)]
pub struct ScrollTracker {
    id: Uuid,
    offset: ScrollOffset,
    region: Option<RegionRect>,
    viewport: Option<Viewport>,
    /// Last emitted value
    progress: Option<ScrollProgress>,
    emitter: SceneEmitter,
}

impl ScrollTracker {
    pub fn new(offset: ScrollOffset, emitter: SceneEmitter) -> Self {
        let id = Uuid::new_v4();
        debug!("ScrollTracker {} created: offset [{}, {}]", id, offset.enter, offset.exit);
        Self {
            id,
            offset,
            region: None,
            viewport: None,
            progress: None,
            emitter,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn offset(&self) -> ScrollOffset {
        self.offset
    }

    pub fn is_mounted(&self) -> bool {
        self.region.is_some()
    }

    /// Attach the region. Emits right away if a viewport is already known.
    pub fn mount(&mut self, region: RegionRect) -> Option<ScrollProgress> {
        debug!("ScrollTracker {}: mounted at top={} height={}", self.id, region.top, region.height);
        self.region = Some(region);
        self.recompute()
    }

    /// Region geometry changed (layout/resize).
    pub fn set_region(&mut self, region: RegionRect) -> Option<ScrollProgress> {
        if self.region == Some(region) {
            return None;
        }
        self.region = Some(region);
        self.recompute()
    }

    /// Stop tracking. The last progress stays readable.
    pub fn unmount(&mut self) {
        if self.region.take().is_some() {
            debug!("ScrollTracker {}: unmounted", self.id);
        }
    }

    pub fn on_scroll(&mut self, viewport: Viewport) -> Option<ScrollProgress> {
        self.viewport = Some(viewport);
        self.recompute()
    }

    pub fn on_resize(&mut self, viewport: Viewport) -> Option<ScrollProgress> {
        self.on_scroll(viewport)
    }

    /// Last emitted progress (0 before the first emission)
    pub fn progress(&self) -> ScrollProgress {
        self.progress.unwrap_or_default()
    }

    fn recompute(&mut self) -> Option<ScrollProgress> {
        let (Some(region), Some(viewport)) = (self.region, self.viewport) else {
            trace!("ScrollTracker {}: waiting for region/viewport", self.id);
            return None;
        };

        let progress = self.offset.progress(region, viewport);
        if self.progress == Some(progress) {
            return None;
        }
        self.progress = Some(progress);
        trace!("ScrollTracker {}: progress {}", self.id, progress);
        self.emitter.emit(ScrollProgressEvent {
            tracker: self.id,
            progress,
        });
        Some(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_bus::{EventBus, downcast_event};

    const REGION: RegionRect = RegionRect {
        top: 1000.0,
        height: 3000.0,
    };

    fn viewport(scroll_y: f64) -> Viewport {
        Viewport {
            scroll_y,
            height: 1000.0,
        }
    }

    #[test]
    fn test_progress_clamps_and_nan() {
        assert_eq!(ScrollProgress::new(-0.5), ScrollProgress::ZERO);
        assert_eq!(ScrollProgress::new(1.5), ScrollProgress::ONE);
        assert_eq!(ScrollProgress::new(f64::NAN), ScrollProgress::ZERO);
        assert_eq!(ScrollProgress::new(0.25).value(), 0.25);
    }

    #[test]
    fn test_parse_anchors() {
        let offset = ScrollOffset::parse("center end", "start start").unwrap();
        assert_eq!(offset, ScrollOffset::CENTER_ENTER);

        let a: Anchor = "25% 0.5".parse().unwrap();
        assert_eq!(a.region, Edge::Fraction(0.25));
        assert_eq!(a.viewport, Edge::Fraction(0.5));

        assert!(matches!("middle end".parse::<Anchor>(), Err(OffsetParseError::UnknownEdge(_))));
        assert!(matches!("start".parse::<Anchor>(), Err(OffsetParseError::Malformed(_))));
        assert!(matches!("1.5 end".parse::<Anchor>(), Err(OffsetParseError::OutOfRange(_))));
    }

    #[test]
    fn test_offset_serde_as_strings() {
        let json = serde_json::to_string(&ScrollOffset::CENTER_ENTER).unwrap();
        assert_eq!(json, r#"["center end","start start"]"#);
        let back: ScrollOffset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ScrollOffset::CENTER_ENTER);
        assert!(serde_json::from_str::<ScrollOffset>(r#"["nope end","start start"]"#).is_err());
    }

    #[test]
    fn test_contain_offset_progress() {
        let offset = ScrollOffset::CONTAIN;
        // start start -> 1000, end end -> 1000 + 3000 - 1000 = 3000
        assert_eq!(offset.progress(REGION, viewport(0.0)), ScrollProgress::ZERO);
        assert_eq!(offset.progress(REGION, viewport(1000.0)), ScrollProgress::ZERO);
        assert_eq!(offset.progress(REGION, viewport(2000.0)).value(), 0.5);
        assert_eq!(offset.progress(REGION, viewport(3000.0)), ScrollProgress::ONE);
        assert_eq!(offset.progress(REGION, viewport(9000.0)), ScrollProgress::ONE);
    }

    #[test]
    fn test_center_enter_offset_progress() {
        let offset = ScrollOffset::CENTER_ENTER;
        // center end -> 1000 + 1500 - 1000 = 1500, start start -> 1000: range runs backwards
        assert_eq!(offset.progress(REGION, viewport(1500.0)), ScrollProgress::ZERO);
        assert_eq!(offset.progress(REGION, viewport(1250.0)).value(), 0.5);
        assert_eq!(offset.progress(REGION, viewport(1000.0)), ScrollProgress::ONE);
    }

    #[test]
    fn test_degenerate_range_steps() {
        let offset = ScrollOffset::parse("start start", "start start").unwrap();
        assert_eq!(offset.progress(REGION, viewport(999.0)), ScrollProgress::ZERO);
        assert_eq!(offset.progress(REGION, viewport(1000.0)), ScrollProgress::ONE);
    }

    #[test]
    fn test_tracker_defers_until_mounted() {
        let bus = EventBus::new();
        let mut tracker = ScrollTracker::new(
            ScrollOffset::CONTAIN,
            SceneEmitter::from_emitter(bus.emitter()),
        );

        assert_eq!(tracker.on_scroll(viewport(2000.0)), None);
        assert_eq!(bus.queue_len(), 0);

        let emitted = tracker.mount(REGION);
        assert_eq!(emitted.map(|p| p.value()), Some(0.5));

        let events = bus.poll();
        assert_eq!(events.len(), 1);
        let ev = downcast_event::<ScrollProgressEvent>(&events[0]).unwrap();
        assert_eq!(ev.tracker, tracker.id());
        assert_eq!(ev.progress.value(), 0.5);
    }

    #[test]
    fn test_tracker_emits_only_on_change() {
        let mut tracker = ScrollTracker::new(ScrollOffset::CONTAIN, SceneEmitter::dummy());
        tracker.mount(REGION);

        assert!(tracker.on_scroll(viewport(0.0)).is_some());
        // Still clamped at 0
        assert!(tracker.on_scroll(viewport(500.0)).is_none());
        assert!(tracker.on_scroll(viewport(1500.0)).is_some());
        assert!(tracker.on_scroll(viewport(1500.0)).is_none());
        // Scrolling back up is allowed
        assert_eq!(tracker.on_scroll(viewport(1200.0)).map(|p| p.value()), Some(0.1));
    }

    #[test]
    fn test_tracker_region_resize_recomputes() {
        let mut tracker = ScrollTracker::new(ScrollOffset::CONTAIN, SceneEmitter::dummy());
        tracker.mount(REGION);
        tracker.on_scroll(viewport(2000.0));
        assert_eq!(tracker.progress().value(), 0.5);

        let taller = RegionRect {
            top: 1000.0,
            height: 5000.0,
        };
        assert_eq!(tracker.set_region(taller).map(|p| p.value()), Some(0.25));
        assert_eq!(tracker.set_region(taller), None);
    }

    #[test]
    fn test_unmounted_tracker_is_silent() {
        let mut tracker = ScrollTracker::new(ScrollOffset::CONTAIN, SceneEmitter::dummy());
        tracker.mount(REGION);
        tracker.on_scroll(viewport(2000.0));
        tracker.unmount();

        assert!(!tracker.is_mounted());
        assert_eq!(tracker.on_scroll(viewport(2500.0)), None);
        assert_eq!(tracker.progress().value(), 0.5);
    }
}
