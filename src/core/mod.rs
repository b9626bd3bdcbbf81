//! Core engine modules - scroll tracking, mapping, frame cache, playback
//!
//! These modules form the scroll-driven engine, independent of UI.

pub mod debounce;
pub mod event_bus;
pub mod events;
pub mod frame;
pub mod frame_cache;
pub mod mapping;
pub mod media;
pub mod playback;
pub mod renderer;
pub mod scroll;
pub mod sequence_media;
pub mod workers;

// Re-exports for convenience
pub use debounce::DebounceTimer;
pub use event_bus::{EventBus, SceneEmitter};
pub use frame::{FrameAsset, FramePattern};
pub use frame_cache::FrameCache;
pub use mapping::{FrameIndex, FrameIndexMapper, MediaTimestamp, TimeMapper};
pub use media::{MediaElement, MediaEvent, ReadyState};
pub use playback::{LoopWindow, PlaybackConfig, PlaybackController, PlaybackMode};
pub use renderer::{CanvasSurface, FrameRenderer, Surface};
pub use scroll::{RegionRect, ScrollOffset, ScrollProgress, ScrollTracker, Viewport};
pub use sequence_media::SequenceMedia;
pub use workers::Workers;
