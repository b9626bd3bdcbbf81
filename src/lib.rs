//! scrollreel - scroll-driven image sequence and video playback
//!
//! Re-exports all modules for use by the binary target.

// Core engine (scroll tracking, mapping, frame cache, playback)
pub mod core;

// Page components
pub mod scenes;

// App modules
pub mod cli;
pub mod config;
pub mod render;
pub mod runner;
pub mod settings;
pub mod viewer;

// Re-export commonly used types from core
pub use crate::core::event_bus::{BoxedEvent, EventBus, EventEmitter, SceneEmitter, downcast_event};
pub use crate::core::playback::{PlaybackController, PlaybackMode};
pub use crate::core::scroll::{ScrollOffset, ScrollProgress, ScrollTracker};

pub use scenes::{FrameSequenceScene, ScrollVideoScene, Stage};
pub use settings::Settings;
