//! Scenes: the two scroll-driven page components and the stage hosting them.

pub mod frame_sequence;
pub mod script;
pub mod scroll_video;
pub mod stage;

pub use frame_sequence::FrameSequenceScene;
pub use script::{PageAction, ScrollScript};
pub use scroll_video::ScrollVideoScene;
pub use stage::{PageLayout, Stage};
