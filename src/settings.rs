//! Persistent settings (`scrollreel.json`).
//!
//! Every field has a default, so a partial file (or none) is valid input.
//! Loading validates the result; a bad value is reported, never clamped silently.

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::event_bus::{EventBus, SceneEmitter};
use crate::core::frame::FramePattern;
use crate::core::frame_cache::FrameCache;
use crate::core::playback::{DEFAULT_SEEK_TOLERANCE, LoopWindow, PlaybackConfig};
use crate::core::scroll::ScrollOffset;
use crate::core::sequence_media::SequenceMedia;
use crate::scenes::frame_sequence::FrameSequenceScene;
use crate::scenes::scroll_video::ScrollVideoScene;
use crate::scenes::stage::{PageLayout, Stage};

#[derive(Debug)]
pub enum SettingsError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::Parse(e) => write!(f, "Settings parse error: {}", e),
            SettingsError::Invalid(e) => write!(f, "Invalid setting: {}", e),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Scroll-scrubbed image sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesSettings {
    pub template: FramePattern,
    pub frame_count: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub offset: ScrollOffset,
}

impl Default for FramesSettings {
    fn default() -> Self {
        Self {
            template: FramePattern::new("images/{}.webp"),
            frame_count: 86,
            canvas_width: 1000,
            canvas_height: 1000,
            offset: ScrollOffset::CENTER_ENTER,
        }
    }
}

/// Scroll-synced video, played from a frame sequence at `fps`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub template: FramePattern,
    pub frame_count: u32,
    pub fps: f64,
    pub loop_start: f64,
    pub loop_end: f64,
    pub seek_tolerance: f64,
    pub debounce_ms: u64,
    pub offset: ScrollOffset,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            template: FramePattern::new("video/{}.webp"),
            frame_count: 150,
            fps: 24.0,
            loop_start: 4.0,
            loop_end: 5.0,
            seek_tolerance: DEFAULT_SEEK_TOLERANCE,
            debounce_ms: 150,
            offset: ScrollOffset::CONTAIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub frames: FramesSettings,
    pub video: VideoSettings,
    pub layout: PageLayout,
    /// Base directory for relative frame templates (default: settings file directory)
    pub assets_dir: Option<PathBuf>,
    pub workers_override: u32, // 0 = auto
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frames: FramesSettings::default(),
            video: VideoSettings::default(),
            layout: PageLayout::default(),
            assets_dir: None,
            workers_override: 0,
        }
    }
}

impl Settings {
    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;
        let settings = Self::from_json(&json)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |msg: String| Err(SettingsError::Invalid(msg));

        if self.frames.frame_count == 0 {
            return invalid("frames.frame_count must be at least 1".into());
        }
        if self.frames.canvas_width == 0 || self.frames.canvas_height == 0 {
            return invalid(format!(
                "frames canvas {}x{} is empty",
                self.frames.canvas_width, self.frames.canvas_height
            ));
        }
        for (name, template) in [("frames", &self.frames.template), ("video", &self.video.template)] {
            if !template.has_placeholder() {
                return invalid(format!("{}.template '{}' has no {{}} placeholder", name, template.template()));
            }
        }
        if self.video.frame_count == 0 {
            return invalid("video.frame_count must be at least 1".into());
        }
        if !(self.video.fps.is_finite() && self.video.fps > 0.0) {
            return invalid(format!("video.fps {} must be positive", self.video.fps));
        }
        if !self.loop_window().is_valid() {
            return invalid(format!(
                "video loop [{}, {}] must satisfy 0 <= start < end",
                self.video.loop_start, self.video.loop_end
            ));
        }
        let media_duration = f64::from(self.video.frame_count) / self.video.fps;
        if self.video.loop_end > media_duration {
            return invalid(format!(
                "video loop end {}s is past the media end ({} frames at {} fps = {:.3}s)",
                self.video.loop_end, self.video.frame_count, self.video.fps, media_duration
            ));
        }
        if !(self.video.seek_tolerance.is_finite() && self.video.seek_tolerance >= 0.0) {
            return invalid(format!("video.seek_tolerance {} must be >= 0", self.video.seek_tolerance));
        }
        if self.layout.viewport_height <= 0.0 {
            return invalid(format!("layout.viewport_height {} must be positive", self.layout.viewport_height));
        }
        for (name, region) in [("frames_region", self.layout.frames_region), ("video_region", self.layout.video_region)] {
            if region.height < 0.0 || region.top < 0.0 {
                return invalid(format!("layout.{} has negative geometry", name));
            }
        }
        Ok(())
    }

    pub fn frames_count(&self) -> NonZeroU32 {
        NonZeroU32::new(self.frames.frame_count).unwrap_or(NonZeroU32::MIN)
    }

    pub fn video_count(&self) -> NonZeroU32 {
        NonZeroU32::new(self.video.frame_count).unwrap_or(NonZeroU32::MIN)
    }

    pub fn loop_window(&self) -> LoopWindow {
        LoopWindow::new(self.video.loop_start, self.video.loop_end)
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            loop_window: self.loop_window(),
            seek_tolerance: self.video.seek_tolerance,
            idle_delay: Duration::from_millis(self.video.debounce_ms),
        }
    }

    /// Decode threads: override if set, else cores minus one.
    pub fn worker_threads(&self) -> usize {
        if self.workers_override > 0 {
            self.workers_override as usize
        } else {
            num_cpus::get().saturating_sub(1).max(1)
        }
    }

    /// Frame templates resolved against `assets_dir` (or `fallback_base`).
    pub fn resolved_templates(&self, fallback_base: &Path) -> (FramePattern, FramePattern) {
        let base = self.assets_dir.as_deref().unwrap_or(fallback_base);
        (self.frames.template.resolve(base), self.video.template.resolve(base))
    }

    /// Unmounted stage with both scenes wired to `bus`. Nothing is decoded yet.
    pub fn build_stage(&self, bus: EventBus, base: &Path) -> Stage {
        let (frames_pattern, video_pattern) = self.resolved_templates(base);
        info!(
            "Building stage: frames '{}' x{}, video '{}' x{} @ {}fps",
            frames_pattern.template(),
            self.frames.frame_count,
            video_pattern.template(),
            self.video.frame_count,
            self.video.fps
        );

        let frames = FrameSequenceScene::new(
            FrameCache::new(frames_pattern, self.frames_count()),
            self.frames.offset,
            (self.frames.canvas_width, self.frames.canvas_height),
            SceneEmitter::from_emitter(bus.emitter()),
        );
        let video = ScrollVideoScene::new(
            SequenceMedia::new(FrameCache::new(video_pattern, self.video_count()), self.video.fps),
            self.playback_config(),
            self.video.offset,
            SceneEmitter::from_emitter(bus.emitter()),
        );
        Stage::new(bus, self.layout).with_frames(frames).with_video(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.frames.frame_count, 86);
        assert_eq!(settings.frames.offset, ScrollOffset::CENTER_ENTER);
        assert_eq!(settings.playback_config(), PlaybackConfig::default());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings = Settings::from_json(
            r#"{ "video": { "fps": 30, "offset": ["start end", "end start"] }, "workers_override": 3 }"#,
        )
        .unwrap();
        assert_eq!(settings.video.fps, 30.0);
        assert_eq!(settings.video.loop_start, 4.0);
        assert_eq!(settings.video.offset, ScrollOffset::parse("start end", "end start").unwrap());
        assert_eq!(settings.frames, FramesSettings::default());
        assert_eq!(settings.worker_threads(), 3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            r#"{ "frames": { "frame_count": 0 } }"#,
            r#"{ "video": { "loop_start": 5, "loop_end": 4 } }"#,
            r#"{ "video": { "fps": 0 } }"#,
            // 100 frames at 24 fps end at 4.17s, inside the 4..5 loop
            r#"{ "video": { "frame_count": 100 } }"#,
            r#"{ "frames": { "template": "still.png" } }"#,
            r#"{ "layout": { "frames_region": { "top": 0, "height": 10 }, "video_region": { "top": 0, "height": 10 }, "viewport_height": 0 } }"#,
        ];
        for json in cases {
            assert!(
                matches!(Settings::from_json(json), Err(SettingsError::Invalid(_))),
                "accepted: {}",
                json
            );
        }
        assert!(matches!(
            Settings::from_json(r#"{ "frames": { "offset": ["top top", "end end"] } }"#),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("scrollreel-settings-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("scrollreel.json");

        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        let mut settings = Settings::default();
        settings.video.debounce_ms = 300;
        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.playback_config().idle_delay, Duration::from_millis(300));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_templates_resolve_against_assets_dir() {
        let mut settings = Settings::default();
        settings.assets_dir = Some(PathBuf::from("/srv/page"));
        let (frames, _) = settings.resolved_templates(Path::new("/ignored"));
        assert_eq!(frames.template(), "/srv/page/images/{}.webp");
    }
}
