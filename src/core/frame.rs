//! Decoded frame assets and the `1..N` naming scheme.
//!
//! **Used by**: decode workers (produce), renderer + SequenceMedia (consume).
//!
//! A [`FrameAsset`] is immutable once decoded: pixels live behind an `Arc` so
//! handing a frame to the renderer or the viewer never copies the image.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use log::debug;
use serde::{Deserialize, Serialize};

use super::mapping::FrameIndex;

/// Decode lifecycle of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Known path, decode not requested yet
    Pending,
    /// Queued or decoding on a worker
    Loading,
    Ready,
    /// Decode failed; stays unavailable
    Failed,
}

/// Immutable decoded image for one frame index.
#[derive(Debug, Clone)]
pub struct FrameAsset {
    index: FrameIndex,
    image: Arc<RgbaImage>,
}

impl FrameAsset {
    pub fn new(index: FrameIndex, image: RgbaImage) -> Self {
        Self {
            index,
            image: Arc::new(image),
        }
    }

    pub fn index(&self) -> FrameIndex {
        self.index
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Raw RGBA8 bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Frame loading errors
#[derive(Debug)]
pub enum FrameError {
    Io(String),
    Image(String),
    OutOfRange(u32),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "IO error: {}", e),
            FrameError::Image(e) => write!(f, "Image error: {}", e),
            FrameError::OutOfRange(i) => write!(f, "Frame index {} outside sequence", i),
        }
    }
}

impl std::error::Error for FrameError {}

/// Path template for a numbered sequence: `{}` is replaced by the 1-based index.
///
/// `images/{}.webp` -> `images/1.webp`, `images/2.webp`, ...
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FramePattern(String);

impl FramePattern {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn template(&self) -> &str {
        &self.0
    }

    pub fn has_placeholder(&self) -> bool {
        self.0.contains("{}")
    }

    pub fn path(&self, index: FrameIndex) -> PathBuf {
        PathBuf::from(self.0.replacen("{}", &index.get().to_string(), 1))
    }

    /// Same pattern with relative templates resolved against `base`.
    pub fn resolve(&self, base: &Path) -> Self {
        if Path::new(&self.0).is_absolute() {
            return self.clone();
        }
        Self(base.join(&self.0).to_string_lossy().into_owned())
    }
}

/// Decode one frame file into an RGBA asset.
pub fn decode_frame(path: &Path, index: FrameIndex) -> Result<FrameAsset, FrameError> {
    debug!("Decoding frame {}: {}", index, path.display());

    if !path.exists() {
        return Err(FrameError::Io(format!("{} not found", path.display())));
    }
    let img = image::open(path)
        .map_err(|e| FrameError::Image(format!("{}: {}", path.display(), e)))?;

    Ok(FrameAsset::new(index, img.to_rgba8()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_pattern_expands_index() {
        let pattern = FramePattern::new("images/{}.webp");
        let idx = FrameIndex::new(12).unwrap();
        assert_eq!(pattern.path(idx), PathBuf::from("images/12.webp"));
        assert!(pattern.has_placeholder());
        assert!(!FramePattern::new("video.mp4").has_placeholder());
    }

    #[test]
    fn test_pattern_resolve_relative() {
        let pattern = FramePattern::new("frames/{}.png");
        let resolved = pattern.resolve(Path::new("/srv/site"));
        assert_eq!(
            resolved.path(FrameIndex::FIRST),
            PathBuf::from("/srv/site/frames/1.png")
        );
    }

    #[test]
    fn test_decode_png_roundtrip() {
        let dir = std::env::temp_dir().join(format!("scrollreel-frame-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("1.png");
        RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 255])).save(&path).unwrap();

        let asset = decode_frame(&path, FrameIndex::FIRST).unwrap();
        assert_eq!((asset.width(), asset.height()), (4, 3));
        assert_eq!(&asset.pixels()[..4], &[10, 20, 30, 255]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_frame(Path::new("/nonexistent/1.png"), FrameIndex::FIRST).unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
    }
}
