use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::atlas::border::BakedBorder;
use crate::atlas::key::ImageKey;

/// Axis-aligned region of the atlas, in atlas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// `[x, y, width, height]` divided by the atlas dimensions.
    pub fn normalized(&self, atlas_width: u32, atlas_height: u32) -> [f32; 4] {
        if atlas_width == 0 || atlas_height == 0 {
            return [0.0; 4];
        }
        let (w, h) = (atlas_width as f32, atlas_height as f32);
        [
            self.x as f32 / w,
            self.y as f32 / h,
            self.width as f32 / w,
            self.height as f32 / h,
        ]
    }
}

/// Lifecycle of one requested image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRecord {
    /// Request issued, no data yet
    Loading,
    /// Load failed; terminal
    Error,
    /// Decoded and queued, not yet packed
    Pending { width: u32, height: u32 },
    /// Packed; the rectangle never moves
    Ready(AtlasRect),
}

impl ImageRecord {
    pub fn rect(&self) -> Option<AtlasRect> {
        match self {
            ImageRecord::Ready(rect) => Some(*rect),
            ImageRecord::Loading | ImageRecord::Error | ImageRecord::Pending { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImageRecord::Error | ImageRecord::Ready(_))
    }
}

/// A decoded image waiting for the next flush.
#[derive(Debug, Clone)]
pub struct PendingImage {
    pub key: ImageKey,
    pub pixels: RgbaImage,
    pub border: Option<BakedBorder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_rect() {
        let rect = AtlasRect::new(192, 0, 100, 100);
        assert_eq!(rect.normalized(400, 200), [0.48, 0.0, 0.25, 0.5]);
        assert_eq!(rect.normalized(0, 200), [0.0; 4]);
    }

    #[test]
    fn test_only_ready_records_have_rects() {
        assert_eq!(ImageRecord::Loading.rect(), None);
        assert_eq!(ImageRecord::Error.rect(), None);
        assert_eq!(ImageRecord::Pending { width: 4, height: 4 }.rect(), None);
        let rect = AtlasRect::new(0, 0, 4, 4);
        assert_eq!(ImageRecord::Ready(rect).rect(), Some(rect));
    }
}
