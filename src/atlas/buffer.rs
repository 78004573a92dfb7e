use std::sync::Arc;

use image::{imageops, RgbaImage};

#[allow(unused_imports)]
use log::{debug, trace};

use crate::atlas::record::AtlasRect;

/// Read-only view of the atlas raster handed to consumers for upload.
pub type AtlasTexture = Arc<RgbaImage>;

/// The growable RGBA surface images are packed into.
///
/// Growth is append-only: existing pixels are copied into the top-left of
/// the new raster, and the surface never shrinks. Snapshots share the
/// raster until the next write, which copies it if a snapshot is alive.
#[derive(Debug, Clone)]
pub struct AtlasBuffer {
    image: Arc<RgbaImage>,
}

impl Default for AtlasBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AtlasBuffer {
    /// A 1x1 transparent raster, so a texture is always available.
    pub fn new() -> Self {
        Self {
            image: Arc::new(RgbaImage::new(1, 1)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Grows to at least `width` x `height`, preserving content.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        let (current_width, current_height) = self.dimensions();
        if width <= current_width && height <= current_height {
            return;
        }

        let new_width = width.max(current_width);
        let new_height = height.max(current_height);
        debug!(
            "Growing atlas buffer {}x{} -> {}x{}",
            current_width, current_height, new_width, new_height
        );

        let mut grown = RgbaImage::new(new_width, new_height);
        imageops::replace(&mut grown, self.image.as_ref(), 0, 0);
        self.image = Arc::new(grown);
    }

    /// Writes `pixels` at `rect`. The caller grows the buffer first.
    pub fn draw_image(&mut self, rect: AtlasRect, pixels: &RgbaImage) {
        debug_assert!(
            rect.right() <= self.width() && rect.bottom() <= self.height(),
            "draw outside atlas bounds: {:?} in {}x{}",
            rect,
            self.width(),
            self.height()
        );
        debug_assert_eq!(pixels.dimensions(), (rect.width, rect.height));
        trace!("Drawing {}x{} at ({}, {})", rect.width, rect.height, rect.x, rect.y);

        let target = Arc::make_mut(&mut self.image);
        imageops::replace(target, pixels, rect.x as i64, rect.y as i64);
    }

    pub fn snapshot(&self) -> AtlasTexture {
        Arc::clone(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn tile(size: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba(color))
    }

    #[test]
    fn test_starts_as_single_transparent_pixel() {
        let buffer = AtlasBuffer::new();
        assert_eq!(buffer.dimensions(), (1, 1));
        assert_eq!(*buffer.snapshot().get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_growth_preserves_content() {
        let mut buffer = AtlasBuffer::new();
        buffer.ensure_size(4, 4);
        buffer.draw_image(AtlasRect::new(1, 1, 2, 2), &tile(2, [255, 0, 0, 255]));
        let before = buffer.snapshot();

        buffer.ensure_size(10, 7);
        let after = buffer.snapshot();
        assert_eq!(after.dimensions(), (10, 7));
        for (x, y, pixel) in before.enumerate_pixels() {
            assert_eq!(after.get_pixel(x, y), pixel);
        }
        assert_eq!(*after.get_pixel(9, 6), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_never_shrinks() {
        let mut buffer = AtlasBuffer::new();
        buffer.ensure_size(8, 8);
        buffer.ensure_size(2, 20);
        assert_eq!(buffer.dimensions(), (8, 20));
        buffer.ensure_size(1, 1);
        assert_eq!(buffer.dimensions(), (8, 20));
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_draws() {
        let mut buffer = AtlasBuffer::new();
        buffer.ensure_size(2, 2);
        let snapshot = buffer.snapshot();
        buffer.draw_image(AtlasRect::new(0, 0, 1, 1), &tile(1, [1, 2, 3, 4]));

        assert_eq!(*snapshot.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*buffer.snapshot().get_pixel(0, 0), Rgba([1, 2, 3, 4]));
    }
}
