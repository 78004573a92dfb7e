use image::imageops::{self, FilterType};
use image::RgbaImage;

#[allow(unused_imports)]
use log::{debug, trace};

use crate::atlas::buffer::AtlasBuffer;
use crate::atlas::key::ImageKey;
use crate::atlas::record::{AtlasRect, PendingImage};

/// Where one image of a batch ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub key: ImageKey,
    pub rect: AtlasRect,
}

/// Next free slot of the shelf packer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCursor {
    pub x: u32,
    pub y: u32,
    /// Height of the currently open row
    pub row_height: u32,
}

/// Packs square tiles left to right into rows no wider than
/// `max_row_width`, opening a new row below when one is full. Previously
/// placed tiles never move.
#[derive(Debug, Clone)]
pub struct ShelfPacker {
    max_texture_size: u32,
    max_row_width: u32,
    cursor: WriteCursor,
    // Widest row extent so far; the full row width once a row was closed
    extent_width: u32,
}

impl ShelfPacker {
    pub fn new(max_texture_size: u32, max_row_width: u32) -> Self {
        Self {
            max_texture_size: max_texture_size.max(1),
            max_row_width: max_row_width.max(1),
            cursor: WriteCursor::default(),
            extent_width: 0,
        }
    }

    pub fn cursor(&self) -> WriteCursor {
        self.cursor
    }

    /// Edge of the square an image of `width` x `height` occupies.
    pub fn packed_size(&self, width: u32, height: u32) -> u32 {
        width
            .min(height)
            .min(self.max_texture_size)
            .max(1)
            .min(self.max_row_width)
    }

    /// Buffer size needed to hold everything placed so far, open row included.
    pub fn required_size(&self) -> (u32, u32) {
        (self.extent_width, self.cursor.y + self.cursor.row_height)
    }

    fn place(&mut self, size: u32) -> AtlasRect {
        if self.cursor.x + size > self.max_row_width {
            // Row is full: continue on the next one
            self.cursor.y += self.cursor.row_height;
            self.cursor.x = 0;
            self.cursor.row_height = 0;
            self.extent_width = self.max_row_width;
        }

        let rect = AtlasRect::new(self.cursor.x, self.cursor.y, size, size);
        self.cursor.x += size;
        self.cursor.row_height = self.cursor.row_height.max(size);
        self.extent_width = self.extent_width.max(self.cursor.x);
        rect
    }

    /// Lays out `batch` in order, grows `buffer`, then draws every tile.
    ///
    /// The buffer is resized before anything is drawn; resizing afterwards
    /// would drop the pixels of the new row.
    pub fn pack(&mut self, batch: Vec<PendingImage>, buffer: &mut AtlasBuffer) -> Vec<Placement> {
        if batch.is_empty() {
            return Vec::new();
        }

        let rects: Vec<AtlasRect> = batch
            .iter()
            .map(|image| {
                let (width, height) = image.pixels.dimensions();
                let size = self.packed_size(width, height);
                self.place(size)
            })
            .collect();

        let (width, height) = self.required_size();
        buffer.ensure_size(width, height);

        let mut placements = Vec::with_capacity(batch.len());
        for (image, rect) in batch.into_iter().zip(rects) {
            let mut tile = square_tile(&image.pixels, rect.width);
            if let Some(border) = &image.border {
                border.stroke(&mut tile);
            }
            buffer.draw_image(rect, &tile);
            trace!("Packed {} at {:?}", image.key, rect);
            placements.push(Placement { key: image.key, rect });
        }

        debug!(
            "Packed {} images, atlas now {}x{}, cursor {:?}",
            placements.len(),
            buffer.width(),
            buffer.height(),
            self.cursor
        );
        placements
    }
}

/// Crops the largest centered square out of `source` and resamples it to
/// `size` x `size`.
pub fn square_tile(source: &RgbaImage, size: u32) -> RgbaImage {
    let (width, height) = source.dimensions();
    let side = width.min(height);
    let dx = (width - side) / 2;
    let dy = (height - side) / 2;

    let square = imageops::crop_imm(source, dx, dy, side, side).to_image();
    if side == size {
        square
    } else {
        imageops::resize(&square, size, size, FilterType::Triangle)
    }
}
