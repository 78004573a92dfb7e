use std::collections::HashMap;

use image::RgbaImage;

#[allow(unused_imports)]
use log::{debug, info, warn};

use crate::atlas::border::BakedBorder;
use crate::atlas::key::ImageKey;
use crate::atlas::record::{AtlasRect, ImageRecord, PendingImage};
use crate::error::LoadError;

/// Bookkeeping of image requests: one record per key, the queue of decoded
/// images waiting to be packed, and whether a flush is already scheduled.
///
/// Fetching itself happens outside; the loader only decides whether a fetch
/// is needed and what a completion means.
#[derive(Debug, Default)]
pub struct ImageLoader {
    records: HashMap<ImageKey, ImageRecord>,
    pending: Vec<PendingImage>,
    flush_scheduled: bool,
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `key` was unknown and a fetch must be issued.
    pub fn request(&mut self, key: &ImageKey) -> bool {
        if self.records.contains_key(key) {
            return false;
        }
        self.records.insert(key.clone(), ImageRecord::Loading);
        true
    }

    /// Applies the outcome of a fetch. Returns `true` when this completion
    /// opened a new pending window, i.e. the caller must schedule a flush.
    pub fn complete(
        &mut self,
        key: ImageKey,
        result: Result<RgbaImage, LoadError>,
        border: Option<BakedBorder>,
    ) -> bool {
        match self.records.get(&key) {
            Some(ImageRecord::Loading) => {}
            Some(other) => {
                warn!("Ignoring completion for {} in state {:?}", key, other);
                return false;
            }
            None => {
                warn!("Ignoring completion for unknown image {}", key);
                return false;
            }
        }

        let pixels = match result.and_then(non_empty) {
            Ok(pixels) => pixels,
            Err(e) => {
                warn!("Failed to load image {}: {}", key, e);
                self.records.insert(key, ImageRecord::Error);
                return false;
            }
        };

        let (width, height) = pixels.dimensions();
        debug!("Image {} ready for packing ({}x{})", key, width, height);
        self.records.insert(key.clone(), ImageRecord::Pending { width, height });
        self.pending.push(PendingImage { key, pixels, border });

        if self.flush_scheduled {
            false
        } else {
            self.flush_scheduled = true;
            true
        }
    }

    /// Drains the pending queue in arrival order and closes the window.
    pub fn take_pending(&mut self) -> Vec<PendingImage> {
        self.flush_scheduled = false;
        std::mem::take(&mut self.pending)
    }

    /// `Pending -> Ready`; the only way a record acquires a rectangle.
    pub fn mark_ready(&mut self, key: &ImageKey, rect: AtlasRect) {
        match self.records.get_mut(key) {
            Some(record @ ImageRecord::Pending { .. }) => *record = ImageRecord::Ready(rect),
            Some(record) => warn!("Cannot mark {} ready from {:?}", key, record),
            None => warn!("Cannot mark unknown image {} ready", key),
        }
    }

    pub fn record(&self, key: &ImageKey) -> Option<ImageRecord> {
        self.records.get(key).copied()
    }

    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count_where(&self, predicate: impl Fn(&ImageRecord) -> bool) -> usize {
        self.records.values().filter(|record| predicate(record)).count()
    }
}

fn non_empty(pixels: RgbaImage) -> Result<RgbaImage, LoadError> {
    let (width, height) = pixels.dimensions();
    if width == 0 || height == 0 {
        Err(LoadError::EmptyImage { width, height })
    } else {
        Ok(pixels)
    }
}
