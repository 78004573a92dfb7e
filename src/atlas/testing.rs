//! In-memory fetcher shared by the atlas tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::atlas::fetch::ImageFetcher;
use crate::error::LoadError;

#[derive(Debug, Default)]
pub struct MemoryFetcher {
    images: Mutex<HashMap<String, Vec<u8>>>,
    fetches: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves a solid-color PNG of the given size under `source`.
    pub fn with_image(self, source: &str, width: u32, height: u32, color: [u8; 4]) -> Self {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode test image");
        self.images.lock().unwrap().insert(source.to_string(), bytes);
        self
    }

    pub fn with_bytes(self, source: &str, bytes: &[u8]) -> Self {
        self.images.lock().unwrap().insert(source.to_string(), bytes.to_vec());
        self
    }

    /// Every source fetched so far, in call order.
    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

impl ImageFetcher for MemoryFetcher {
    fn fetch(&self, source: &str) -> BoxFuture<'static, Result<Vec<u8>, LoadError>> {
        self.fetches.lock().unwrap().push(source.to_string());
        let result = self.images.lock().unwrap().get(source).cloned().ok_or_else(|| {
            LoadError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, source.to_string()))
        });
        futures::future::ready(result).boxed()
    }
}
