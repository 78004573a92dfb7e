//! EXIF-aware decoding of fetched image bytes.
//!
//! Photographs from cameras and phones often store their rotation as EXIF
//! metadata instead of rotating the pixels; the atlas needs the upright
//! image since it crops to the centered square.

use std::io::Cursor;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};

#[allow(unused_imports)]
use log::{debug, warn};

use crate::error::LoadError;

/// Decodes `bytes` to RGBA8 with the EXIF orientation applied.
///
/// Falls back to a plain decode when the format does not expose the decoder
/// interface.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, LoadError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;

    let image = match reader.into_decoder() {
        Ok(mut decoder) => {
            let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
            let mut image = DynamicImage::from_decoder(decoder)?;
            if orientation != Orientation::NoTransforms {
                debug!("Applying EXIF orientation {:?}", orientation);
                image.apply_orientation(orientation);
            }
            image
        }
        Err(e) => {
            warn!("Decoder creation failed, falling back to simple decode: {}", e);
            ImageReader::new(Cursor::new(bytes))
                .with_guessed_format()?
                .decode()?
        }
    };

    Ok(image.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_png() {
        let source = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let decoded = decode_rgba(&png_bytes(&source)).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        assert!(decode_rgba(b"definitely not an image").is_err());
    }
}
