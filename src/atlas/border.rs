use image::{Rgba, RgbaImage};

use crate::config::parse_color;
use crate::error::ConfigError;

/// Width of a baked border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BorderWidth {
    /// Fraction of the node radius
    Relative(f32),
    /// Node-space width, scaled by the node size it was specified for
    Pixels { width: f32, node_size: f32 },
}

/// A circular border stroked into the packed pixels of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct BakedBorder {
    color_spec: String,
    color: Rgba<u8>,
    width: BorderWidth,
}

impl BakedBorder {
    pub fn parse(color: &str, width: BorderWidth) -> Result<Self, ConfigError> {
        Ok(Self {
            color_spec: color.to_string(),
            color: parse_color(color)?,
            width,
        })
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn width(&self) -> BorderWidth {
        self.width
    }

    /// Suffix appended to the image key so bordered variants never collide.
    pub fn signature(&self) -> String {
        match self.width {
            BorderWidth::Relative(width) => format!("{}{}", self.color_spec, width),
            BorderWidth::Pixels { width, node_size } => {
                format!("{}{}@{}", self.color_spec, width, node_size)
            }
        }
    }

    /// Stroke width in atlas pixels for an image packed at `size`.
    pub fn line_width(&self, size: u32) -> f32 {
        let size = size as f32;
        match self.width {
            BorderWidth::Relative(width) => size * width / 2.0,
            BorderWidth::Pixels { width, node_size } if node_size > 0.0 => {
                size / node_size * width / 2.0
            }
            BorderWidth::Pixels { .. } => 0.0,
        }
    }

    /// Strokes the border onto a square tile.
    pub fn stroke(&self, tile: &mut RgbaImage) {
        let size = tile.width().min(tile.height());
        stroke_circle(tile, self.color, self.line_width(size));
    }
}

/// Anti-aliased ring centred in the tile, inset so the stroke stays inside.
pub fn stroke_circle(tile: &mut RgbaImage, color: Rgba<u8>, line_width: f32) {
    if line_width <= 0.0 || color[3] == 0 {
        return;
    }

    let size = tile.width().min(tile.height()) as f32;
    let center = size / 2.0;
    let radius = size / 2.0 - line_width / 2.0;
    let half_width = line_width / 2.0;

    for (x, y, pixel) in tile.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - center;
        let dy = y as f32 + 0.5 - center;
        let distance = (dx * dx + dy * dy).sqrt();
        let coverage = (half_width + 0.5 - (distance - radius).abs()).clamp(0.0, 1.0);
        if coverage > 0.0 {
            blend_over(pixel, color, coverage);
        }
    }
}

fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>, coverage: f32) {
    let src_a = src[3] as f32 / 255.0 * coverage;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }

    for channel in 0..3 {
        let s = src[channel] as f32 / 255.0;
        let d = dst[channel] as f32 / 255.0;
        let out = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
        dst[channel] = (out * 255.0).round() as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}
