use std::time::Duration;

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// Default values for configuration
// Maximum edge of a single image inside the atlas
pub const DEFAULT_MAX_TEXTURE_SIZE: u32 = 192;
// Maximum width of the atlas texture; 3072 still works on phones & tablets
pub const DEFAULT_MAX_CANVAS_WIDTH: u32 = 3072;
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;
pub const DEFAULT_BORDER_SIZE: f32 = 0.1;
pub const DEFAULT_BORDER_COLOR_ATTRIBUTE: &str = "borderColor";
pub const DEFAULT_COLOR_ATTRIBUTE: &str = "color";
pub const DEFAULT_COLOR: &str = "#000000";

/// Limits and scheduling for one atlas manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Largest edge, in pixels, an image may occupy in the atlas
    pub max_texture_size: u32,
    /// Largest width, in pixels, of a row and therefore of the atlas
    pub max_canvas_width: u32,
    /// Frame interval used to coalesce load completions before a flush.
    /// `None` leaves flushing to the host via `flush_if_scheduled`.
    pub frame_interval_ms: Option<u64>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            max_texture_size: DEFAULT_MAX_TEXTURE_SIZE,
            max_canvas_width: DEFAULT_MAX_CANVAS_WIDTH,
            frame_interval_ms: Some(DEFAULT_FRAME_INTERVAL_MS),
        }
    }
}

impl AtlasConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_texture_size == 0 {
            return Err(ConfigError::InvalidMaxTextureSize);
        }
        if self.max_canvas_width == 0 {
            return Err(ConfigError::InvalidMaxCanvasWidth);
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval_ms.map(Duration::from_millis)
    }
}

/// How the node color interacts with the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingMode {
    /// The node color fills the disc behind the image.
    #[default]
    Background,
    /// Opaque image pixels are tinted with the color attribute (pictograms).
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderSizeMode {
    /// Fraction of the node radius
    #[default]
    Relative,
    /// Absolute pixels
    Pixels,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderColor {
    Value(String),
    Attribute {
        name: String,
        #[serde(default)]
        default: Option<String>,
    },
    Transparent,
}

impl BorderColor {
    fn kind(&self) -> &'static str {
        match self {
            BorderColor::Value(_) => "value",
            BorderColor::Attribute { .. } => "attribute",
            BorderColor::Transparent => "transparent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderSize {
    Value {
        value: f32,
        #[serde(default)]
        mode: BorderSizeMode,
    },
    Attribute {
        name: String,
        default: f32,
        #[serde(default)]
        mode: BorderSizeMode,
    },
}

impl BorderSize {
    pub fn mode(&self) -> BorderSizeMode {
        match self {
            BorderSize::Value { mode, .. } | BorderSize::Attribute { mode, .. } => *mode,
        }
    }
}

/// Where the border gets composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderRendering {
    /// Computed per fragment by the node program
    #[default]
    Shader,
    /// Stroked into the atlas pixels when the image is packed
    Baked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorderOptions {
    // `color: {value: ...}` maps rather than `!value` tags
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub color: BorderColor,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub size: BorderSize,
    pub rendering: BorderRendering,
}

impl Default for BorderOptions {
    fn default() -> Self {
        Self {
            color: BorderColor::Attribute {
                name: DEFAULT_BORDER_COLOR_ATTRIBUTE.to_string(),
                default: None,
            },
            size: BorderSize::Value {
                value: DEFAULT_BORDER_SIZE,
                mode: BorderSizeMode::Relative,
            },
            rendering: BorderRendering::Shader,
        }
    }
}

/// Options of a node image program. Every program built from the same
/// options shares one atlas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeImageOptions {
    pub drawing_mode: DrawingMode,
    /// Always crop images to the disc
    pub keep_within_circle: bool,
    /// Fraction of the diameter left untextured at the edge
    pub padding: f32,
    /// Attribute used to tint pictograms in `color` mode
    pub color_attribute: String,
    /// Node transparency (0-1)
    pub alpha: f32,
    pub border: Option<BorderOptions>,
}

impl Default for NodeImageOptions {
    fn default() -> Self {
        Self {
            drawing_mode: DrawingMode::Background,
            keep_within_circle: true,
            padding: 0.0,
            color_attribute: DEFAULT_COLOR_ATTRIBUTE.to_string(),
            alpha: 1.0,
            border: None,
        }
    }
}

impl NodeImageOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.padding) {
            return Err(ConfigError::PaddingOutOfRange(self.padding));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::AlphaOutOfRange(self.alpha));
        }

        let Some(border) = &self.border else {
            return Ok(());
        };

        let size = match &border.size {
            BorderSize::Value { value, .. } => *value,
            BorderSize::Attribute { default, .. } => *default,
        };
        if !size.is_finite() || size < 0.0 {
            return Err(ConfigError::InvalidBorderSize(size));
        }

        match &border.color {
            BorderColor::Value(color) => {
                parse_color(color)?;
            }
            BorderColor::Attribute { default: Some(color), .. } => {
                parse_color(color)?;
            }
            BorderColor::Attribute { default: None, .. } | BorderColor::Transparent => {}
        }

        if border.rendering == BorderRendering::Baked {
            if border.color == BorderColor::Transparent {
                return Err(ConfigError::AmbiguousBorder(
                    "a transparent border leaves nothing to bake",
                ));
            }
            if matches!(border.size, BorderSize::Value { value, .. } if value == 0.0) {
                return Err(ConfigError::AmbiguousBorder(
                    "a zero-width border leaves nothing to bake",
                ));
            }
        }

        Ok(())
    }

    /// Border rendering in effect, if any border is configured.
    pub fn border_rendering(&self) -> Option<BorderRendering> {
        self.border.as_ref().map(|border| border.rendering)
    }

    /// Color bound to the program's fixed border color uniform. Asking for it
    /// when the color comes from an attribute is a programming error.
    pub fn fixed_border_color(&self) -> Result<Rgba<u8>, ConfigError> {
        match self.border.as_ref().map(|border| &border.color) {
            Some(BorderColor::Value(color)) => parse_color(color),
            Some(other) => Err(ConfigError::NoFixedBorderColor(other.kind())),
            None => Err(ConfigError::NoFixedBorderColor("absent")),
        }
    }
}

/// Parses any CSS color string (`"blue"`, `"#09f"`, `"rgba(0, 0, 0, 0.5)"`).
pub fn parse_color(color: &str) -> Result<Rgba<u8>, ConfigError> {
    use peniko::color::{parse_color as parse_css_color, Srgb};

    let parsed =
        parse_css_color(color.trim()).map_err(|_| ConfigError::InvalidColor(color.to_string()))?;
    let rgba = parsed.to_alpha_color::<Srgb>().to_rgba8();
    Ok(Rgba([rgba.r, rgba.g, rgba.b, rgba.a]))
}
