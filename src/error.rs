use thiserror::Error;

/// Failure to fetch or decode a single image. Recorded against the image key
/// and never surfaced to consumers.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read image source: {0}")]
    Io(#[from] std::io::Error),

    #[error("http request failed: {0}")]
    Http(String),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("unsupported image source: {0}")]
    UnsupportedSource(String),

    #[error("image task did not complete: {0}")]
    Task(String),
}

/// Structural problems in the configuration, raised at construction time.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_texture_size must be at least 1 pixel")]
    InvalidMaxTextureSize,

    #[error("max_canvas_width must be at least 1 pixel")]
    InvalidMaxCanvasWidth,

    #[error("padding must be within [0, 1), got {0}")]
    PaddingOutOfRange(f32),

    #[error("alpha must be within [0, 1], got {0}")]
    AlphaOutOfRange(f32),

    #[error("border size must be finite and non-negative, got {0}")]
    InvalidBorderSize(f32),

    #[error("baked border rendering requires a border to bake: {0}")]
    AmbiguousBorder(&'static str),

    #[error("border color is not a fixed value (configured as {0})")]
    NoFixedBorderColor(&'static str),

    #[error("unrecognized color {0:?}")]
    InvalidColor(String),
}

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("an atlas manager needs a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("atlas scope {0:?} is already bound to a different configuration")]
    ScopeConflict(String),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
