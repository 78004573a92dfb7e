//! Shared texture atlas for rendering graph nodes as textured discs.
//!
//! Images are fetched and decoded in the background, packed into one growing
//! RGBA raster with a shelf packer, and every [`AtlasConsumer`] sharing the
//! atlas is told when it changed.

pub mod atlas;
pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod settings;
pub mod utils;

#[cfg(feature = "wgpu")]
pub mod gpu;

pub use atlas::{
    AtlasListener, AtlasManager, AtlasRect, AtlasRegistry, AtlasStats, AtlasTable, AtlasTexture,
    BakedBorder, BorderWidth, ImageFetcher, ImageKey, ImageRecord, ImageRequest, SourceFetcher,
    SubscriptionId,
};
pub use config::{AtlasConfig, NodeImageOptions};
pub use consumer::{AtlasConsumer, NodeImage};
pub use error::{AtlasError, ConfigError, LoadError, SettingsError};
pub use settings::AtlasSettings;

#[cfg(feature = "wgpu")]
pub use gpu::GpuAtlasTexture;
