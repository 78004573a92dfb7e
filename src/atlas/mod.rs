//! Texture atlas: asynchronous image loading, shelf packing into one growing
//! raster, and change notification for every consumer sharing it.

pub mod border;
pub mod buffer;
pub mod decode;
pub mod fetch;
pub mod key;
pub mod loader;
pub mod manager;
pub mod packer;
pub mod record;
pub mod registry;
pub mod subscribers;

#[cfg(test)]
pub(crate) mod testing;

pub use border::{BakedBorder, BorderWidth};
pub use buffer::{AtlasBuffer, AtlasTexture};
pub use fetch::{ImageFetcher, SourceFetcher, SourceLocation};
pub use key::{ImageKey, ImageRequest};
pub use manager::{AtlasManager, AtlasStats, AtlasTable};
pub use packer::{Placement, ShelfPacker, WriteCursor};
pub use record::{AtlasRect, ImageRecord};
pub use registry::AtlasRegistry;
pub use subscribers::{AtlasListener, SubscriptionId};
