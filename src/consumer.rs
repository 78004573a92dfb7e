use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::Rgba;
#[allow(unused_imports)]
use log::{debug, info, warn, error};

use crate::atlas::{
    AtlasListener, AtlasManager, AtlasTable, AtlasTexture, BakedBorder, BorderWidth, ImageKey,
    ImageRequest, SubscriptionId,
};
use crate::config::{BorderColor, BorderRendering, BorderSize, BorderSizeMode, NodeImageOptions};
use crate::error::ConfigError;

/// Image attributes of one node, as handed over by the host renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeImage {
    pub image: Option<String>,
    pub size: f32,
    pub border_color: Option<String>,
    pub border_size: Option<f32>,
}

impl NodeImage {
    pub fn new(image: impl Into<String>, size: f32) -> Self {
        Self {
            image: Some(image.into()),
            size,
            ..Self::default()
        }
    }
}

/// A rendering program's view of a shared atlas.
///
/// Holds a snapshot of the rectangle table and texture, marked stale when
/// the manager flushes. The subscription is removed on drop.
pub struct AtlasConsumer {
    manager: Arc<AtlasManager>,
    options: NodeImageOptions,
    subscription: SubscriptionId,
    stale: Arc<AtomicBool>,
    atlas: AtlasTable,
    texture: AtlasTexture,
}

impl std::fmt::Debug for AtlasConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasConsumer")
            .field("subscription", &self.subscription)
            .field("images", &self.atlas.len())
            .field("texture", &self.texture.dimensions())
            .finish()
    }
}

impl AtlasConsumer {
    /// `on_change` runs after the consumer is marked stale, typically to
    /// request a redraw from the host.
    pub fn new(
        manager: Arc<AtlasManager>,
        options: NodeImageOptions,
        on_change: Option<Arc<dyn AtlasListener>>,
    ) -> Result<Self, ConfigError> {
        options.validate()?;

        let stale = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stale);
        let subscription = manager.subscribe(Arc::new(move || {
            flag.store(true, Ordering::Release);
            if let Some(on_change) = &on_change {
                on_change.notify();
            }
        }));

        let atlas = manager.atlas();
        let texture = manager.texture();
        Ok(Self {
            manager,
            options,
            subscription,
            stale,
            atlas,
            texture,
        })
    }

    pub fn options(&self) -> &NodeImageOptions {
        &self.options
    }

    pub fn manager(&self) -> &Arc<AtlasManager> {
        &self.manager
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Re-reads the atlas after a notification. Returns `true` when the
    /// texture has to be uploaded again.
    pub fn refresh(&mut self) -> bool {
        if !self.stale.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.atlas = self.manager.atlas();
        self.texture = self.manager.texture();
        debug!(
            "Consumer {:?} refreshed: {} images, texture {:?}",
            self.subscription,
            self.atlas.len(),
            self.texture.dimensions()
        );
        true
    }

    pub fn atlas(&self) -> &AtlasTable {
        &self.atlas
    }

    pub fn texture(&self) -> &AtlasTexture {
        &self.texture
    }

    /// Value of the program's fixed border color uniform.
    pub fn fixed_border_color(&self) -> Result<Rgba<u8>, ConfigError> {
        self.options.fixed_border_color()
    }

    /// Texture rectangle of the node's image, normalized to the cached
    /// texture. Zeros while the image is loading, failed or absent; an
    /// unknown image is registered on the way.
    pub fn texture_coords(&self, node: &NodeImage) -> [f32; 4] {
        let Some(request) = self.image_request(node) else {
            return [0.0; 4];
        };

        match self.atlas.get(&request.key) {
            Some(rect) => {
                let (width, height) = self.texture.dimensions();
                rect.normalized(width, height)
            }
            None => {
                self.manager.register_image(request);
                [0.0; 4]
            }
        }
    }

    /// Key under which the node's image is stored.
    pub fn image_key(&self, node: &NodeImage) -> Option<ImageKey> {
        self.image_request(node).map(|request| request.key)
    }

    fn image_request(&self, node: &NodeImage) -> Option<ImageRequest> {
        let source = node.image.as_deref().filter(|source| !source.is_empty())?;
        Some(match self.baked_border(node) {
            Some(border) => ImageRequest::with_border(source, border),
            None => ImageRequest::new(source),
        })
    }

    fn baked_border(&self, node: &NodeImage) -> Option<BakedBorder> {
        let border = self.options.border.as_ref()?;
        if border.rendering != BorderRendering::Baked {
            return None;
        }

        let color = match &border.color {
            BorderColor::Value(color) => color.as_str(),
            BorderColor::Attribute { default, .. } => {
                node.border_color.as_deref().or(default.as_deref())?
            }
            BorderColor::Transparent => return None,
        };

        let (value, mode) = match &border.size {
            BorderSize::Value { value, mode } => (*value, *mode),
            BorderSize::Attribute { default, mode, .. } => {
                (node.border_size.unwrap_or(*default), *mode)
            }
        };
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        let width = match mode {
            BorderSizeMode::Relative => BorderWidth::Relative(value),
            BorderSizeMode::Pixels => BorderWidth::Pixels { width: value, node_size: node.size },
        };

        match BakedBorder::parse(color, width) {
            Ok(border) => Some(border),
            Err(e) => {
                warn!("Ignoring border for {:?}: {}", node.image, e);
                None
            }
        }
    }
}

impl Drop for AtlasConsumer {
    fn drop(&mut self) {
        self.manager.unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::testing::MemoryFetcher;
    use crate::atlas::{AtlasRect, ImageRecord};
    use crate::config::{AtlasConfig, BorderOptions};
    use std::sync::atomic::AtomicUsize;

    fn manager(fetcher: MemoryFetcher) -> Arc<AtlasManager> {
        let config = AtlasConfig {
            max_texture_size: 64,
            max_canvas_width: 128,
            frame_interval_ms: None,
        };
        AtlasManager::new(config, Arc::new(fetcher)).unwrap()
    }

    fn baked(color: BorderColor, size: BorderSize) -> NodeImageOptions {
        NodeImageOptions {
            border: Some(BorderOptions {
                color,
                size,
                rendering: BorderRendering::Baked,
            }),
            ..NodeImageOptions::default()
        }
    }

    #[tokio::test]
    async fn test_coords_resolve_after_flush() {
        let manager = manager(MemoryFetcher::new().with_image("a.png", 64, 64, [255, 0, 0, 255]));
        let redraws = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&redraws);
        let mut consumer = AtlasConsumer::new(
            Arc::clone(&manager),
            NodeImageOptions::default(),
            Some(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        )
        .unwrap();

        let node = NodeImage::new("a.png", 10.0);
        assert_eq!(consumer.texture_coords(&node), [0.0; 4]);
        assert!(!consumer.refresh());

        manager.wait_idle().await;
        assert!(manager.flush_if_scheduled());
        assert!(consumer.is_stale());
        assert_eq!(redraws.load(Ordering::SeqCst), 1);

        assert!(consumer.refresh());
        assert!(!consumer.refresh());
        assert_eq!(consumer.texture().dimensions(), (64, 64));
        assert_eq!(consumer.texture_coords(&node), [0.0, 0.0, 1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_absent_image_keeps_zero_coords() {
        let manager = manager(MemoryFetcher::new());
        let consumer = AtlasConsumer::new(Arc::clone(&manager), NodeImageOptions::default(), None)
            .unwrap();

        assert_eq!(consumer.texture_coords(&NodeImage::default()), [0.0; 4]);
        assert_eq!(consumer.texture_coords(&NodeImage::new("", 10.0)), [0.0; 4]);
        assert_eq!(manager.stats().requested, 0);

        let node = NodeImage::new("missing.png", 10.0);
        consumer.texture_coords(&node);
        manager.wait_idle().await;
        assert!(!manager.flush_if_scheduled());
        assert_eq!(
            manager.record(&ImageKey::from("missing.png")),
            Some(ImageRecord::Error)
        );
        assert_eq!(consumer.texture_coords(&node), [0.0; 4]);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let manager = manager(MemoryFetcher::new());
        let consumer = AtlasConsumer::new(Arc::clone(&manager), NodeImageOptions::default(), None)
            .unwrap();
        assert_eq!(manager.subscriber_count(), 1);
        drop(consumer);
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_options_are_rejected() {
        let manager = manager(MemoryFetcher::new());
        let options = baked(
            BorderColor::Value("blue".to_string()),
            BorderSize::Value { value: 0.0, mode: BorderSizeMode::Relative },
        );
        let result = AtlasConsumer::new(Arc::clone(&manager), options, None);
        assert!(matches!(result, Err(ConfigError::AmbiguousBorder(_))));
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_baked_border_changes_key() {
        let fetcher = MemoryFetcher::new().with_image("a.png", 64, 64, [255, 255, 255, 255]);
        let manager = manager(fetcher);
        let plain = AtlasConsumer::new(Arc::clone(&manager), NodeImageOptions::default(), None)
            .unwrap();
        let bordered = AtlasConsumer::new(
            Arc::clone(&manager),
            baked(
                BorderColor::Attribute { name: "borderColor".to_string(), default: None },
                BorderSize::Value { value: 0.25, mode: BorderSizeMode::Relative },
            ),
            None,
        )
        .unwrap();

        let node = NodeImage {
            border_color: Some("blue".to_string()),
            ..NodeImage::new("a.png", 10.0)
        };
        assert_eq!(plain.image_key(&node), Some(ImageKey::from("a.png")));
        assert_eq!(bordered.image_key(&node), Some(ImageKey::from("a.pngblue0.25")));

        // Without a color there is nothing to bake
        let uncolored = NodeImage::new("a.png", 10.0);
        assert_eq!(bordered.image_key(&uncolored), Some(ImageKey::from("a.png")));

        plain.texture_coords(&node);
        manager.wait_idle().await;
        bordered.texture_coords(&node);
        manager.wait_idle().await;
        manager.flush_if_scheduled();

        let atlas = manager.atlas();
        assert_eq!(atlas[&ImageKey::from("a.png")], AtlasRect::new(0, 0, 64, 64));
        let rect = atlas[&ImageKey::from("a.pngblue0.25")];
        assert_eq!(rect, AtlasRect::new(64, 0, 64, 64));

        // The ring sits inside the tile edge, the center stays white
        let texture = manager.texture();
        let ring = texture.get_pixel(rect.x + 32, rect.y + 2);
        assert!(ring[2] > ring[0]);
        assert_eq!(*texture.get_pixel(rect.x + 32, rect.y + 32), Rgba([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn test_invalid_attribute_color_drops_border() {
        let manager = manager(MemoryFetcher::new());
        let consumer = AtlasConsumer::new(
            manager,
            baked(
                BorderColor::Attribute { name: "borderColor".to_string(), default: None },
                BorderSize::Attribute {
                    name: "borderSize".to_string(),
                    default: 2.0,
                    mode: BorderSizeMode::Pixels,
                },
            ),
            None,
        )
        .unwrap();

        let node = NodeImage {
            border_color: Some("not a color".to_string()),
            ..NodeImage::new("a.png", 10.0)
        };
        assert_eq!(consumer.image_key(&node), Some(ImageKey::from("a.png")));

        let node = NodeImage {
            border_color: Some("red".to_string()),
            border_size: Some(3.0),
            ..NodeImage::new("a.png", 10.0)
        };
        assert_eq!(consumer.image_key(&node), Some(ImageKey::from("a.pngred3@10")));
    }

    #[tokio::test]
    async fn test_fixed_border_color() {
        let manager = manager(MemoryFetcher::new());
        let consumer = AtlasConsumer::new(
            manager,
            baked(
                BorderColor::Value("#00ff00".to_string()),
                BorderSize::Value { value: 0.1, mode: BorderSizeMode::Relative },
            ),
            None,
        )
        .unwrap();
        assert_eq!(consumer.fixed_border_color(), Ok(Rgba([0, 255, 0, 255])));
    }
}
