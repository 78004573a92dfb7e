//! Uploads atlas snapshots into a wgpu texture.

use log::debug;

use crate::atlas::AtlasTexture;

/// GPU copy of an atlas. The texture is recreated whenever the atlas grows.
///
/// The texture has a single mip level: no mip chain is generated after an
/// upload, so nodes drawn smaller than their packed size sample the base
/// level directly. Use a linear minification filter on the sampler.
#[derive(Debug, Default)]
pub struct GpuAtlasTexture {
    texture: Option<wgpu::Texture>,
    dimensions: (u32, u32),
}

impl GpuAtlasTexture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.texture.as_ref()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// Writes `atlas` into the texture. Returns `true` when a new texture
    /// was created; bind groups referencing the old one must be rebuilt.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, atlas: &AtlasTexture) -> bool {
        let (width, height) = atlas.dimensions();
        let recreated = self.texture.is_none() || self.dimensions != (width, height);
        if recreated {
            debug!("Creating atlas texture {}x{}", width, height);
            self.texture = Some(create_atlas_texture(device, width, height));
            self.dimensions = (width, height);
        }

        if let Some(texture) = &self.texture {
            upload_rgba(queue, texture, atlas.as_raw(), width, height);
        }
        recreated
    }
}

fn create_atlas_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("NodeImageAtlas"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn upload_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, bytes: &[u8], width: u32, height: u32) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: None,
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
