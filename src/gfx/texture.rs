use cgmath::Vector2;
use image::GenericImageView;

use crate::error::{GiError, GiResult};

pub struct Texture {
    pub handle: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: Vector2<u32>,
}

impl Texture {
    /// All textures the dispatcher touches use this format. It is both a valid
    /// WGSL storage-texture format and filterable, so the same format serves
    /// the G-buffer inputs, the kernel's write target and the blit pass.
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: Option<&str>,
    ) -> GiResult<Self> {
        let img = image::load_from_memory(bytes)?;
        Self::from_image(device, queue, &img, label)
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
    ) -> GiResult<Self> {
        let rgba = img.to_rgba8();
        Self::from_pixels(device, queue, rgba.as_raw(), img.dimensions(), label)
    }

    /// Uploads tightly packed RGBA8 pixel data as a sampled 2D texture.
    pub fn from_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pixels: &[u8],
        (width, height): (u32, u32),
        label: Option<&str>,
    ) -> GiResult<Self> {
        if width == 0 || height == 0 {
            return Err(GiError::configuration(format!(
                "texture dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(GiError::configuration(format!(
                "expected {} bytes of RGBA8 data for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let handle = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &handle,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        Ok(Self::wrap(device, handle, width, height))
    }

    /// Creates the presentation surface the compute kernel writes into:
    /// random-access write enabled, sampleable by the blit pass, and copyable
    /// so tests can read it back.
    pub fn output_target(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        label: Option<&str>,
    ) -> GiResult<Self> {
        if width == 0 || height == 0 {
            return Err(GiError::resource(format!(
                "output target dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }

        let handle = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        Ok(Self::wrap(device, handle, width, height))
    }

    fn wrap(device: &wgpu::Device, handle: wgpu::Texture, width: u32, height: u32) -> Self {
        let view = handle.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            handle,
            view,
            sampler,
            size: Vector2::new(width, height),
        }
    }
}
