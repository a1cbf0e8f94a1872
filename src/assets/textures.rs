//! Texture loading utilities

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::path::Path;

/// Load a texture from a file path
pub fn load_texture(path: impl AsRef<Path>) -> Result<TextureData> {
    let path = path.as_ref();
    log::info!("Loading texture: {:?}", path);

    let img = image::open(path).with_context(|| format!("Failed to load texture: {:?}", path))?;

    Ok(TextureData::from_image(img))
}

/// Raw texture data ready for GPU upload
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: wgpu::TextureFormat,
}

impl TextureData {
    pub fn from_image(img: DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        let rgba = img.to_rgba8();

        Self {
            width,
            height,
            data: rgba.into_raw(),
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }

    /// 1x1 texture of a single color, used as placeholder
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            data: rgba.to_vec(),
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }

    /// Create GPU texture from this data
    pub fn create_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
    ) -> wgpu::Texture {
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &self.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.width),
                rows_per_image: Some(self.height),
            },
            size,
        );

        texture
    }
}

/// Load an equirectangular HDR environment map
pub fn load_hdr(path: impl AsRef<Path>) -> Result<HdrData> {
    use image::ImageDecoder;

    let path = path.as_ref();
    log::info!("Loading HDR: {:?}", path);

    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open HDR: {:?}", path))?;
    let reader = std::io::BufReader::new(file);

    let decoder =
        image::codecs::hdr::HdrDecoder::new(reader).with_context(|| "Failed to decode HDR")?;

    let (width, height) = decoder.dimensions();

    let mut buf = vec![0u8; decoder.total_bytes() as usize];
    decoder
        .read_image(&mut buf)
        .with_context(|| "Failed to read HDR pixels")?;

    // Decoder writes Rgb32F; the byte buffer has no f32 alignment guarantee
    let data: Vec<f32> = buf
        .chunks_exact(12)
        .flat_map(|rgb| {
            let channel = |i: usize| f32::from_ne_bytes([rgb[i], rgb[i + 1], rgb[i + 2], rgb[i + 3]]);
            [channel(0), channel(4), channel(8), 1.0]
        })
        .collect();

    Ok(HdrData {
        width,
        height,
        data,
    })
}

/// HDR texture data (RGBA f32)
#[derive(Debug, Clone)]
pub struct HdrData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl HdrData {
    /// Mean radiance over all texels, used as image-based ambient term
    pub fn average_radiance(&self) -> [f32; 3] {
        let texels = (self.width as usize * self.height as usize).max(1);
        let mut sum = [0.0f64; 3];
        for rgba in self.data.chunks_exact(4) {
            sum[0] += rgba[0] as f64;
            sum[1] += rgba[1] as f64;
            sum[2] += rgba[2] as f64;
        }
        [
            (sum[0] / texels as f64) as f32,
            (sum[1] / texels as f64) as f32,
            (sum[2] / texels as f64) as f32,
        ]
    }

    /// Create GPU texture from HDR data
    pub fn create_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
    ) -> wgpu::Texture {
        let size = wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&self.data),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(16 * self.width), // 4 floats * 4 bytes
                rows_per_image: Some(self.height),
            },
            size,
        );

        texture
    }
}

/// Sampler for surface textures (wraps around longitude)
pub fn create_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Sampler for the float environment map; Rgba32Float is not filterable on all adapters
pub fn create_nearest_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Nearest,
        min_filter: wgpu::FilterMode::Nearest,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_texture_layout() {
        let tex = TextureData::solid([10, 20, 30, 255]);
        assert_eq!((tex.width, tex.height), (1, 1));
        assert_eq!(tex.data, vec![10, 20, 30, 255]);
    }

    #[test]
    fn test_from_image_converts_to_rgba() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(2, 3, image::Rgb([1, 2, 3])));
        let tex = TextureData::from_image(img);
        assert_eq!((tex.width, tex.height), (2, 3));
        assert_eq!(tex.data.len(), 2 * 3 * 4);
        assert_eq!(&tex.data[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn test_average_radiance() {
        let hdr = HdrData {
            width: 2,
            height: 1,
            data: vec![1.0, 0.0, 2.0, 1.0, 3.0, 0.0, 0.0, 1.0],
        };
        let avg = hdr.average_radiance();
        assert!((avg[0] - 2.0).abs() < 1e-6);
        assert!(avg[1].abs() < 1e-6);
        assert!((avg[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_files_fail() {
        assert!(load_texture("/nonexistent/mercurymap.jpg").is_err());
        assert!(load_hdr("/nonexistent/space.hdr").is_err());
    }
}
