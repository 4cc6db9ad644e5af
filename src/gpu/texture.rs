//! wgpu texture mirror and pixel-format translation.
//!
//! wgpu has no packed 16-bit or 24-bit color formats, so those layouts are
//! widened to RGBA8 on the CPU right before the copy. Every other format is
//! uploaded as-is.

use std::borrow::Cow;

use crate::element::PixelFormat;
use crate::gpu::backend::TextureDesc;

/// wgpu format a [`PixelFormat`] is uploaded as.
#[must_use]
pub fn wgpu_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Rgba8888
        | PixelFormat::Rgb888
        | PixelFormat::Rgb565
        | PixelFormat::Rgba5551
        | PixelFormat::Rgba4444 => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::L8 | PixelFormat::A8 => wgpu::TextureFormat::R8Unorm,
        PixelFormat::La88 => wgpu::TextureFormat::Rg8Unorm,
        PixelFormat::Rgba32F => wgpu::TextureFormat::Rgba32Float,
    }
}

/// Bytes per pixel after [`expand_pixels`].
#[must_use]
pub fn upload_bytes_per_pixel(format: PixelFormat) -> u32 {
    match format {
        PixelFormat::L8 | PixelFormat::A8 => 1,
        PixelFormat::La88 => 2,
        PixelFormat::Rgba32F => 16,
        _ => 4,
    }
}

fn scale(v: u16, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    ((u32::from(v) * 255 + max / 2) / max) as u8
}

fn expand_packed(data: &[u8], unpack: impl Fn(u16) -> [u8; 4]) -> Vec<u8> {
    data.chunks_exact(2)
        .flat_map(|px| unpack(bytemuck::pod_read_unaligned(px)))
        .collect()
}

/// Convert tightly packed pixels of `format` into the layout of
/// [`wgpu_format`].
#[must_use]
pub fn expand_pixels(format: PixelFormat, data: &[u8]) -> Cow<'_, [u8]> {
    match format {
        PixelFormat::Rgb888 => Cow::Owned(
            data.chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 0xff])
                .collect(),
        ),
        PixelFormat::Rgb565 => Cow::Owned(expand_packed(data, |p| {
            [
                scale((p >> 11) & 0x1f, 5),
                scale((p >> 5) & 0x3f, 6),
                scale(p & 0x1f, 5),
                0xff,
            ]
        })),
        PixelFormat::Rgba5551 => Cow::Owned(expand_packed(data, |p| {
            [
                scale((p >> 11) & 0x1f, 5),
                scale((p >> 6) & 0x1f, 5),
                scale((p >> 1) & 0x1f, 5),
                if p & 1 == 1 { 0xff } else { 0 },
            ]
        })),
        PixelFormat::Rgba4444 => Cow::Owned(expand_packed(data, |p| {
            [
                scale((p >> 12) & 0xf, 4),
                scale((p >> 8) & 0xf, 4),
                scale((p >> 4) & 0xf, 4),
                scale(p & 0xf, 4),
            ]
        })),
        PixelFormat::Rgba8888
        | PixelFormat::L8
        | PixelFormat::A8
        | PixelFormat::La88
        | PixelFormat::Rgba32F => Cow::Borrowed(data),
    }
}

/// GPU texture backing an allocation, with the descriptor it was created
/// from.
pub struct MirrorTexture {
    /// The underlying GPU texture.
    pub texture: wgpu::Texture,
    /// Descriptor used at creation.
    pub desc: TextureDesc,
}

impl MirrorTexture {
    /// Create a sampled texture for `desc`. Returns `None` when the extents
    /// exceed the device limits.
    #[must_use]
    pub fn new(device: &wgpu::Device, desc: &TextureDesc) -> Option<Self> {
        let limits = device.limits();
        let max = if desc.cube {
            limits.max_texture_dimension_2d.min(limits.max_texture_array_layers)
        } else {
            limits.max_texture_dimension_2d
        };
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            log::warn!(
                "texture {} is {}x{}, device limit is {max}",
                desc.label,
                desc.width,
                desc.height
            );
            return None;
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: if desc.cube { 6 } else { 1 },
            },
            mip_level_count: desc.levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(desc.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Some(Self {
            texture,
            desc: desc.clone(),
        })
    }

    /// Copy one face/level. `data` is in [`TextureDesc::format`] layout.
    pub fn write_level(
        &self,
        queue: &wgpu::Queue,
        face: u32,
        level: u32,
        width: u32,
        height: u32,
        data: &[u8],
    ) {
        let pixels = expand_pixels(self.desc.format, data);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: level,
                origin: wgpu::Origin3d { x: 0, y: 0, z: face },
                aspect: wgpu::TextureAspect::All,
            },
            &pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(
                    width * upload_bytes_per_pixel(self.desc.format),
                ),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Default view; cube maps get a cube view.
    #[must_use]
    pub fn create_view(&self) -> wgpu::TextureView {
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(&self.desc.label),
            dimension: Some(if self.desc.cube {
                wgpu::TextureViewDimension::Cube
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb565_expands_to_rgba8() {
        let red: u16 = 0x1f << 11;
        let green: u16 = 0x3f << 5;
        let mut data = Vec::new();
        data.extend_from_slice(bytemuck::bytes_of(&red));
        data.extend_from_slice(bytemuck::bytes_of(&green));
        let out = expand_pixels(PixelFormat::Rgb565, &data);
        assert_eq!(&*out, &[255, 0, 0, 255, 0, 255, 0, 255]);
    }

    #[test]
    fn rgb888_gains_opaque_alpha() {
        let out = expand_pixels(PixelFormat::Rgb888, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&*out, &[1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn rgba4444_scales_nibbles() {
        let px: u16 = 0xf08f;
        let out = expand_pixels(PixelFormat::Rgba4444, bytemuck::bytes_of(&px));
        assert_eq!(&*out, &[255, 0, 136, 255]);
    }

    #[test]
    fn native_formats_are_borrowed() {
        let data = [9u8; 8];
        assert!(matches!(
            expand_pixels(PixelFormat::Rgba8888, &data),
            Cow::Borrowed(_)
        ));
        assert_eq!(wgpu_format(PixelFormat::A8), wgpu::TextureFormat::R8Unorm);
        assert_eq!(upload_bytes_per_pixel(PixelFormat::Rgb565), 4);
    }
}
