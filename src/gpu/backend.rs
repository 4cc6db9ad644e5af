//! The sink allocations push their bytes into.
//!
//! An [`UploadBackend`] creates GPU objects and copies CPU bytes into them.
//! It knows nothing about element layout beyond the [`PixelFormat`] and
//! extents carried by each request.

use std::num::NonZeroU32;

use crate::element::PixelFormat;

/// Opaque texture object id. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(NonZeroU32);

/// Opaque buffer object id. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(NonZeroU32);

impl TextureHandle {
    /// Wrap a raw id; `None` for 0.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Raw id.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl BufferHandle {
    /// Wrap a raw id; `None` for 0.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Raw id.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// Binding point an allocation's GPU mirror is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureTarget {
    /// Plain 2D texture.
    Texture2d,
    /// Six-face cube map.
    CubeMap,
    /// Vertex/array buffer.
    ArrayBuffer,
}

/// Parameters for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDesc {
    /// Debug label.
    pub label: String,
    /// Pixel layout of the uploaded bytes.
    pub format: PixelFormat,
    /// Width of level 0.
    pub width: u32,
    /// Height of level 0.
    pub height: u32,
    /// Number of mip levels that will be written.
    pub levels: u32,
    /// Six faces instead of one.
    pub cube: bool,
}

/// One face/level of pixel data.
#[derive(Debug, Clone, Copy)]
pub struct TextureLevel<'a> {
    /// Cube face (0 for 2D textures).
    pub face: u32,
    /// Mip level within the texture.
    pub level: u32,
    /// Width of this level.
    pub width: u32,
    /// Height of this level.
    pub height: u32,
    /// Tightly packed rows in the texture's [`PixelFormat`].
    pub data: &'a [u8],
}

/// GPU-side object creation and transfer.
pub trait UploadBackend {
    /// Create a texture. `None` when the device cannot create it.
    fn create_texture(&mut self, desc: &TextureDesc) -> Option<TextureHandle>;

    /// Copy one face/level into a texture.
    fn write_texture_level(
        &mut self,
        handle: TextureHandle,
        level: &TextureLevel<'_>,
    );

    /// Release a texture.
    fn destroy_texture(&mut self, handle: TextureHandle);

    /// Create a buffer object able to hold at least `size` bytes.
    fn create_buffer(&mut self, size: usize) -> Option<BufferHandle>;

    /// Replace the contents of a buffer object.
    fn write_buffer(&mut self, handle: BufferHandle, data: &[u8]);

    /// Release a buffer object.
    fn destroy_buffer(&mut self, handle: BufferHandle);
}
