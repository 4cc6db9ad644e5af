//! [`UploadBackend`] over a real wgpu device.

use rustc_hash::FxHashMap;

use super::backend::{
    BufferHandle, TextureDesc, TextureHandle, TextureLevel, UploadBackend,
};
use super::dynamic_buffer::DynamicBuffer;
use super::render_context::RenderContext;
use super::texture::MirrorTexture;

/// Creates textures and vertex buffers on a wgpu device and copies
/// allocation bytes into them through the queue.
pub struct WgpuBackend {
    context: RenderContext,
    next_id: u32,
    textures: FxHashMap<TextureHandle, MirrorTexture>,
    buffers: FxHashMap<BufferHandle, DynamicBuffer>,
}

impl WgpuBackend {
    /// Backend over `context`.
    #[must_use]
    pub fn new(context: RenderContext) -> Self {
        Self {
            context,
            next_id: 0,
            textures: FxHashMap::default(),
            buffers: FxHashMap::default(),
        }
    }

    /// The device and queue in use.
    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    /// GPU texture behind `handle`.
    #[must_use]
    pub fn texture(&self, handle: TextureHandle) -> Option<&MirrorTexture> {
        self.textures.get(&handle)
    }

    /// GPU buffer behind `handle`.
    #[must_use]
    pub fn buffer(&self, handle: BufferHandle) -> Option<&wgpu::Buffer> {
        self.buffers.get(&handle).map(DynamicBuffer::buffer)
    }

    fn allocate_id(&mut self) -> Option<u32> {
        self.next_id = self.next_id.checked_add(1)?;
        Some(self.next_id)
    }
}

impl UploadBackend for WgpuBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Option<TextureHandle> {
        let texture = MirrorTexture::new(&self.context.device, desc)?;
        let handle = TextureHandle::new(self.allocate_id()?)?;
        let _ = self.textures.insert(handle, texture);
        Some(handle)
    }

    fn write_texture_level(
        &mut self,
        handle: TextureHandle,
        level: &TextureLevel<'_>,
    ) {
        let Some(texture) = self.textures.get(&handle) else {
            log::warn!("write to unknown texture {}", handle.get());
            return;
        };
        texture.write_level(
            &self.context.queue,
            level.face,
            level.level,
            level.width,
            level.height,
            level.data,
        );
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        if let Some(texture) = self.textures.remove(&handle) {
            texture.texture.destroy();
        }
    }

    fn create_buffer(&mut self, size: usize) -> Option<BufferHandle> {
        let max = self.context.device.limits().max_buffer_size;
        if size as u64 > max {
            log::warn!("buffer of {size} bytes exceeds device limit {max}");
            return None;
        }
        let handle = BufferHandle::new(self.allocate_id()?)?;
        let buffer = DynamicBuffer::new(
            &self.context.device,
            &format!("Allocation Buffer {}", handle.get()),
            size,
            wgpu::BufferUsages::VERTEX,
        );
        let _ = self.buffers.insert(handle, buffer);
        Some(handle)
    }

    fn write_buffer(&mut self, handle: BufferHandle, data: &[u8]) {
        let Some(buffer) = self.buffers.get_mut(&handle) else {
            log::warn!("write to unknown buffer {}", handle.get());
            return;
        };
        if buffer.write_bytes(&self.context.device, &self.context.queue, data) {
            log::debug!("buffer {} reallocated", handle.get());
        }
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&handle) {
            buffer.buffer().destroy();
        }
    }
}
