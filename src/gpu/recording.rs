//! In-memory backend that records every request.
//!
//! Used for dry runs without a GPU and to observe upload behaviour in tests.

use rustc_hash::FxHashMap;

use super::backend::{
    BufferHandle, TextureDesc, TextureHandle, TextureLevel, UploadBackend,
};

/// A texture write as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedLevel {
    /// Target texture.
    pub handle: TextureHandle,
    /// Cube face.
    pub face: u32,
    /// Mip level.
    pub level: u32,
    /// Level width.
    pub width: u32,
    /// Level height.
    pub height: u32,
    /// Copied bytes.
    pub data: Vec<u8>,
}

/// Backend that keeps textures and buffers in host memory.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    fail_creation: bool,
    /// Descriptors of live textures.
    pub textures: FxHashMap<TextureHandle, TextureDesc>,
    /// Contents of live buffer objects.
    pub buffers: FxHashMap<BufferHandle, Vec<u8>>,
    /// Every texture write, in order.
    pub levels: Vec<RecordedLevel>,
    /// Number of `write_buffer` calls.
    pub buffer_writes: usize,
}

impl RecordingBackend {
    /// Empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `create_*` call fail (or succeed again).
    pub fn set_fail_creation(&mut self, fail: bool) {
        self.fail_creation = fail;
    }

    /// Number of texture and buffer writes so far.
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.levels.len() + self.buffer_writes
    }

    fn allocate_id(&mut self) -> Option<u32> {
        if self.fail_creation {
            return None;
        }
        self.next_id += 1;
        Some(self.next_id)
    }
}

impl UploadBackend for RecordingBackend {
    fn create_texture(&mut self, desc: &TextureDesc) -> Option<TextureHandle> {
        let handle = TextureHandle::new(self.allocate_id()?)?;
        let _ = self.textures.insert(handle, desc.clone());
        Some(handle)
    }

    fn write_texture_level(
        &mut self,
        handle: TextureHandle,
        level: &TextureLevel<'_>,
    ) {
        self.levels.push(RecordedLevel {
            handle,
            face: level.face,
            level: level.level,
            width: level.width,
            height: level.height,
            data: level.data.to_vec(),
        });
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        let _ = self.textures.remove(&handle);
    }

    fn create_buffer(&mut self, size: usize) -> Option<BufferHandle> {
        let handle = BufferHandle::new(self.allocate_id()?)?;
        let _ = self.buffers.insert(handle, vec![0; size]);
        Some(handle)
    }

    fn write_buffer(&mut self, handle: BufferHandle, data: &[u8]) {
        self.buffer_writes += 1;
        if let Some(contents) = self.buffers.get_mut(&handle) {
            contents.clear();
            contents.extend_from_slice(data);
        }
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        let _ = self.buffers.remove(&handle);
    }
}
