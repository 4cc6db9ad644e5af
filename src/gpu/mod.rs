//! GPU mirroring of allocations.
//!
//! Allocations only talk to the [`backend::UploadBackend`] trait. The wgpu
//! implementation creates real textures and buffers; the recording one keeps
//! everything in host memory.

/// Upload backend trait and the request types it consumes.
pub mod backend;
/// Growable GPU buffers with automatic reallocation.
pub mod dynamic_buffer;
/// Backend that records requests in memory.
pub mod recording;
/// Headless wgpu device and queue initialization.
pub mod render_context;
/// Texture creation and pixel-format translation for wgpu.
pub mod texture;
/// Upload backend over a wgpu device.
pub mod wgpu_backend;
