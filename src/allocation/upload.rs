//! Two-phase GPU mirroring: mark what is stale, then push on demand.

use super::{Allocation, Usage};
use crate::adapter::Adapter2D;
use crate::context::Context;
use crate::error::AllocationError;
use crate::gpu::backend::{TextureDesc, TextureLevel, UploadBackend};
use crate::mip;
use crate::types::Type;

/// Result of pushing an allocation to its GPU mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing was pending.
    Idle,
    /// Every requested mirror received the current bytes.
    Uploaded,
    /// A GPU object could not be created; nothing was written to it.
    Deferred,
}

impl Allocation {
    /// Schedule a texture push starting at `lod_offset` and add
    /// [`Usage::GRAPHICS_TEXTURE`] to the usage.
    ///
    /// `gen_mipmap` asks for the chain to be built during the push; it is
    /// ignored when the type already carries its own mip levels.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] if `lod_offset` is not a level
    /// of the type.
    pub fn mark_for_texture_upload(
        &mut self,
        ctx: &Context,
        gen_mipmap: bool,
        lod_offset: usize,
    ) -> Result<(), AllocationError> {
        if lod_offset >= self.ty.lod_count() {
            return Err(self.report(
                ctx,
                AllocationError::bad_value(format!(
                    "lod offset {lod_offset} of {} levels",
                    self.ty.lod_count()
                )),
            ));
        }
        self.gpu.generate_mipmap_on_upload =
            !self.ty.has_mipmaps() && gen_mipmap;
        self.gpu.texture_lod_offset = lod_offset;
        self.usage |= Usage::GRAPHICS_TEXTURE;
        self.gpu.upload_pending = true;
        Ok(())
    }

    /// Schedule a vertex-buffer push and add [`Usage::GRAPHICS_VERTEX`] to
    /// the usage.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] unless the type is 1D.
    pub fn mark_for_buffer_upload(
        &mut self,
        ctx: &Context,
    ) -> Result<(), AllocationError> {
        if !self.ty.is_1d() {
            return Err(self.report(ctx, self.buffer_not_1d()));
        }
        self.usage |= Usage::GRAPHICS_VERTEX;
        self.gpu.upload_pending = true;
        Ok(())
    }

    /// Flag the GPU mirror stale without touching the CPU data.
    pub fn mark_dirty(&mut self) {
        self.gpu.upload_pending = true;
    }

    /// Push to the GPU if anything changed since the last push.
    ///
    /// # Errors
    ///
    /// See [`Allocation::sync_all`].
    pub fn sync_pending(
        &mut self,
        ctx: &Context,
        backend: &mut dyn UploadBackend,
    ) -> Result<SyncOutcome, AllocationError> {
        if !self.gpu.upload_pending {
            return Ok(SyncOutcome::Idle);
        }
        self.sync_all(ctx, backend)
    }

    /// Push to every mirror the allocation has, whether or not it changed.
    ///
    /// GPU object creation failures are logged and reported as
    /// [`SyncOutcome::Deferred`]; the pending flag survives them when
    /// `upload.retry_failed_uploads` is set.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::UnsupportedFormat`] for a texture push of
    /// an element with no pixel format, and [`AllocationError::BadValue`]
    /// for a buffer push of a type that is not 1D. The pending flag is
    /// cleared in both cases.
    pub fn sync_all(
        &mut self,
        ctx: &Context,
        backend: &mut dyn UploadBackend,
    ) -> Result<SyncOutcome, AllocationError> {
        let to_texture = self.usage.contains(Usage::GRAPHICS_TEXTURE);
        let to_buffer = self.usage.contains(Usage::GRAPHICS_VERTEX);
        if !to_texture && !to_buffer {
            self.gpu.upload_pending = false;
            return Ok(SyncOutcome::Idle);
        }

        let pushed = self.push_mirrors(ctx, backend, to_texture, to_buffer);
        let outcome = match pushed {
            Ok(outcome) => outcome,
            Err(e) => {
                self.gpu.upload_pending = false;
                return Err(self.report(ctx, e));
            }
        };

        if outcome == SyncOutcome::Deferred {
            log::warn!("{}: upload deferred", self.label());
            if ctx.options().debug.dump_on_upload_failure {
                self.dump("  ");
            }
            self.gpu.upload_pending =
                ctx.options().upload.retry_failed_uploads;
        } else {
            self.gpu.upload_pending = false;
        }
        Ok(outcome)
    }

    /// Destroy the GPU mirrors. The next sync recreates them.
    pub fn release_gpu_resources(&mut self, backend: &mut dyn UploadBackend) {
        let mut released = false;
        if let Some((handle, _)) = self.gpu.texture.take() {
            backend.destroy_texture(handle);
            released = true;
        }
        if let Some(handle) = self.gpu.buffer_object.take() {
            backend.destroy_buffer(handle);
            released = true;
        }
        if released {
            log::debug!("{}: released GPU objects", self.label());
            self.gpu.upload_pending = true;
        }
    }

    fn buffer_not_1d(&self) -> AllocationError {
        AllocationError::bad_value(format!(
            "buffer upload needs a 1D type, got {}",
            self.ty
        ))
    }

    /// Level-0-derived mip chain for a type without stored levels.
    fn scratch_chain(&self) -> Option<(Type, Vec<u8>)> {
        let ty = match self.ty.with_mipmaps() {
            Ok(ty) => ty,
            Err(e) => {
                log::warn!(
                    "{}: uploading without mipmaps: {e}",
                    self.label()
                );
                return None;
            }
        };
        let mut scratch = vec![0; ty.total_bytes()];
        let mut src = Adapter2D::new(&self.ty);
        let mut dst = Adapter2D::new(&ty);
        for face in 0..ty.face_count() {
            src.set_face(face);
            dst.set_face(face);
            dst.level_mut(&mut scratch)
                .copy_from_slice(src.level(&self.buffer));
        }
        match mip::generate_chain(&ty, &mut scratch) {
            Ok(()) => Some((ty, scratch)),
            Err(e) => {
                log::warn!(
                    "{}: uploading without mipmaps: {e}",
                    self.label()
                );
                None
            }
        }
    }

    fn push_mirrors(
        &mut self,
        ctx: &Context,
        backend: &mut dyn UploadBackend,
        to_texture: bool,
        to_buffer: bool,
    ) -> Result<SyncOutcome, AllocationError> {
        let mut outcome = SyncOutcome::Uploaded;
        if to_texture
            && self.push_texture(ctx, backend)? == SyncOutcome::Deferred
        {
            outcome = SyncOutcome::Deferred;
        }
        if to_buffer && self.push_buffer(backend)? == SyncOutcome::Deferred {
            outcome = SyncOutcome::Deferred;
        }
        Ok(outcome)
    }

    fn push_texture(
        &mut self,
        ctx: &Context,
        backend: &mut dyn UploadBackend,
    ) -> Result<SyncOutcome, AllocationError> {
        let format = self.ty.element().pixel_format().ok_or_else(|| {
            AllocationError::UnsupportedFormat(format!(
                "{} has no texture format",
                self.ty.element()
            ))
        })?;

        let scratch = if self.gpu.generate_mipmap_on_upload
            && ctx.options().upload.generate_mipmaps
        {
            self.scratch_chain()
        } else {
            None
        };
        let (ty, bytes, first_lod) = match &scratch {
            Some((ty, bytes)) => (ty, bytes.as_slice(), 0),
            None => (
                &*self.ty,
                self.buffer.as_slice(),
                self.gpu.texture_lod_offset,
            ),
        };
        let Some(base) = ty.lod(first_lod) else {
            return Err(AllocationError::bad_value(format!(
                "lod offset {first_lod} of {} levels",
                ty.lod_count()
            )));
        };
        let desc = TextureDesc {
            label: self.label().to_owned(),
            format,
            width: base.extent_x() as u32,
            height: base.extent_y() as u32,
            levels: (ty.lod_count() - first_lod) as u32,
            cube: ty.has_faces(),
        };

        let handle = match self.gpu.texture.take() {
            Some((handle, old)) if old == desc => handle,
            stale => {
                if let Some((handle, _)) = stale {
                    backend.destroy_texture(handle);
                }
                let Some(handle) = backend.create_texture(&desc) else {
                    log::warn!(
                        "{}: could not create {}x{} texture",
                        desc.label,
                        desc.width,
                        desc.height
                    );
                    return Ok(SyncOutcome::Deferred);
                };
                handle
            }
        };

        let mut adapter = Adapter2D::new(ty);
        for face in 0..ty.face_count() {
            adapter.set_face(face);
            for lod in first_lod..ty.lod_count() {
                adapter.set_lod(lod);
                backend.write_texture_level(
                    handle,
                    &TextureLevel {
                        face: face as u32,
                        level: (lod - first_lod) as u32,
                        width: adapter.dim_x() as u32,
                        height: adapter.dim_y() as u32,
                        data: adapter.level(bytes),
                    },
                );
            }
        }
        log::debug!(
            "{}: uploaded {} level(s) x {} face(s)",
            desc.label,
            desc.levels,
            ty.face_count()
        );
        self.gpu.texture = Some((handle, desc));
        Ok(SyncOutcome::Uploaded)
    }

    fn push_buffer(
        &mut self,
        backend: &mut dyn UploadBackend,
    ) -> Result<SyncOutcome, AllocationError> {
        if !self.ty.is_1d() {
            return Err(self.buffer_not_1d());
        }
        let handle = match self.gpu.buffer_object {
            Some(handle) => handle,
            None => {
                let Some(handle) = backend.create_buffer(self.buffer.len())
                else {
                    log::warn!(
                        "{}: could not create {} byte buffer",
                        self.label(),
                        self.buffer.len()
                    );
                    return Ok(SyncOutcome::Deferred);
                };
                self.gpu.buffer_object = Some(handle);
                handle
            }
        };
        backend.write_buffer(handle, &self.buffer);
        Ok(SyncOutcome::Uploaded)
    }
}
