//! Typed, mipmap-aware buffer mirrored lazily to the GPU.
//!
//! An [`Allocation`] owns a zero-initialised byte buffer laid out by its
//! [`Type`]. Every write goes through the element's reference protocol:
//! handles in the incoming bytes are retained before handles in the bytes
//! being replaced are released, so overwriting a handle with itself never
//! drops it to zero.
//!
//! Mutations mark the GPU mirror stale and fan out to registered
//! [`Dependent`]s. Pushing to the GPU is a separate step, see
//! [`Allocation::sync_pending`].

mod bitmap;
mod dependents;
mod serialize;
mod upload;
mod usage;

#[cfg(test)]
mod fixtures;

use std::fmt;
use std::sync::{Arc, Weak};

pub use dependents::{Dependent, DependentRegistry};
pub use upload::SyncOutcome;
pub use usage::{MipmapControl, Usage};

use crate::adapter::Adapter2D;
use crate::context::{Context, ObjectTable};
use crate::element::Element;
use crate::error::AllocationError;
use crate::gpu::backend::{
    BufferHandle, TextureDesc, TextureHandle, TextureTarget,
};
use crate::types::Type;

/// What happens to the CPU buffer when the allocation is dropped.
pub enum ReleasePolicy {
    /// The buffer is freed with the allocation.
    OwnedFree,
    /// The buffer is handed to a callback that takes ownership of it.
    ExternallyManaged(Box<dyn FnOnce(Vec<u8>) + Send>),
}

impl fmt::Debug for ReleasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnedFree => f.write_str("OwnedFree"),
            Self::ExternallyManaged(_) => f.write_str("ExternallyManaged"),
        }
    }
}

/// GPU-side state of an allocation.
#[derive(Debug, Default)]
struct GpuMirror {
    texture: Option<(TextureHandle, TextureDesc)>,
    buffer_object: Option<BufferHandle>,
    upload_pending: bool,
    texture_lod_offset: usize,
    generate_mipmap_on_upload: bool,
}

/// CPU buffer shaped by a [`Type`], with a deferred GPU mirror.
#[derive(Debug)]
pub struct Allocation {
    name: String,
    ty: Arc<Type>,
    usage: Usage,
    mipmaps: MipmapControl,
    buffer: Vec<u8>,
    objects: Arc<ObjectTable>,
    gpu: GpuMirror,
    dependents: DependentRegistry,
    release: ReleasePolicy,
}

fn zeroed(len: usize) -> Result<Vec<u8>, AllocationError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| AllocationError::OutOfMemory { requested: len })?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Overwrite `dst` with `src`, retaining incoming handles before releasing
/// the outgoing ones.
fn replace_records(
    element: &Element,
    objects: &ObjectTable,
    dst: &mut [u8],
    src: &[u8],
) {
    element.inc_refs_strided(src, objects);
    element.dec_refs_strided(dst, objects);
    dst.copy_from_slice(src);
}

impl Allocation {
    /// Zero-filled allocation of `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::OutOfMemory`] if the buffer cannot be
    /// reserved.
    pub fn new(
        ctx: &Context,
        ty: Arc<Type>,
        mipmaps: MipmapControl,
        usage: Usage,
    ) -> Result<Self, AllocationError> {
        Self::with_policy(ctx, ty, mipmaps, usage, ReleasePolicy::OwnedFree)
    }

    /// Like [`Allocation::new`], but `release` receives the buffer when the
    /// allocation is dropped.
    ///
    /// # Errors
    ///
    /// See [`Allocation::new`].
    pub fn with_release(
        ctx: &Context,
        ty: Arc<Type>,
        mipmaps: MipmapControl,
        usage: Usage,
        release: impl FnOnce(Vec<u8>) + Send + 'static,
    ) -> Result<Self, AllocationError> {
        Self::with_policy(
            ctx,
            ty,
            mipmaps,
            usage,
            ReleasePolicy::ExternallyManaged(Box::new(release)),
        )
    }

    fn with_policy(
        ctx: &Context,
        ty: Arc<Type>,
        mipmaps: MipmapControl,
        usage: Usage,
        release: ReleasePolicy,
    ) -> Result<Self, AllocationError> {
        let buffer = zeroed(ty.total_bytes()).inspect_err(|e| ctx.report(e))?;
        log::trace!("allocated {} bytes for {ty}", buffer.len());
        Ok(Self {
            name: String::new(),
            ty,
            usage,
            mipmaps,
            buffer,
            objects: Arc::clone(ctx.objects()),
            gpu: GpuMirror::default(),
            dependents: DependentRegistry::new(),
            release,
        })
    }

    /// Debug name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the debug name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Current layout.
    #[must_use]
    pub fn ty(&self) -> &Arc<Type> {
        &self.ty
    }

    /// Usage flags. Scheduling an upload adds the matching GPU target.
    #[must_use]
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Mip control given at creation.
    #[must_use]
    pub fn mipmaps(&self) -> MipmapControl {
        self.mipmaps
    }

    /// The whole CPU buffer.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Size of the CPU buffer in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// `true` while CPU changes have not reached the GPU mirror.
    #[must_use]
    pub fn is_upload_pending(&self) -> bool {
        self.gpu.upload_pending
    }

    /// Texture mirror, once created.
    #[must_use]
    pub fn texture_handle(&self) -> Option<TextureHandle> {
        self.gpu.texture.as_ref().map(|(handle, _)| *handle)
    }

    /// Buffer-object mirror, once created.
    #[must_use]
    pub fn buffer_handle(&self) -> Option<BufferHandle> {
        self.gpu.buffer_object
    }

    /// First LOD pushed to the texture mirror.
    #[must_use]
    pub fn texture_lod_offset(&self) -> usize {
        self.gpu.texture_lod_offset
    }

    /// `true` if the next texture push builds the mip chain.
    #[must_use]
    pub fn generates_mipmap_on_upload(&self) -> bool {
        self.gpu.generate_mipmap_on_upload
    }

    /// Binding point of the GPU mirror, if the usage has one.
    #[must_use]
    pub fn texture_target(&self) -> Option<TextureTarget> {
        if self.usage.contains(Usage::GRAPHICS_TEXTURE) {
            Some(if self.ty.has_faces() {
                TextureTarget::CubeMap
            } else {
                TextureTarget::Texture2d
            })
        } else if self.usage.contains(Usage::GRAPHICS_VERTEX) {
            Some(TextureTarget::ArrayBuffer)
        } else {
            None
        }
    }

    /// Register a consumer to invalidate on every mutation. Adding the same
    /// consumer twice keeps a single entry.
    pub fn add_dependent(&mut self, dependent: Weak<dyn Dependent>) {
        if !self.dependents.add(dependent) {
            log::debug!("{}: dependent already registered", self.label());
        }
    }

    /// Unregister a consumer.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::DependentNotRegistered`] if `dependent`
    /// was not registered.
    pub fn remove_dependent(
        &mut self,
        ctx: &Context,
        dependent: &Weak<dyn Dependent>,
    ) -> Result<(), AllocationError> {
        self.dependents
            .remove(dependent)
            .inspect_err(|e| ctx.report(e))
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    /// Replace the whole buffer.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::SizeMismatch`] unless `data` is exactly the
    /// allocation size; the buffer is left untouched.
    pub fn write(
        &mut self,
        ctx: &Context,
        data: &[u8],
    ) -> Result<(), AllocationError> {
        self.check_size(ctx, "write", self.buffer.len(), data.len())?;
        replace_records(
            self.ty.element(),
            &self.objects,
            &mut self.buffer,
            data,
        );
        self.mark_mutated();
        Ok(())
    }

    /// Copy the whole buffer into `out`. Reference counts are not touched.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::SizeMismatch`] unless `out` is exactly the
    /// allocation size.
    pub fn read_all(
        &self,
        ctx: &Context,
        out: &mut [u8],
    ) -> Result<(), AllocationError> {
        self.check_size(ctx, "read_all", self.buffer.len(), out.len())?;
        out.copy_from_slice(&self.buffer);
        Ok(())
    }

    /// Replace `count` elements starting at element `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::SizeMismatch`] unless `data` holds exactly
    /// `count` elements, and [`AllocationError::BadValue`] if the range runs
    /// past the end of the buffer.
    pub fn write_range_1d(
        &mut self,
        ctx: &Context,
        offset: usize,
        count: usize,
        data: &[u8],
    ) -> Result<(), AllocationError> {
        let esize = self.ty.element_size_bytes();
        let expected = count.saturating_mul(esize);
        self.check_size(ctx, "write_range_1d", expected, data.len())?;

        let start = offset.saturating_mul(esize);
        let end = start.saturating_add(expected);
        if end > self.buffer.len() {
            return Err(self.report(
                ctx,
                AllocationError::bad_value(format!(
                    "range {offset}+{count} outside {} elements",
                    self.ty.element_count()
                )),
            ));
        }

        replace_records(
            self.ty.element(),
            &self.objects,
            &mut self.buffer[start..end],
            data,
        );
        self.mark_mutated();
        Ok(())
    }

    /// Replace a `w`×`h` rectangle of level 0, face 0.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::SizeMismatch`] unless `data` holds exactly
    /// `w * h` elements, and [`AllocationError::BadValue`] if the rectangle
    /// does not fit inside level 0.
    pub fn write_rect_2d(
        &mut self,
        ctx: &Context,
        xoff: usize,
        yoff: usize,
        w: usize,
        h: usize,
        data: &[u8],
    ) -> Result<(), AllocationError> {
        let esize = self.ty.element_size_bytes();
        let line = w.saturating_mul(esize);
        let expected = line.saturating_mul(h);
        self.check_size(ctx, "write_rect_2d", expected, data.len())?;

        let adapter = Adapter2D::new(&self.ty);
        if xoff.saturating_add(w) > adapter.dim_x()
            || yoff.saturating_add(h) > adapter.dim_y()
        {
            return Err(self.report(
                ctx,
                AllocationError::bad_value(format!(
                    "rect {w}x{h} at ({xoff}, {yoff}) outside {}x{}",
                    adapter.dim_x(),
                    adapter.dim_y()
                )),
            ));
        }
        if line == 0 {
            return Ok(());
        }

        let element = self.ty.element();
        for (row, src) in data.chunks_exact(line).enumerate() {
            let start = adapter.element_offset(xoff, yoff + row);
            replace_records(
                element,
                &self.objects,
                &mut self.buffer[start..start + line],
                src,
            );
        }
        self.mark_mutated();
        Ok(())
    }

    /// Replace one field of element `x` in level 0.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] for an out-of-range coordinate
    /// or field index, or when `data` is not the field's size.
    pub fn write_field_1d(
        &mut self,
        ctx: &Context,
        x: usize,
        field: usize,
        data: &[u8],
    ) -> Result<(), AllocationError> {
        self.write_field(x, 0, field, data)
            .inspect_err(|e| ctx.report(e))
    }

    /// Replace one field of element `(x, y)` in level 0, face 0.
    ///
    /// # Errors
    ///
    /// See [`Allocation::write_field_1d`].
    pub fn write_field_2d(
        &mut self,
        ctx: &Context,
        x: usize,
        y: usize,
        field: usize,
        data: &[u8],
    ) -> Result<(), AllocationError> {
        self.write_field(x, y, field, data)
            .inspect_err(|e| ctx.report(e))
    }

    fn write_field(
        &mut self,
        x: usize,
        y: usize,
        field_index: usize,
        data: &[u8],
    ) -> Result<(), AllocationError> {
        let adapter = Adapter2D::new(&self.ty);
        if x >= adapter.dim_x() || y >= adapter.dim_y() {
            return Err(AllocationError::bad_value(format!(
                "element ({x}, {y}) outside {}x{}",
                adapter.dim_x(),
                adapter.dim_y()
            )));
        }
        let element = self.ty.element();
        let field = element.field(field_index).ok_or_else(|| {
            AllocationError::bad_value(format!(
                "field {field_index} of {} fields",
                element.field_count()
            ))
        })?;
        if data.len() != field.size_bytes() {
            return Err(AllocationError::bad_value(format!(
                "field {} holds {} bytes, got {}",
                field.name(),
                field.size_bytes(),
                data.len()
            )));
        }

        let start = adapter.element_offset(x, y) + field.offset_bytes();
        replace_records(
            field.element(),
            &self.objects,
            &mut self.buffer[start..start + data.len()],
            data,
        );
        self.mark_mutated();
        Ok(())
    }

    /// 3D sub-region writes.
    ///
    /// # Errors
    ///
    /// Always returns [`AllocationError::NotImplemented`].
    pub fn write_3d(
        &mut self,
        ctx: &Context,
        _offset: [usize; 3],
        _extent: [usize; 3],
        _data: &[u8],
    ) -> Result<(), AllocationError> {
        Err(self.report(ctx, AllocationError::NotImplemented("write_3d")))
    }

    /// Change the X dimension of a 1D allocation.
    ///
    /// Elements past the new end release their references; new elements are
    /// zero. Resizing to the current size does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] for types that are not plain 1D
    /// or for a zero dimension, and [`AllocationError::OutOfMemory`] if
    /// growing fails. The allocation is unchanged on error.
    pub fn resize_1d(
        &mut self,
        ctx: &Context,
        dim_x: u32,
    ) -> Result<(), AllocationError> {
        self.resize_1d_inner(dim_x).inspect_err(|e| ctx.report(e))
    }

    fn resize_1d_inner(&mut self, dim_x: u32) -> Result<(), AllocationError> {
        if !self.ty.is_1d() || self.ty.has_mipmaps() || self.ty.has_faces() {
            return Err(AllocationError::bad_value(format!(
                "resize_1d on non-1D type {}",
                self.ty
            )));
        }
        if dim_x == self.ty.dim_x() {
            return Ok(());
        }

        let new_ty = self.ty.clone_and_resize_1d(dim_x)?;
        let new_size = new_ty.total_bytes();
        let old_size = self.buffer.len();
        if new_size < old_size {
            self.ty.element().dec_refs_strided(
                &self.buffer[new_size..],
                self.objects.as_ref(),
            );
            self.buffer.truncate(new_size);
        } else {
            self.buffer
                .try_reserve_exact(new_size - old_size)
                .map_err(|_| AllocationError::OutOfMemory {
                    requested: new_size,
                })?;
            self.buffer.resize(new_size, 0);
        }
        log::debug!(
            "{}: resized {} -> {dim_x} elements",
            self.label(),
            self.ty.dim_x()
        );
        self.ty = Arc::new(new_ty);
        self.mark_mutated();
        Ok(())
    }

    /// 2D resize.
    ///
    /// # Errors
    ///
    /// Always returns [`AllocationError::NotImplemented`].
    pub fn resize_2d(
        &mut self,
        ctx: &Context,
        _dim_x: u32,
        _dim_y: u32,
    ) -> Result<(), AllocationError> {
        Err(self.report(ctx, AllocationError::NotImplemented("resize_2d")))
    }

    /// Log the type and mirror state at debug level, each line prefixed
    /// with `prefix`.
    pub fn dump(&self, prefix: &str) {
        log::debug!("{prefix}allocation {:?}", self.name);
        log::debug!("{prefix}  type: {}", self.ty);
        log::debug!(
            "{prefix}  usage: {:?} mipmaps: {:?} release: {:?}",
            self.usage,
            self.mipmaps,
            self.release
        );
        log::debug!(
            "{prefix}  texture: {:?} buffer object: {:?} pending: {} lod \
             offset: {} gen mips: {}",
            self.texture_handle().map(TextureHandle::get),
            self.gpu.buffer_object.map(BufferHandle::get),
            self.gpu.upload_pending,
            self.gpu.texture_lod_offset,
            self.gpu.generate_mipmap_on_upload
        );
        log::debug!(
            "{prefix}  {} bytes, {} dependents",
            self.buffer.len(),
            self.dependents.len()
        );
    }

    fn label(&self) -> &str {
        if self.name.is_empty() {
            "<unnamed>"
        } else {
            &self.name
        }
    }

    fn mark_mutated(&mut self) {
        self.gpu.upload_pending = true;
        self.dependents.notify();
    }

    fn check_size(
        &self,
        ctx: &Context,
        op: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), AllocationError> {
        if expected == actual {
            return Ok(());
        }
        if ctx.options().debug.log_type_on_size_mismatch {
            log::error!("{op} on {}: type {}", self.label(), self.ty);
        }
        Err(self.report(
            ctx,
            AllocationError::SizeMismatch {
                op,
                expected,
                actual,
            },
        ))
    }

    fn report(&self, ctx: &Context, err: AllocationError) -> AllocationError {
        log::debug!("{}: {err}", self.label());
        ctx.report(&err);
        err
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.ty
            .element()
            .dec_refs_strided(&self.buffer, self.objects.as_ref());
        if self.gpu.texture.is_some() || self.gpu.buffer_object.is_some() {
            log::warn!(
                "{} dropped with live GPU objects; release_gpu_resources was \
                 not called",
                self.label()
            );
        }
        let buffer = std::mem::take(&mut self.buffer);
        match std::mem::replace(&mut self.release, ReleasePolicy::OwnedFree) {
            ReleasePolicy::OwnedFree => drop(buffer),
            ReleasePolicy::ExternallyManaged(release) => release(buffer),
        }
    }
}
