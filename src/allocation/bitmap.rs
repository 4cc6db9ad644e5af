//! Construction from and copies to tightly packed pixel data.
//!
//! A bitmap here is level 0 of one face, rows back to back with no padding.
//! Cube bitmaps are six such faces in order.

use std::sync::Arc;

use super::{replace_records, Allocation, MipmapControl, Usage};
use crate::adapter::Adapter2D;
use crate::context::Context;
use crate::error::AllocationError;
use crate::mip;
use crate::types::Type;

impl Allocation {
    /// New allocation whose level 0 is `data`.
    ///
    /// With [`MipmapControl::Full`] the rest of the chain is generated right
    /// away. A texture push is scheduled either way.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] for cube types,
    /// [`AllocationError::SizeMismatch`] unless `data` is exactly level 0,
    /// and the errors of [`Allocation::generate_mipmaps`].
    pub fn create_from_bitmap(
        ctx: &Context,
        ty: Arc<Type>,
        mipmaps: MipmapControl,
        data: &[u8],
        usage: Usage,
    ) -> Result<Self, AllocationError> {
        if ty.has_faces() {
            let err = AllocationError::bad_value(
                "cube types need create_cube_from_bitmap",
            );
            ctx.report(&err);
            return Err(err);
        }
        Self::from_faces(ctx, ty, mipmaps, data, usage)
    }

    /// New cube map from six consecutive square faces.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] unless `ty` is a cube type, and
    /// [`AllocationError::SizeMismatch`] unless `data` holds exactly six
    /// faces of level 0.
    pub fn create_cube_from_bitmap(
        ctx: &Context,
        ty: Arc<Type>,
        mipmaps: MipmapControl,
        data: &[u8],
        usage: Usage,
    ) -> Result<Self, AllocationError> {
        if !ty.has_faces() {
            let err = AllocationError::bad_value(format!(
                "create_cube_from_bitmap needs a cube type, got {ty}"
            ));
            ctx.report(&err);
            return Err(err);
        }
        Self::from_faces(ctx, ty, mipmaps, data, usage)
    }

    fn from_faces(
        ctx: &Context,
        ty: Arc<Type>,
        mipmaps: MipmapControl,
        data: &[u8],
        usage: Usage,
    ) -> Result<Self, AllocationError> {
        let mut alloc = Self::new(ctx, ty, mipmaps, usage)?;
        let face_bytes = alloc.bitmap_bytes();
        let expected = face_bytes * alloc.ty.face_count();
        alloc.check_size(ctx, "create_from_bitmap", expected, data.len())?;

        let element = alloc.ty.element();
        let mut adapter = Adapter2D::new(&alloc.ty);
        for (face, src) in data.chunks_exact(face_bytes).enumerate() {
            adapter.set_face(face);
            replace_records(
                element,
                &alloc.objects,
                adapter.level_mut(&mut alloc.buffer),
                src,
            );
        }
        if mipmaps == MipmapControl::Full {
            alloc.generate_mipmaps(ctx)?;
        }
        alloc.mark_for_texture_upload(ctx, false, 0)?;
        log::debug!(
            "created {} from {} face bitmap(s)",
            alloc.ty,
            data.len() / face_bytes.max(1)
        );
        Ok(alloc)
    }

    /// Replace level 0 of face 0 with `data`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::SizeMismatch`] unless `data` is
    /// `dim_x * dim_y * element_size` bytes.
    pub fn copy_from_bitmap(
        &mut self,
        ctx: &Context,
        data: &[u8],
    ) -> Result<(), AllocationError> {
        let expected = self.bitmap_bytes();
        self.check_size(ctx, "copy_from_bitmap", expected, data.len())?;
        let adapter = Adapter2D::new(&self.ty);
        replace_records(
            self.ty.element(),
            &self.objects,
            adapter.level_mut(&mut self.buffer),
            data,
        );
        self.mark_mutated();
        Ok(())
    }

    /// Copy level 0 of face 0 into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::SizeMismatch`] unless `out` is
    /// `dim_x * dim_y * element_size` bytes.
    pub fn copy_to_bitmap(
        &self,
        ctx: &Context,
        out: &mut [u8],
    ) -> Result<(), AllocationError> {
        let expected = self.bitmap_bytes();
        self.check_size(ctx, "copy_to_bitmap", expected, out.len())?;
        out.copy_from_slice(Adapter2D::new(&self.ty).level(&self.buffer));
        Ok(())
    }

    /// Rebuild every level past 0 of every face from level 0.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::UnsupportedFormat`] when the element has
    /// no mip filter.
    pub fn generate_mipmaps(
        &mut self,
        ctx: &Context,
    ) -> Result<(), AllocationError> {
        if self.ty.lod_count() <= 1 {
            return Ok(());
        }
        mip::generate_chain(&self.ty, &mut self.buffer)
            .inspect_err(|e| ctx.report(e))?;
        self.mark_mutated();
        Ok(())
    }

    /// Bytes of level 0 of one face.
    fn bitmap_bytes(&self) -> usize {
        Adapter2D::new(&self.ty).level_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::error::ErrorKind;
    use crate::gpu::recording::RecordingBackend;

    fn rgba_type(size: u32, mips: bool) -> Arc<Type> {
        let el = Arc::new(Element::rgba_8888());
        Arc::new(Type::new_2d(el, size, size, mips).unwrap())
    }

    fn quadrants() -> Vec<u8> {
        let colors = [
            [255, 0, 0, 255],
            [0, 255, 0, 255],
            [0, 0, 255, 255],
            [255, 255, 255, 255],
        ];
        let mut data = Vec::new();
        for y in 0..4 {
            for x in 0..4 {
                data.extend_from_slice(&colors[(y / 2) * 2 + x / 2]);
            }
        }
        data
    }

    #[test]
    fn bitmap_with_full_mips_builds_chain() {
        let ctx = Context::default();
        let alloc = Allocation::create_from_bitmap(
            &ctx,
            rgba_type(4, true),
            MipmapControl::Full,
            &quadrants(),
            Usage::GRAPHICS_TEXTURE,
        )
        .unwrap();

        let mut lod1 = Adapter2D::new(alloc.ty());
        lod1.set_lod(1);
        assert_eq!(lod1.element(alloc.as_bytes(), 0, 0), &[255, 0, 0, 255]);
        assert_eq!(lod1.element(alloc.as_bytes(), 1, 1), &[255; 4]);
        let mut lod2 = Adapter2D::new(alloc.ty());
        lod2.set_lod(2);
        assert_eq!(lod2.element(alloc.as_bytes(), 0, 0), &[128, 128, 128, 255]);
        assert!(alloc.is_upload_pending());
    }

    #[test]
    fn bitmap_upload_sends_stored_chain() {
        let ctx = Context::default();
        let mut backend = RecordingBackend::new();
        let mut alloc = Allocation::create_from_bitmap(
            &ctx,
            rgba_type(4, true),
            MipmapControl::Full,
            &quadrants(),
            Usage::GRAPHICS_TEXTURE,
        )
        .unwrap();
        let _ = alloc.sync_pending(&ctx, &mut backend).unwrap();
        assert_eq!(backend.levels.len(), 3);
        alloc.release_gpu_resources(&mut backend);
    }

    #[test]
    fn bitmap_size_is_checked() {
        let ctx = Context::default();
        let err = Allocation::create_from_bitmap(
            &ctx,
            rgba_type(4, false),
            MipmapControl::None,
            &[0; 63],
            Usage::SCRIPT,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
    }

    #[test]
    fn cube_faces_land_in_order() {
        let ctx = Context::default();
        let ty = Arc::new(
            Type::new_cube(Arc::new(Element::a_8()), 2, false).unwrap(),
        );
        let data: Vec<u8> = (0..6u8).flat_map(|f| [f; 4]).collect();
        let alloc = Allocation::create_cube_from_bitmap(
            &ctx,
            Arc::clone(&ty),
            MipmapControl::None,
            &data,
            Usage::GRAPHICS_TEXTURE,
        )
        .unwrap();
        let mut adapter = Adapter2D::new(alloc.ty());
        for face in 0..6 {
            adapter.set_face(face);
            assert_eq!(adapter.level(alloc.as_bytes()), &[face as u8; 4]);
        }

        let err = Allocation::create_from_bitmap(
            &ctx,
            ty,
            MipmapControl::None,
            &data,
            Usage::SCRIPT,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadValue);
    }

    #[test]
    fn copy_to_and_from_bitmap_address_level_zero() {
        let ctx = Context::default();
        let mut alloc = Allocation::new(
            &ctx,
            rgba_type(2, true),
            MipmapControl::None,
            Usage::SCRIPT,
        )
        .unwrap();
        alloc.copy_from_bitmap(&ctx, &[8; 16]).unwrap();
        assert_eq!(&alloc.as_bytes()[..16], &[8; 16]);
        assert!(alloc.as_bytes()[16..].iter().all(|&b| b == 0));

        let mut out = [0; 16];
        alloc.copy_to_bitmap(&ctx, &mut out).unwrap();
        assert_eq!(out, [8; 16]);
        let err = alloc.copy_to_bitmap(&ctx, &mut [0; 20]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
    }

    #[test]
    fn unfilterable_element_cannot_generate() {
        let ctx = Context::default();
        let ty = Type::new_2d(Arc::new(Element::object_ref()), 2, 2, true)
            .unwrap();
        let mut alloc = Allocation::new(
            &ctx,
            Arc::new(ty),
            MipmapControl::Full,
            Usage::SCRIPT,
        )
        .unwrap();
        let err = alloc.generate_mipmaps(&ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }
}
