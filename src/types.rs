//! Allocation shape: an element repeated over X/Y/Z, optional cube faces and
//! an optional mip chain.
//!
//! Memory layout is face-major. Each face stores its LOD chain back to back,
//! level 0 first; every level is row-major with `x` fastest.

use std::fmt;
use std::sync::Arc;

use crate::element::Element;
use crate::error::{AllocationError, SerializationError};
use crate::stream::{ClassId, IStream, OStream};

/// Number of faces of a cube map.
pub const CUBE_FACES: usize = 6;

/// One level of a mip chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LodLevel {
    /// Declared X extent (at least 1).
    pub dim_x: u32,
    /// Y extent, `0` when the type is 1D.
    pub dim_y: u32,
    /// Z extent, `0` when the type has fewer than three dimensions.
    pub dim_z: u32,
    /// Byte offset of the level from the start of its face.
    pub offset: usize,
}

impl LodLevel {
    /// X extent, counting an absent dimension as 1.
    #[must_use]
    pub fn extent_x(&self) -> usize {
        self.dim_x.max(1) as usize
    }

    /// Y extent, counting an absent dimension as 1.
    #[must_use]
    pub fn extent_y(&self) -> usize {
        self.dim_y.max(1) as usize
    }

    /// Z extent, counting an absent dimension as 1.
    #[must_use]
    pub fn extent_z(&self) -> usize {
        self.dim_z.max(1) as usize
    }

    /// Number of elements in the level.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.extent_x() * self.extent_y() * self.extent_z()
    }

    /// Bytes of the level, `None` if that overflows `usize`.
    fn checked_bytes(&self, element_size: usize) -> Option<usize> {
        self.extent_x()
            .checked_mul(self.extent_y())?
            .checked_mul(self.extent_z())?
            .checked_mul(element_size)
    }
}

/// Immutable layout of a whole allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    element: Arc<Element>,
    dim_x: u32,
    dim_y: u32,
    dim_z: u32,
    mipmaps: bool,
    faces: bool,
    lods: Vec<LodLevel>,
    face_bytes: usize,
}

impl Type {
    /// Build a type and compute its LOD table.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] if `dim_x` is 0, Z is set without
    /// Y, a cube map is not square and 2D, the element is empty, or the
    /// total byte size overflows `usize`.
    pub fn new(
        element: Arc<Element>,
        dim_x: u32,
        dim_y: u32,
        dim_z: u32,
        mipmaps: bool,
        faces: bool,
    ) -> Result<Self, AllocationError> {
        if dim_x == 0 {
            return Err(AllocationError::bad_value("type dim_x must be > 0"));
        }
        if dim_z > 0 && dim_y == 0 {
            return Err(AllocationError::bad_value(
                "type dim_z requires dim_y",
            ));
        }
        if faces && (dim_x != dim_y || dim_z != 0) {
            return Err(AllocationError::bad_value(format!(
                "cube faces must be square 2D, got {dim_x}x{dim_y}x{dim_z}"
            )));
        }
        if element.size_bytes() == 0 {
            return Err(AllocationError::bad_value("element has no size"));
        }

        let mut ty = Self {
            element,
            dim_x,
            dim_y,
            dim_z,
            mipmaps,
            faces,
            lods: Vec::new(),
            face_bytes: 0,
        };
        ty.compute()?;
        Ok(ty)
    }

    /// 1D type of `dim_x` elements.
    ///
    /// # Errors
    ///
    /// See [`Type::new`].
    pub fn new_1d(
        element: Arc<Element>,
        dim_x: u32,
    ) -> Result<Self, AllocationError> {
        Self::new(element, dim_x, 0, 0, false, false)
    }

    /// 2D type, optionally with a full mip chain.
    ///
    /// # Errors
    ///
    /// See [`Type::new`].
    pub fn new_2d(
        element: Arc<Element>,
        dim_x: u32,
        dim_y: u32,
        mipmaps: bool,
    ) -> Result<Self, AllocationError> {
        Self::new(element, dim_x, dim_y, 0, mipmaps, false)
    }

    /// Square cube map with six faces.
    ///
    /// # Errors
    ///
    /// See [`Type::new`].
    pub fn new_cube(
        element: Arc<Element>,
        size: u32,
        mipmaps: bool,
    ) -> Result<Self, AllocationError> {
        Self::new(element, size, size, 0, mipmaps, true)
    }

    fn compute(&mut self) -> Result<(), AllocationError> {
        let esize = self.element.size_bytes();
        let (mut x, mut y, mut z) = (self.dim_x, self.dim_y, self.dim_z);
        let too_large = move || {
            AllocationError::bad_value(format!(
                "type {x}x{y}x{z} does not fit in memory"
            ))
        };
        let mut offset: usize = 0;
        self.lods.clear();
        loop {
            let level = LodLevel {
                dim_x: x,
                dim_y: y,
                dim_z: z,
                offset,
            };
            offset = level
                .checked_bytes(esize)
                .and_then(|bytes| offset.checked_add(bytes))
                .ok_or_else(too_large)?;
            self.lods.push(level);
            if !self.mipmaps || (x <= 1 && y <= 1 && z <= 1) {
                break;
            }
            if x > 1 {
                x >>= 1;
            }
            if y > 1 {
                y >>= 1;
            }
            if z > 1 {
                z >>= 1;
            }
        }
        let _ = offset.checked_mul(self.face_count()).ok_or_else(too_large)?;
        self.face_bytes = offset;
        Ok(())
    }

    /// Element layout.
    #[must_use]
    pub fn element(&self) -> &Arc<Element> {
        &self.element
    }

    /// Bytes per element.
    #[must_use]
    pub fn element_size_bytes(&self) -> usize {
        self.element.size_bytes()
    }

    /// Declared X dimension.
    #[must_use]
    pub fn dim_x(&self) -> u32 {
        self.dim_x
    }

    /// Declared Y dimension (`0` for 1D).
    #[must_use]
    pub fn dim_y(&self) -> u32 {
        self.dim_y
    }

    /// Declared Z dimension (`0` below 3D).
    #[must_use]
    pub fn dim_z(&self) -> u32 {
        self.dim_z
    }

    /// `true` if the type carries a mip chain.
    #[must_use]
    pub fn has_mipmaps(&self) -> bool {
        self.mipmaps
    }

    /// `true` for cube maps.
    #[must_use]
    pub fn has_faces(&self) -> bool {
        self.faces
    }

    /// `true` if only X is set.
    #[must_use]
    pub fn is_1d(&self) -> bool {
        self.dim_y == 0 && self.dim_z == 0
    }

    /// Number of faces stored (1, or 6 for cube maps).
    #[must_use]
    pub fn face_count(&self) -> usize {
        if self.faces {
            CUBE_FACES
        } else {
            1
        }
    }

    /// Number of mip levels (1 without mipmaps).
    #[must_use]
    pub fn lod_count(&self) -> usize {
        self.lods.len()
    }

    /// Level `lod` of the chain.
    #[must_use]
    pub fn lod(&self, lod: usize) -> Option<&LodLevel> {
        self.lods.get(lod)
    }

    /// Bytes of one face including every level.
    #[must_use]
    pub fn face_bytes(&self) -> usize {
        self.face_bytes
    }

    /// Total bytes of the allocation.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.face_bytes * self.face_count()
    }

    /// Total number of elements across faces and levels.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.total_bytes() / self.element_size_bytes()
    }

    /// Copy of this type with a different X dimension.
    ///
    /// # Errors
    ///
    /// See [`Type::new`].
    pub fn clone_and_resize_1d(
        &self,
        dim_x: u32,
    ) -> Result<Self, AllocationError> {
        Self::new(
            Arc::clone(&self.element),
            dim_x,
            self.dim_y,
            self.dim_z,
            self.mipmaps,
            self.faces,
        )
    }

    /// Copy of this type with different X and Y dimensions.
    ///
    /// # Errors
    ///
    /// See [`Type::new`].
    pub fn clone_and_resize_2d(
        &self,
        dim_x: u32,
        dim_y: u32,
    ) -> Result<Self, AllocationError> {
        Self::new(
            Arc::clone(&self.element),
            dim_x,
            dim_y,
            self.dim_z,
            self.mipmaps,
            self.faces,
        )
    }

    /// Same shape with a full mip chain.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] if the chain overflows `usize`.
    pub fn with_mipmaps(&self) -> Result<Self, AllocationError> {
        let mut ty = self.clone();
        ty.mipmaps = true;
        ty.compute()?;
        Ok(ty)
    }

    /// Append this type's record to `out`.
    ///
    /// # Errors
    ///
    /// See [`Element::serialize`].
    pub fn serialize(&self, out: &mut OStream) -> Result<(), SerializationError> {
        out.add_u32(ClassId::Type.tag());
        self.element.serialize(out)?;
        out.add_u32(self.dim_x);
        out.add_u32(self.dim_y);
        out.add_u32(self.dim_z);
        out.add_u8(u8::from(self.mipmaps));
        out.add_u8(u8::from(self.faces));
        Ok(())
    }

    /// Read a type record written by [`Type::serialize`].
    ///
    /// # Errors
    ///
    /// Fails on a wrong class tag, a truncated stream, or dimensions that do
    /// not form a valid type.
    pub fn deserialize(input: &mut IStream<'_>) -> Result<Self, AllocationError> {
        input.expect_class(ClassId::Type)?;
        let element = Element::deserialize(input)?;
        let dim_x = input.load_u32()?;
        let dim_y = input.load_u32()?;
        let dim_z = input.load_u32()?;
        let mipmaps = input.load_u8()? != 0;
        let faces = input.load_u8()? != 0;
        Self::new(Arc::new(element), dim_x, dim_y, dim_z, mipmaps, faces)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}x{}x{}] lods={} faces={} bytes={}",
            self.element,
            self.dim_x,
            self.dim_y,
            self.dim_z,
            self.lod_count(),
            self.face_count(),
            self.total_bytes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba() -> Arc<Element> {
        Arc::new(Element::rgba_8888())
    }

    #[test]
    fn plain_2d_has_single_level() {
        let ty = Type::new_2d(rgba(), 4, 4, false).unwrap();
        assert_eq!(ty.lod_count(), 1);
        assert_eq!(ty.total_bytes(), 64);
    }

    #[test]
    fn mip_chain_halves_until_one() {
        let ty = Type::new_2d(rgba(), 8, 2, true).unwrap();
        let dims: Vec<_> = (0..ty.lod_count())
            .map(|l| {
                let lod = ty.lod(l).unwrap();
                (lod.dim_x, lod.dim_y, lod.offset)
            })
            .collect();
        assert_eq!(dims, vec![(8, 2, 0), (4, 1, 64), (2, 1, 80), (1, 1, 88)]);
        assert_eq!(ty.face_bytes(), 92);
    }

    #[test]
    fn cube_repeats_chain_per_face() {
        let ty = Type::new_cube(rgba(), 4, true).unwrap();
        assert_eq!(ty.lod_count(), 3);
        assert_eq!(ty.face_bytes(), (16 + 4 + 1) * 4);
        assert_eq!(ty.total_bytes(), ty.face_bytes() * 6);
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        assert!(Type::new_1d(rgba(), 0).is_err());
        assert!(Type::new(rgba(), 4, 0, 2, false, false).is_err());
        assert!(Type::new(rgba(), 4, 2, 0, false, true).is_err());
    }

    #[test]
    fn resize_keeps_element_and_flags() {
        let ty = Type::new_1d(rgba(), 4).unwrap();
        let grown = ty.clone_and_resize_1d(8).unwrap();
        assert_eq!(grown.dim_x(), 8);
        assert_eq!(grown.total_bytes(), 32);
        assert_eq!(grown.element(), ty.element());
    }

    #[test]
    fn with_mipmaps_adds_levels() {
        let ty = Type::new_2d(rgba(), 4, 4, false).unwrap();
        let mipped = ty.with_mipmaps().unwrap();
        assert_eq!(mipped.lod_count(), 3);
        assert_eq!(mipped.lod(0), ty.lod(0));
    }

    #[test]
    fn record_reloads() {
        let ty = Type::new_cube(Arc::new(Element::a_8()), 8, true).unwrap();
        let mut out = OStream::new();
        ty.serialize(&mut out).unwrap();
        let mut input = IStream::new(out.as_bytes());
        assert_eq!(Type::deserialize(&mut input).unwrap(), ty);
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let max = u32::MAX;
        for mips in [false, true] {
            let err = Type::new(rgba(), max, max, max, mips, false).unwrap_err();
            assert!(matches!(err, AllocationError::BadValue(_)));
        }
    }

    #[test]
    fn oversized_record_fails_to_load() {
        let max = u32::MAX;
        let mut out = OStream::new();
        out.add_u32(ClassId::Type.tag());
        Element::rgba_8888().serialize(&mut out).unwrap();
        for dim in [max, max, max] {
            out.add_u32(dim);
        }
        out.add_u8(1);
        out.add_u8(0);
        assert!(Type::deserialize(&mut IStream::new(out.as_bytes())).is_err());
    }
}
