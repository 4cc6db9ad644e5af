//! Strided 2D view over one face and LOD of an allocation buffer.
//!
//! The adapter never owns or copies memory; it only turns `(x, y)` into a
//! byte offset using the level's LOD-scaled extents. It does not validate
//! coordinates against those extents: an out-of-range `(x, y)` lands in a
//! neighbouring row, level or face, or panics at the end of the buffer.
//! Callers bound-check before addressing.

use crate::types::Type;

/// Addressing strategy for one face/LOD of a [`Type`].
#[derive(Debug, Clone, Copy)]
pub struct Adapter2D<'a> {
    ty: &'a Type,
    face: usize,
    lod: usize,
}

impl<'a> Adapter2D<'a> {
    /// View of face 0, LOD 0.
    #[must_use]
    pub fn new(ty: &'a Type) -> Self {
        Self { ty, face: 0, lod: 0 }
    }

    /// Select the cube face (0 for non-cube types).
    pub fn set_face(&mut self, face: usize) {
        debug_assert!(face < self.ty.face_count());
        self.face = face;
    }

    /// Select the mip level.
    pub fn set_lod(&mut self, lod: usize) {
        debug_assert!(lod < self.ty.lod_count());
        self.lod = lod;
    }

    /// Selected face.
    #[must_use]
    pub fn face(&self) -> usize {
        self.face
    }

    /// Selected LOD.
    #[must_use]
    pub fn lod(&self) -> usize {
        self.lod
    }

    /// Type being addressed.
    #[must_use]
    pub fn base_type(&self) -> &'a Type {
        self.ty
    }

    /// Width of the selected level in elements.
    #[must_use]
    pub fn dim_x(&self) -> usize {
        self.ty.lod(self.lod).map_or(0, |l| l.extent_x())
    }

    /// Height of the selected level in elements.
    #[must_use]
    pub fn dim_y(&self) -> usize {
        self.ty.lod(self.lod).map_or(0, |l| l.extent_y())
    }

    /// Bytes of one row of the selected level.
    #[must_use]
    pub fn row_bytes(&self) -> usize {
        self.dim_x() * self.ty.element_size_bytes()
    }

    /// Bytes of the selected level (first Z slice).
    #[must_use]
    pub fn level_bytes(&self) -> usize {
        self.row_bytes() * self.dim_y()
    }

    /// Byte offset of element `(0, 0)` of the selected face and level.
    #[must_use]
    pub fn base_offset(&self) -> usize {
        let lod_offset = self.ty.lod(self.lod).map_or(0, |l| l.offset);
        self.face * self.ty.face_bytes() + lod_offset
    }

    /// Byte offset of element `(x, y)`.
    #[must_use]
    pub fn element_offset(&self, x: usize, y: usize) -> usize {
        self.base_offset()
            + (y * self.dim_x() + x) * self.ty.element_size_bytes()
    }

    /// Bytes of element `(x, y)`.
    #[must_use]
    pub fn element<'b>(&self, buf: &'b [u8], x: usize, y: usize) -> &'b [u8] {
        let start = self.element_offset(x, y);
        &buf[start..start + self.ty.element_size_bytes()]
    }

    /// Mutable bytes of element `(x, y)`.
    pub fn element_mut<'b>(
        &self,
        buf: &'b mut [u8],
        x: usize,
        y: usize,
    ) -> &'b mut [u8] {
        let start = self.element_offset(x, y);
        &mut buf[start..start + self.ty.element_size_bytes()]
    }

    /// Bytes of row `y`.
    #[must_use]
    pub fn row<'b>(&self, buf: &'b [u8], y: usize) -> &'b [u8] {
        let start = self.element_offset(0, y);
        &buf[start..start + self.row_bytes()]
    }

    /// Bytes of the whole selected level.
    #[must_use]
    pub fn level<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        let start = self.base_offset();
        &buf[start..start + self.level_bytes()]
    }

    /// Mutable bytes of the whole selected level.
    pub fn level_mut<'b>(&self, buf: &'b mut [u8]) -> &'b mut [u8] {
        let start = self.base_offset();
        &mut buf[start..start + self.level_bytes()]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::element::Element;

    #[test]
    fn addresses_row_major_within_level() {
        let ty = Type::new_2d(Arc::new(Element::rgba_8888()), 4, 4, true)
            .unwrap();
        let mut adapt = Adapter2D::new(&ty);
        assert_eq!(adapt.element_offset(1, 2), (2 * 4 + 1) * 4);

        adapt.set_lod(1);
        assert_eq!(adapt.dim_x(), 2);
        assert_eq!(adapt.dim_y(), 2);
        assert_eq!(adapt.base_offset(), 64);
        assert_eq!(adapt.element_offset(1, 1), 64 + 3 * 4);
    }

    #[test]
    fn cube_faces_are_face_major() {
        let ty = Type::new_cube(Arc::new(Element::a_8()), 2, true).unwrap();
        // 2x2 + 1x1 per face
        assert_eq!(ty.face_bytes(), 5);
        let mut adapt = Adapter2D::new(&ty);
        adapt.set_face(3);
        adapt.set_lod(1);
        assert_eq!(adapt.base_offset(), 3 * 5 + 4);
    }

    #[test]
    fn level_slices_match_extents() {
        let ty = Type::new_2d(Arc::new(Element::l_8()), 4, 2, true).unwrap();
        let buf: Vec<u8> = (0..ty.total_bytes() as u8).collect();
        let mut adapt = Adapter2D::new(&ty);
        assert_eq!(adapt.row(&buf, 1), &[4, 5, 6, 7]);
        adapt.set_lod(1);
        assert_eq!(adapt.level(&buf), &[8, 9]);
        assert_eq!(adapt.element(&buf, 1, 0), &[9]);
    }

    #[test]
    fn one_dimensional_types_are_single_rows() {
        let ty = Type::new_1d(Arc::new(Element::rgba_8888()), 5).unwrap();
        let adapt = Adapter2D::new(&ty);
        assert_eq!(adapt.dim_x(), 5);
        assert_eq!(adapt.dim_y(), 1);
        assert_eq!(adapt.level_bytes(), 20);
    }
}
