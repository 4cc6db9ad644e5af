//! 2×2 box-filter mip generation.
//!
//! The filter is chosen from the element layout once, up front. Layouts
//! without a filter produce [`AllocationError::UnsupportedFormat`] instead of
//! being skipped.

use crate::adapter::Adapter2D;
use crate::element::{DataType, Element};
use crate::error::AllocationError;
use crate::types::Type;

/// Downsampling strategy for one element layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MipFilter {
    /// 8-8-8-8 packed into 32 bits.
    Packed32,
    /// 5-6-5 packed into 16 bits.
    Packed16,
    /// Single 8-bit channel (luminance or alpha).
    Mono8,
}

impl MipFilter {
    /// Filter for `element`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::UnsupportedFormat`] for structures,
    /// reference-bearing elements and any layout other than four 8-bit
    /// channels, 5-6-5, or a single 8-bit channel.
    pub fn for_element(element: &Element) -> Result<Self, AllocationError> {
        let unsupported = || {
            AllocationError::UnsupportedFormat(format!(
                "no mip filter for {element}"
            ))
        };
        let c = element.as_component().ok_or_else(unsupported)?;
        match (element.size_bits(), c.data_type, c.vector_size) {
            (32, DataType::U8 | DataType::I8, 4) => Ok(Self::Packed32),
            (16, DataType::U565, _) => Ok(Self::Packed16),
            (8, DataType::U8 | DataType::I8, 1) => Ok(Self::Mono8),
            _ => Err(unsupported()),
        }
    }

    fn bytes(self) -> usize {
        match self {
            Self::Packed32 => 4,
            Self::Packed16 => 2,
            Self::Mono8 => 1,
        }
    }

    fn filter(self, a: &[u8], b: &[u8], c: &[u8], d: &[u8], out: &mut [u8]) {
        match self {
            Self::Packed32 => {
                let v = box_filter_8888(
                    bytemuck::pod_read_unaligned(a),
                    bytemuck::pod_read_unaligned(b),
                    bytemuck::pod_read_unaligned(c),
                    bytemuck::pod_read_unaligned(d),
                );
                out.copy_from_slice(bytemuck::bytes_of(&v));
            }
            Self::Packed16 => {
                let v = box_filter_565(
                    bytemuck::pod_read_unaligned(a),
                    bytemuck::pod_read_unaligned(b),
                    bytemuck::pod_read_unaligned(c),
                    bytemuck::pod_read_unaligned(d),
                );
                out.copy_from_slice(bytemuck::bytes_of(&v));
            }
            Self::Mono8 => {
                let sum = u32::from(a[0])
                    + u32::from(b[0])
                    + u32::from(c[0])
                    + u32::from(d[0]);
                out[0] = (sum / 4) as u8;
            }
        }
    }
}

/// Per-channel rounded mean of four 8-8-8-8 pixels.
#[must_use]
pub fn box_filter_8888(i1: u32, i2: u32, i3: u32, i4: u32) -> u32 {
    (0..4).fold(0, |acc, channel| {
        let shift = channel * 8;
        let sum = ((i1 >> shift) & 0xff)
            + ((i2 >> shift) & 0xff)
            + ((i3 >> shift) & 0xff)
            + ((i4 >> shift) & 0xff);
        acc | (((sum + 2) >> 2) << shift)
    })
}

/// Per-field rounded mean of four 5-6-5 pixels.
#[must_use]
pub fn box_filter_565(i1: u16, i2: u16, i3: u16, i4: u16) -> u16 {
    const FIELDS: [(u32, u32); 3] = [(0, 0x1f), (5, 0x3f), (11, 0x1f)];
    let px = [i1, i2, i3, i4].map(u32::from);
    let packed = FIELDS.iter().fold(0u32, |acc, &(shift, mask)| {
        let sum: u32 = px.iter().map(|p| (p >> shift) & mask).sum();
        acc | ((((sum + 2) >> 2) & mask) << shift)
    });
    packed as u16
}

/// Filter level `src` of `buf` into level `dst`.
///
/// `dst` must be a later level than `src` in the same buffer. The output
/// extents are taken from `dst`; source coordinates are clamped so a source
/// level with an extent of 1 on one axis is read without overrunning it.
pub fn generate_level(
    filter: MipFilter,
    buf: &mut [u8],
    src: &Adapter2D<'_>,
    dst: &Adapter2D<'_>,
) {
    debug_assert!(dst.base_offset() >= src.base_offset() + src.level_bytes());
    let bpp = filter.bytes();
    let (src_w, src_h) = (src.dim_x(), src.dim_y());
    let (dst_w, dst_h) = (dst.dim_x(), dst.dim_y());

    let (head, tail) = buf.split_at_mut(dst.base_offset());
    let input = src.level(head);
    let output = &mut tail[..dst.level_bytes()];

    let at = |x: usize, y: usize| {
        let start = (y.min(src_h - 1) * src_w + x.min(src_w - 1)) * bpp;
        &input[start..start + bpp]
    };

    for y in 0..dst_h {
        for x in 0..dst_w {
            let out_start = (y * dst_w + x) * bpp;
            filter.filter(
                at(x * 2, y * 2),
                at(x * 2 + 1, y * 2),
                at(x * 2, y * 2 + 1),
                at(x * 2 + 1, y * 2 + 1),
                &mut output[out_start..out_start + bpp],
            );
        }
    }
}

/// Regenerate every level above 0 of every face of `buf` laid out as `ty`.
///
/// # Errors
///
/// Returns [`AllocationError::UnsupportedFormat`] when the element has no
/// filter, and [`AllocationError::SizeMismatch`] when `buf` is not sized for
/// `ty`.
pub fn generate_chain(ty: &Type, buf: &mut [u8]) -> Result<(), AllocationError> {
    let filter = MipFilter::for_element(ty.element())?;
    if buf.len() != ty.total_bytes() {
        return Err(AllocationError::SizeMismatch {
            op: "generate_chain",
            expected: ty.total_bytes(),
            actual: buf.len(),
        });
    }

    let mut src = Adapter2D::new(ty);
    let mut dst = Adapter2D::new(ty);
    for face in 0..ty.face_count() {
        src.set_face(face);
        dst.set_face(face);
        for lod in 0..ty.lod_count().saturating_sub(1) {
            src.set_lod(lod);
            dst.set_lod(lod + 1);
            generate_level(filter, buf, &src, &dst);
        }
    }
    log::trace!(
        "generated {} mip levels x {} faces with {filter:?}",
        ty.lod_count(),
        ty.face_count()
    );
    Ok(())
}
