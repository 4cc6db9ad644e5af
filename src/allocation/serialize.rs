//! Binary save/load of allocations.

use std::sync::Arc;

use super::{Allocation, MipmapControl, Usage};
use crate::context::Context;
use crate::error::{AllocationError, SerializationError};
use crate::stream::{ClassId, IStream, OStream};
use crate::types::Type;

impl Allocation {
    /// Append this allocation's record: class tag, name, type record, then
    /// the payload with its byte count.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Serialization`] if the name, a field
    /// count or the payload is too long for its `u32` length. `out` may hold
    /// a partial record in that case.
    pub fn serialize(&self, out: &mut OStream) -> Result<(), AllocationError> {
        out.add_u32(ClassId::Allocation.tag());
        out.add_string(&self.name)?;
        self.ty.serialize(out)?;
        out.add_len("payload", self.buffer.len())?;
        out.add_bytes(&self.buffer);
        Ok(())
    }

    /// Read an allocation written by [`Allocation::serialize`]. The payload
    /// is applied with [`Allocation::write`], so handles it holds are
    /// retained in the context's object table.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Serialization`] on a wrong class tag, a
    /// truncated stream, an invalid type record, or a payload whose size
    /// disagrees with the type. Nothing is created on error.
    pub fn deserialize(
        ctx: &Context,
        input: &mut IStream<'_>,
    ) -> Result<Self, AllocationError> {
        Self::load(ctx, input).inspect_err(|e| ctx.report(e))
    }

    fn load(
        ctx: &Context,
        input: &mut IStream<'_>,
    ) -> Result<Self, AllocationError> {
        input.expect_class(ClassId::Allocation)?;
        let name = input.load_string()?;
        let ty = Type::deserialize(input).map_err(|e| match e {
            AllocationError::Serialization(e) => e,
            other => SerializationError::InvalidRecord(other.to_string()),
        })?;

        let declared = input.load_u32()? as usize;
        if declared != ty.total_bytes() {
            return Err(SerializationError::PayloadSize {
                declared,
                expected: ty.total_bytes(),
            }
            .into());
        }
        let payload = input.load_bytes(declared)?;

        let mipmaps = if ty.has_mipmaps() {
            MipmapControl::Full
        } else {
            MipmapControl::None
        };
        let mut alloc = Self::new(ctx, Arc::new(ty), mipmaps, Usage::SCRIPT)?;
        alloc.write(ctx, payload)?;
        alloc.name = name;
        log::debug!("loaded {} ({} bytes)", alloc.label(), declared);
        Ok(alloc)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{handles, ref_1d};
    use super::*;
    use crate::element::Element;
    use crate::error::ErrorKind;

    fn l8_4x4(ctx: &Context) -> Allocation {
        let ty = Type::new_2d(Arc::new(Element::l_8()), 4, 4, false).unwrap();
        Allocation::new(ctx, Arc::new(ty), MipmapControl::None, Usage::SCRIPT)
            .unwrap()
    }

    #[test]
    fn payload_survives_a_round_trip() {
        let ctx = Context::default();
        let mut alloc = l8_4x4(&ctx);
        alloc.set_name("heightmap");
        let payload: Vec<u8> = (0..16).map(|i| i * 7 + 3).collect();
        alloc.write(&ctx, &payload).unwrap();

        let mut out = OStream::new();
        alloc.serialize(&mut out).unwrap();
        let mut input = IStream::new(out.as_bytes());
        let loaded = Allocation::deserialize(&ctx, &mut input).unwrap();

        let mut read = vec![0; 16];
        loaded.read_all(&ctx, &mut read).unwrap();
        assert_eq!(read, payload);
        assert_eq!(loaded.name(), "heightmap");
        assert_eq!(loaded.ty().as_ref(), alloc.ty().as_ref());
        assert!(input.is_empty());
    }

    #[test]
    fn loaded_handles_are_retained() {
        let ctx = Context::default();
        let mut alloc = ref_1d(&ctx, 2);
        alloc.write(&ctx, &handles(&[3, 4])).unwrap();
        let mut out = OStream::new();
        alloc.serialize(&mut out).unwrap();

        let loaded =
            Allocation::deserialize(&ctx, &mut IStream::new(out.as_bytes()))
                .unwrap();
        assert_eq!(ctx.objects().ref_count(3), 2);
        drop(loaded);
        assert_eq!(ctx.objects().ref_count(3), 1);
    }

    #[test]
    fn wrong_class_tag_is_rejected() {
        let ctx = Context::default();
        let mut out = OStream::new();
        l8_4x4(&ctx).ty().serialize(&mut out).unwrap();
        let err =
            Allocation::deserialize(&ctx, &mut IStream::new(out.as_bytes()))
                .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Serialization(SerializationError::WrongClass {
                expected: 4,
                found: 2
            })
        ));
        assert_eq!(ctx.last_error_kind(), Some(ErrorKind::Serialization));
    }

    #[test]
    fn payload_size_must_match_type() {
        let ctx = Context::default();
        let mut out = OStream::new();
        out.add_u32(ClassId::Allocation.tag());
        out.add_string("short").unwrap();
        l8_4x4(&ctx).ty().serialize(&mut out).unwrap();
        out.add_u32(15);
        out.add_bytes(&[0; 15]);
        let err =
            Allocation::deserialize(&ctx, &mut IStream::new(out.as_bytes()))
                .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Serialization(SerializationError::PayloadSize {
                declared: 15,
                expected: 16
            })
        ));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let ctx = Context::default();
        let mut out = OStream::new();
        l8_4x4(&ctx).serialize(&mut out).unwrap();
        let bytes = out.into_bytes();
        let err = Allocation::deserialize(
            &ctx,
            &mut IStream::new(&bytes[..bytes.len() - 1]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Serialization(SerializationError::Truncated {
                ..
            })
        ));
    }

    #[test]
    fn overflowing_dimensions_fail_to_load() {
        let ctx = Context::default();
        let mut out = OStream::new();
        out.add_u32(ClassId::Allocation.tag());
        out.add_string("huge").unwrap();
        out.add_u32(ClassId::Type.tag());
        Element::rgba_8888().serialize(&mut out).unwrap();
        for _ in 0..3 {
            out.add_u32(u32::MAX);
        }
        out.add_u8(0);
        out.add_u8(0);
        out.add_u32(16);
        out.add_bytes(&[0; 16]);

        let err =
            Allocation::deserialize(&ctx, &mut IStream::new(out.as_bytes()))
                .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Serialization(SerializationError::InvalidRecord(
                _
            ))
        ));
        assert_eq!(ctx.last_error_kind(), Some(ErrorKind::Serialization));
    }
}
