//! Per-record layout metadata.
//!
//! An [`Element`] is either a single component (a scalar, a short vector or a
//! packed pixel) or a structure of named sub-elements packed back to back.
//! Elements that contain [`DataType::ObjectRef`] fields carry references into
//! the context's object table; the allocation drives reference counting
//! through [`Element::inc_refs`] and [`Element::dec_refs`] before any of
//! those bytes are overwritten or released.

use std::fmt;
use std::sync::Arc;

use crate::error::{AllocationError, SerializationError};
use crate::stream::{ClassId, IStream, OStream};

/// Deepest structure nesting accepted when loading an element record.
pub const MAX_NESTING: usize = 32;

/// Receives reference-count changes for object handles stored in element
/// data. A handle of `0` is null and never reported.
pub trait ReferenceTracker {
    /// One more holder of `handle`.
    fn inc_ref(&self, handle: u32);
    /// One holder of `handle` released it.
    fn dec_ref(&self, handle: u32);
}

/// Scalar storage type of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Unsigned 8-bit.
    U8,
    /// Unsigned 16-bit.
    U16,
    /// Unsigned 32-bit.
    U32,
    /// Signed 8-bit.
    I8,
    /// Signed 16-bit.
    I16,
    /// Signed 32-bit.
    I32,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Packed 5-6-5 RGB.
    U565,
    /// Packed 5-5-5-1 RGBA.
    U5551,
    /// Packed 4-4-4-4 RGBA.
    U4444,
    /// 32-bit handle into the object table (0 = null).
    ObjectRef,
}

impl DataType {
    const ALL: [Self; 12] = [
        Self::U8,
        Self::U16,
        Self::U32,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::F32,
        Self::F64,
        Self::U565,
        Self::U5551,
        Self::U4444,
        Self::ObjectRef,
    ];

    /// Width of one value in bits.
    #[must_use]
    pub const fn size_bits(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 8,
            Self::U16 | Self::I16 | Self::U565 | Self::U5551 | Self::U4444 => {
                16
            }
            Self::U32 | Self::I32 | Self::F32 | Self::ObjectRef => 32,
            Self::F64 => 64,
        }
    }

    /// Packed types hold every channel in a single value.
    #[must_use]
    pub const fn is_packed(self) -> bool {
        matches!(self, Self::U565 | Self::U5551 | Self::U4444)
    }

    const fn packed_channels(self) -> Option<u8> {
        match self {
            Self::U565 => Some(3),
            Self::U5551 | Self::U4444 => Some(4),
            _ => None,
        }
    }

    fn code(self) -> u8 {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0) as u8
    }

    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

/// How the channels of a component are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// Plain data with no pixel meaning.
    User,
    /// Luminance.
    PixelL,
    /// Alpha.
    PixelA,
    /// Luminance + alpha.
    PixelLA,
    /// Red, green, blue.
    PixelRgb,
    /// Red, green, blue, alpha.
    PixelRgba,
}

impl DataKind {
    const ALL: [Self; 6] = [
        Self::User,
        Self::PixelL,
        Self::PixelA,
        Self::PixelLA,
        Self::PixelRgb,
        Self::PixelRgba,
    ];

    const fn channels(self) -> Option<u8> {
        match self {
            Self::User => None,
            Self::PixelL | Self::PixelA => Some(1),
            Self::PixelLA => Some(2),
            Self::PixelRgb => Some(3),
            Self::PixelRgba => Some(4),
        }
    }

    fn code(self) -> u8 {
        Self::ALL.iter().position(|k| *k == self).unwrap_or(0) as u8
    }

    fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

/// Texture formats an element can be uploaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-8-8-8 RGBA.
    Rgba8888,
    /// 8-8-8 RGB.
    Rgb888,
    /// Packed 5-6-5 RGB.
    Rgb565,
    /// Packed 5-5-5-1 RGBA.
    Rgba5551,
    /// Packed 4-4-4-4 RGBA.
    Rgba4444,
    /// 8-bit luminance.
    L8,
    /// 8-bit alpha.
    A8,
    /// 8-bit luminance + 8-bit alpha.
    La88,
    /// Four 32-bit floats.
    Rgba32F,
}

impl PixelFormat {
    /// Bytes of one pixel in CPU memory.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::L8 | Self::A8 => 1,
            Self::Rgb565 | Self::Rgba5551 | Self::Rgba4444 | Self::La88 => 2,
            Self::Rgb888 => 3,
            Self::Rgba8888 => 4,
            Self::Rgba32F => 16,
        }
    }
}

/// A single scalar, vector or packed-pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Component {
    /// Storage type of each value.
    pub data_type: DataType,
    /// Channel interpretation.
    pub kind: DataKind,
    /// Integer values map to `[0, 1]` when sampled.
    pub normalized: bool,
    /// Number of channels (1..=4).
    pub vector_size: u8,
}

impl Component {
    fn size_bytes(self) -> usize {
        if self.data_type.is_packed() {
            self.data_type.size_bits() / 8
        } else {
            self.data_type.size_bits() / 8 * self.vector_size as usize
        }
    }

    fn validate(self) -> Result<(), AllocationError> {
        if !(1..=4).contains(&self.vector_size) {
            return Err(AllocationError::bad_value(format!(
                "vector size {} outside 1..=4",
                self.vector_size
            )));
        }
        if self.data_type == DataType::ObjectRef
            && (self.vector_size != 1 || self.kind != DataKind::User)
        {
            return Err(AllocationError::bad_value(
                "object references must be single user values",
            ));
        }
        if let Some(channels) = self.data_type.packed_channels() {
            if self.kind.channels() != Some(channels)
                || self.vector_size != channels
            {
                return Err(AllocationError::bad_value(format!(
                    "{:?} requires a {channels}-channel pixel kind",
                    self.data_type
                )));
            }
        } else if let Some(channels) = self.kind.channels() {
            if channels != self.vector_size {
                return Err(AllocationError::bad_value(format!(
                    "{:?} has {channels} channels, vector size is {}",
                    self.kind, self.vector_size
                )));
            }
        }
        Ok(())
    }
}

/// Named sub-element at a fixed byte offset inside a structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    element: Arc<Element>,
    offset: usize,
}

impl Field {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layout of the field's value.
    #[must_use]
    pub fn element(&self) -> &Arc<Element> {
        &self.element
    }

    /// Byte offset from the start of the enclosing element.
    #[must_use]
    pub fn offset_bytes(&self) -> usize {
        self.offset
    }

    /// Size of the field in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.element.size_bytes()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Layout {
    Component(Component),
    Structure(Vec<Field>),
}

/// Byte layout of one record of an allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    layout: Layout,
    size_bytes: usize,
    has_references: bool,
}

impl Element {
    /// Single-component element.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] for a vector size outside 1..=4,
    /// a multi-channel object reference, or a pixel kind whose channel count
    /// disagrees with the data type.
    pub fn component(
        data_type: DataType,
        kind: DataKind,
        normalized: bool,
        vector_size: u8,
    ) -> Result<Self, AllocationError> {
        let component = Component {
            data_type,
            kind,
            normalized,
            vector_size,
        };
        component.validate()?;
        Ok(Self::from_component(component))
    }

    fn from_component(component: Component) -> Self {
        Self {
            size_bytes: component.size_bytes(),
            has_references: component.data_type == DataType::ObjectRef,
            layout: Layout::Component(component),
        }
    }

    /// Normalized 8-8-8-8 RGBA pixel.
    #[must_use]
    pub fn rgba_8888() -> Self {
        Self::from_component(Component {
            data_type: DataType::U8,
            kind: DataKind::PixelRgba,
            normalized: true,
            vector_size: 4,
        })
    }

    /// Normalized 8-8-8 RGB pixel.
    #[must_use]
    pub fn rgb_888() -> Self {
        Self::from_component(Component {
            data_type: DataType::U8,
            kind: DataKind::PixelRgb,
            normalized: true,
            vector_size: 3,
        })
    }

    /// Packed 5-6-5 RGB pixel.
    #[must_use]
    pub fn rgb_565() -> Self {
        Self::from_component(Component {
            data_type: DataType::U565,
            kind: DataKind::PixelRgb,
            normalized: true,
            vector_size: 3,
        })
    }

    /// 8-bit alpha pixel.
    #[must_use]
    pub fn a_8() -> Self {
        Self::from_component(Component {
            data_type: DataType::U8,
            kind: DataKind::PixelA,
            normalized: true,
            vector_size: 1,
        })
    }

    /// 8-bit luminance pixel.
    #[must_use]
    pub fn l_8() -> Self {
        Self::from_component(Component {
            data_type: DataType::U8,
            kind: DataKind::PixelL,
            normalized: true,
            vector_size: 1,
        })
    }

    /// Handle into the context's object table.
    #[must_use]
    pub fn object_ref() -> Self {
        Self::from_component(Component {
            data_type: DataType::ObjectRef,
            kind: DataKind::User,
            normalized: false,
            vector_size: 1,
        })
    }

    /// Plain user data vector.
    ///
    /// # Errors
    ///
    /// See [`Element::component`].
    pub fn user(
        data_type: DataType,
        vector_size: u8,
    ) -> Result<Self, AllocationError> {
        Self::component(data_type, DataKind::User, false, vector_size)
    }

    /// Structure of named fields, packed in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::BadValue`] when `fields` is empty.
    pub fn structure(
        fields: Vec<(String, Arc<Element>)>,
    ) -> Result<Self, AllocationError> {
        if fields.is_empty() {
            return Err(AllocationError::bad_value(
                "structure element needs at least one field",
            ));
        }
        let mut offset = 0;
        let mut has_references = false;
        let fields = fields
            .into_iter()
            .map(|(name, element)| {
                let field = Field {
                    name,
                    offset,
                    element,
                };
                offset += field.element.size_bytes;
                has_references |= field.element.has_references;
                field
            })
            .collect();
        Ok(Self {
            layout: Layout::Structure(fields),
            size_bytes: offset,
            has_references,
        })
    }

    /// Size of one record in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Size of one record in bits.
    #[must_use]
    pub fn size_bits(&self) -> usize {
        self.size_bytes * 8
    }

    /// `true` if any field holds an object reference.
    #[must_use]
    pub fn has_references(&self) -> bool {
        self.has_references
    }

    /// The component, for single-component elements.
    #[must_use]
    pub fn as_component(&self) -> Option<&Component> {
        match &self.layout {
            Layout::Component(c) => Some(c),
            Layout::Structure(_) => None,
        }
    }

    /// Number of named fields (0 for single-component elements).
    #[must_use]
    pub fn field_count(&self) -> usize {
        match &self.layout {
            Layout::Component(_) => 0,
            Layout::Structure(fields) => fields.len(),
        }
    }

    /// Field at `index`.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Field> {
        match &self.layout {
            Layout::Component(_) => None,
            Layout::Structure(fields) => fields.get(index),
        }
    }

    /// Byte offset of the field at `index`.
    #[must_use]
    pub fn field_offset_bytes(&self, index: usize) -> Option<usize> {
        self.field(index).map(Field::offset_bytes)
    }

    /// Texture format matching this layout, if it has one.
    #[must_use]
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        let c = self.as_component()?;
        match (c.data_type, c.kind) {
            (DataType::U8, DataKind::PixelRgba) => Some(PixelFormat::Rgba8888),
            (DataType::U8, DataKind::PixelRgb) => Some(PixelFormat::Rgb888),
            (DataType::U8, DataKind::PixelL) => Some(PixelFormat::L8),
            (DataType::U8, DataKind::PixelA) => Some(PixelFormat::A8),
            (DataType::U8, DataKind::PixelLA) => Some(PixelFormat::La88),
            (DataType::U565, DataKind::PixelRgb) => Some(PixelFormat::Rgb565),
            (DataType::U5551, DataKind::PixelRgba) => {
                Some(PixelFormat::Rgba5551)
            }
            (DataType::U4444, DataKind::PixelRgba) => {
                Some(PixelFormat::Rgba4444)
            }
            (DataType::F32, DataKind::PixelRgba) => Some(PixelFormat::Rgba32F),
            _ => None,
        }
    }

    fn visit_refs(&self, record: &[u8], visit: &mut dyn FnMut(u32)) {
        if !self.has_references {
            return;
        }
        match &self.layout {
            Layout::Component(c) => {
                if c.data_type != DataType::ObjectRef {
                    return;
                }
                if let [b0, b1, b2, b3, ..] = *record {
                    let handle = u32::from_le_bytes([b0, b1, b2, b3]);
                    if handle != 0 {
                        visit(handle);
                    }
                }
            }
            Layout::Structure(fields) => {
                for field in fields {
                    let end = field.offset + field.element.size_bytes;
                    if let Some(sub) = record.get(field.offset..end) {
                        field.element.visit_refs(sub, visit);
                    }
                }
            }
        }
    }

    /// Add a reference for every object handle in one record.
    pub fn inc_refs(&self, record: &[u8], tracker: &dyn ReferenceTracker) {
        self.visit_refs(record, &mut |h| tracker.inc_ref(h));
    }

    /// Drop a reference for every object handle in one record.
    pub fn dec_refs(&self, record: &[u8], tracker: &dyn ReferenceTracker) {
        self.visit_refs(record, &mut |h| tracker.dec_ref(h));
    }

    /// [`Element::inc_refs`] over consecutive records.
    pub fn inc_refs_strided(
        &self,
        records: &[u8],
        tracker: &dyn ReferenceTracker,
    ) {
        if !self.has_references || self.size_bytes == 0 {
            return;
        }
        for record in records.chunks_exact(self.size_bytes) {
            self.inc_refs(record, tracker);
        }
    }

    /// [`Element::dec_refs`] over consecutive records.
    pub fn dec_refs_strided(
        &self,
        records: &[u8],
        tracker: &dyn ReferenceTracker,
    ) {
        if !self.has_references || self.size_bytes == 0 {
            return;
        }
        for record in records.chunks_exact(self.size_bytes) {
            self.dec_refs(record, tracker);
        }
    }

    /// Append this element's record to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::TooLarge`] if a field count or name
    /// does not fit its `u32` length.
    pub fn serialize(&self, out: &mut OStream) -> Result<(), SerializationError> {
        out.add_u32(ClassId::Element.tag());
        match &self.layout {
            Layout::Component(c) => {
                out.add_u8(0);
                out.add_u8(c.data_type.code());
                out.add_u8(c.kind.code());
                out.add_u8(u8::from(c.normalized));
                out.add_u8(c.vector_size);
            }
            Layout::Structure(fields) => {
                out.add_u8(1);
                out.add_len("field count", fields.len())?;
                for field in fields {
                    out.add_string(&field.name)?;
                    field.element.serialize(out)?;
                }
            }
        }
        Ok(())
    }

    /// Read an element record written by [`Element::serialize`].
    ///
    /// # Errors
    ///
    /// Fails on a wrong class tag, a truncated stream, unknown type/kind
    /// codes, a component that does not validate, or structures nested
    /// deeper than [`MAX_NESTING`].
    pub fn deserialize(input: &mut IStream<'_>) -> Result<Self, AllocationError> {
        Self::deserialize_at(input, 0)
    }

    fn deserialize_at(
        input: &mut IStream<'_>,
        depth: usize,
    ) -> Result<Self, AllocationError> {
        if depth > MAX_NESTING {
            return Err(SerializationError::InvalidRecord(format!(
                "structures nested deeper than {MAX_NESTING}"
            ))
            .into());
        }
        input.expect_class(ClassId::Element)?;
        match input.load_u8()? {
            0 => {
                let code = input.load_u8()?;
                let data_type = DataType::from_code(code).ok_or_else(|| {
                    SerializationError::InvalidRecord(format!(
                        "data type {code}"
                    ))
                })?;
                let code = input.load_u8()?;
                let kind = DataKind::from_code(code).ok_or_else(|| {
                    SerializationError::InvalidRecord(format!(
                        "data kind {code}"
                    ))
                })?;
                let normalized = input.load_u8()? != 0;
                let vector_size = input.load_u8()?;
                Self::component(data_type, kind, normalized, vector_size)
            }
            1 => {
                let count = input.load_u32()?;
                let mut fields = Vec::new();
                for _ in 0..count {
                    let name = input.load_string()?;
                    let element = Self::deserialize_at(input, depth + 1)?;
                    fields.push((name, Arc::new(element)));
                }
                Self::structure(fields)
            }
            other => Err(SerializationError::InvalidRecord(format!(
                "element variant {other}"
            ))
            .into()),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.layout {
            Layout::Component(c) => write!(
                f,
                "{:?}x{} {:?}{}",
                c.data_type,
                c.vector_size,
                c.kind,
                if c.normalized { " norm" } else { "" }
            ),
            Layout::Structure(fields) => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}@{}: {}", field.name, field.offset, field.element)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Log {
        events: RefCell<Vec<(char, u32)>>,
    }

    impl ReferenceTracker for Log {
        fn inc_ref(&self, handle: u32) {
            self.events.borrow_mut().push(('+', handle));
        }

        fn dec_ref(&self, handle: u32) {
            self.events.borrow_mut().push(('-', handle));
        }
    }

    fn sprite() -> Element {
        Element::structure(vec![
            ("pos".to_owned(), Arc::new(Element::user(DataType::F32, 2).unwrap())),
            ("tex".to_owned(), Arc::new(Element::object_ref())),
            ("tint".to_owned(), Arc::new(Element::rgba_8888())),
        ])
        .unwrap()
    }

    #[test]
    fn component_sizes() {
        assert_eq!(Element::rgba_8888().size_bytes(), 4);
        assert_eq!(Element::rgb_565().size_bytes(), 2);
        assert_eq!(Element::rgb_565().size_bits(), 16);
        assert_eq!(Element::a_8().size_bytes(), 1);
        assert_eq!(Element::user(DataType::F64, 3).unwrap().size_bytes(), 24);
    }

    #[test]
    fn structure_packs_fields_in_order() {
        let e = sprite();
        assert_eq!(e.size_bytes(), 16);
        assert_eq!(e.field_count(), 3);
        assert_eq!(e.field_offset_bytes(0), Some(0));
        assert_eq!(e.field_offset_bytes(1), Some(8));
        assert_eq!(e.field_offset_bytes(2), Some(12));
        assert_eq!(e.field(1).unwrap().name(), "tex");
        assert!(e.has_references());
        assert!(e.field_offset_bytes(3).is_none());
    }

    #[test]
    fn invalid_components_are_rejected() {
        assert!(Element::user(DataType::U8, 0).is_err());
        assert!(Element::user(DataType::U8, 5).is_err());
        assert!(Element::user(DataType::ObjectRef, 2).is_err());
        assert!(Element::component(
            DataType::U565,
            DataKind::PixelRgba,
            true,
            4
        )
        .is_err());
        assert!(Element::component(DataType::U8, DataKind::PixelLA, true, 3)
            .is_err());
        assert!(Element::structure(Vec::new()).is_err());
    }

    #[test]
    fn refs_visit_only_object_fields() {
        let e = sprite();
        let log = Log::default();
        let mut record = vec![0u8; 16];
        record[8..12].copy_from_slice(&42u32.to_le_bytes());
        e.inc_refs(&record, &log);
        e.dec_refs(&record, &log);
        assert_eq!(*log.events.borrow(), vec![('+', 42), ('-', 42)]);
    }

    #[test]
    fn null_handles_are_skipped() {
        let log = Log::default();
        Element::object_ref().inc_refs_strided(&[0u8; 12], &log);
        assert!(log.events.borrow().is_empty());
    }

    #[test]
    fn strided_refs_walk_each_record() {
        let log = Log::default();
        let mut data = Vec::new();
        for h in [3u32, 0, 9] {
            data.extend_from_slice(&h.to_le_bytes());
        }
        Element::object_ref().dec_refs_strided(&data, &log);
        assert_eq!(*log.events.borrow(), vec![('-', 3), ('-', 9)]);
    }

    #[test]
    fn pixel_formats() {
        assert_eq!(
            Element::rgba_8888().pixel_format(),
            Some(PixelFormat::Rgba8888)
        );
        assert_eq!(Element::rgb_565().pixel_format(), Some(PixelFormat::Rgb565));
        assert_eq!(Element::a_8().pixel_format(), Some(PixelFormat::A8));
        assert_eq!(Element::object_ref().pixel_format(), None);
        assert_eq!(sprite().pixel_format(), None);
    }

    #[test]
    fn structure_record_reloads() {
        let e = sprite();
        let mut out = OStream::new();
        e.serialize(&mut out).unwrap();
        let mut input = IStream::new(out.as_bytes());
        let loaded = Element::deserialize(&mut input).unwrap();
        assert_eq!(loaded, e);
        assert!(input.is_empty());
    }

    fn nested_record(depth: usize) -> OStream {
        let mut out = OStream::new();
        for _ in 0..depth {
            out.add_u32(ClassId::Element.tag());
            out.add_u8(1);
            out.add_u32(1);
            out.add_string("inner").unwrap();
        }
        Element::a_8().serialize(&mut out).unwrap();
        out
    }

    #[test]
    fn nesting_up_to_the_limit_loads() {
        let out = nested_record(MAX_NESTING);
        let mut input = IStream::new(out.as_bytes());
        let loaded = Element::deserialize(&mut input).unwrap();
        assert_eq!(loaded.size_bytes(), 1);
        assert!(input.is_empty());
    }

    #[test]
    fn deep_nesting_is_an_error() {
        let out = nested_record(100_000);
        let err = Element::deserialize(&mut IStream::new(out.as_bytes()))
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::Serialization(SerializationError::InvalidRecord(
                _
            ))
        ));
    }

    #[test]
    fn unknown_type_code_fails() {
        let mut out = OStream::new();
        out.add_u32(ClassId::Element.tag());
        out.add_u8(0);
        out.add_u8(200);
        out.add_u8(0);
        out.add_u8(0);
        out.add_u8(1);
        let mut input = IStream::new(out.as_bytes());
        assert!(Element::deserialize(&mut input).is_err());
    }
}
