//! Little-endian binary streams for allocation records.
//!
//! [`OStream`] is append-only; [`IStream`] reads sequentially from a borrowed
//! byte slice and reports truncation instead of reading past the end.

use crate::error::SerializationError;

/// Tag written at the start of every serialized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ClassId {
    /// Unrecognized record.
    Unknown = 0,
    /// [`crate::types::Type`] record.
    Type = 2,
    /// [`crate::element::Element`] record.
    Element = 3,
    /// [`crate::allocation::Allocation`] record.
    Allocation = 4,
}

impl ClassId {
    /// Numeric tag as written to the stream.
    #[must_use]
    pub const fn tag(self) -> u32 {
        self as u32
    }
}

/// Growable output stream.
#[derive(Debug, Default, Clone)]
pub struct OStream {
    data: Vec<u8>,
}

impl OStream {
    /// Empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte.
    pub fn add_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    /// Append a little-endian `u32`.
    pub fn add_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    /// Append a byte or item count as a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::TooLarge`] if `len` does not fit in a
    /// `u32`; nothing is written.
    pub fn add_len(
        &mut self,
        what: &'static str,
        len: usize,
    ) -> Result<(), SerializationError> {
        let len = u32::try_from(len)
            .map_err(|_| SerializationError::TooLarge { what, len })?;
        self.add_u32(len);
        Ok(())
    }

    /// Append a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// See [`OStream::add_len`].
    pub fn add_string(&mut self, s: &str) -> Result<(), SerializationError> {
        self.add_len("string", s.len())?;
        self.data.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Append raw bytes without a length prefix.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the stream, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Number of bytes written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if nothing was written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Sequential reader over a byte slice.
#[derive(Debug, Clone)]
pub struct IStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> IStream<'a> {
    /// Reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// `true` once every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read `len` raw bytes.
    pub fn load_bytes(
        &mut self,
        len: usize,
    ) -> Result<&'a [u8], SerializationError> {
        let available = self.remaining();
        if len > available {
            return Err(SerializationError::Truncated {
                needed: len,
                available,
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read one byte.
    pub fn load_u8(&mut self) -> Result<u8, SerializationError> {
        Ok(self.load_bytes(1)?[0])
    }

    /// Read a little-endian `u32`.
    pub fn load_u32(&mut self) -> Result<u32, SerializationError> {
        let b = self.load_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn load_string(&mut self) -> Result<String, SerializationError> {
        let len = self.load_u32()? as usize;
        let bytes = self.load_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            SerializationError::InvalidRecord(format!("string: {e}"))
        })
    }

    /// Read a `u32` and require it to equal `expected`'s tag.
    pub fn expect_class(
        &mut self,
        expected: ClassId,
    ) -> Result<(), SerializationError> {
        let found = self.load_u32()?;
        if found == expected.tag() {
            Ok(())
        } else {
            Err(SerializationError::WrongClass {
                expected: expected.tag(),
                found,
            })
        }
    }
}
