//! Crate-level error types.

use std::fmt;

/// Coarse classification of a reported error, as seen by the dispatch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The system allocator refused the request.
    OutOfMemory,
    /// Payload size did not match the size the operation expects.
    SizeMismatch,
    /// An index, coordinate or argument was outside its valid range.
    BadValue,
    /// The requested path has no implementation.
    NotImplemented,
    /// The element layout cannot be filtered or uploaded.
    UnsupportedFormat,
    /// A serialized record could not be loaded.
    Serialization,
    /// Generic I/O or configuration failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OutOfMemory => "out of memory",
            Self::SizeMismatch => "size mismatch",
            Self::BadValue => "bad value",
            Self::NotImplemented => "not implemented",
            Self::UnsupportedFormat => "unsupported format",
            Self::Serialization => "serialization",
            Self::Io => "i/o",
        };
        f.write_str(name)
    }
}

/// Failures while encoding or decoding a serialized record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// The stream ended before the record was complete.
    Truncated {
        /// Bytes the reader needed.
        needed: usize,
        /// Bytes left in the stream.
        available: usize,
    },
    /// The record carried a different class tag.
    WrongClass {
        /// Tag the reader expected.
        expected: u32,
        /// Tag found in the stream.
        found: u32,
    },
    /// Declared payload size disagrees with the decoded type.
    PayloadSize {
        /// Byte count written in the record.
        declared: usize,
        /// Byte count the decoded type requires.
        expected: usize,
    },
    /// A field held a value outside its encoding.
    InvalidRecord(String),
    /// A length or count was too large for its `u32` field.
    TooLarge {
        /// What was being written.
        what: &'static str,
        /// The value that did not fit.
        len: usize,
    },
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { needed, available } => write!(
                f,
                "stream truncated: needed {needed} bytes, {available} left"
            ),
            Self::WrongClass { expected, found } => {
                write!(f, "invalid class id {found}, expected {expected}")
            }
            Self::PayloadSize { declared, expected } => write!(
                f,
                "payload holds {declared} bytes but the type needs {expected}"
            ),
            Self::InvalidRecord(msg) => write!(f, "invalid record: {msg}"),
            Self::TooLarge { what, len } => {
                write!(f, "{what} length {len} does not fit in 32 bits")
            }
        }
    }
}

impl std::error::Error for SerializationError {}

/// Errors produced by allocation operations.
#[derive(Debug)]
pub enum AllocationError {
    /// The backing buffer could not be reserved.
    OutOfMemory {
        /// Size of the failed request in bytes.
        requested: usize,
    },
    /// A payload's byte length did not match what the operation requires.
    SizeMismatch {
        /// Operation that rejected the payload.
        op: &'static str,
        /// Byte length the operation expected.
        expected: usize,
        /// Byte length it was given.
        actual: usize,
    },
    /// Out-of-range index, coordinate or argument.
    BadValue(String),
    /// Operation without an implementation.
    NotImplemented(&'static str),
    /// Element layout has no filter or texture format.
    UnsupportedFormat(String),
    /// Loading a serialized allocation failed.
    Serialization(SerializationError),
    /// `remove_dependent` was called for a consumer that was never added.
    DependentNotRegistered,
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
}

impl AllocationError {
    /// Classification reported through the context error channel.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Self::BadValue(_) | Self::DependentNotRegistered => {
                ErrorKind::BadValue
            }
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Serialization(_) => ErrorKind::Serialization,
            Self::Io(_) | Self::OptionsParse(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn bad_value(msg: impl Into<String>) -> Self {
        Self::BadValue(msg.into())
    }
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { requested } => {
                write!(f, "allocation of {requested} bytes failed")
            }
            Self::SizeMismatch {
                op,
                expected,
                actual,
            } => write!(
                f,
                "{op} called with mismatched size: expected {expected}, got \
                 {actual}"
            ),
            Self::BadValue(msg) => write!(f, "bad value: {msg}"),
            Self::NotImplemented(what) => write!(f, "{what} not implemented"),
            Self::UnsupportedFormat(msg) => {
                write!(f, "unsupported format: {msg}")
            }
            Self::Serialization(e) => write!(f, "load failed: {e}"),
            Self::DependentNotRegistered => {
                write!(f, "dependent was not registered")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
        }
    }
}

impl std::error::Error for AllocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialization(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SerializationError> for AllocationError {
    fn from(e: SerializationError) -> Self {
        Self::Serialization(e)
    }
}

impl From<std::io::Error> for AllocationError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let err = AllocationError::SizeMismatch {
            op: "write",
            expected: 16,
            actual: 4,
        };
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
        assert_eq!(
            AllocationError::DependentNotRegistered.kind(),
            ErrorKind::BadValue
        );
        let load: AllocationError = SerializationError::WrongClass {
            expected: 4,
            found: 2,
        }
        .into();
        assert_eq!(load.kind(), ErrorKind::Serialization);
    }

    #[test]
    fn display_mentions_sizes() {
        let err = AllocationError::SizeMismatch {
            op: "write_range_1d",
            expected: 8,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("write_range_1d"));
        assert!(msg.contains("expected 8"));
        assert!(msg.contains("got 3"));
    }
}
