//! Error types for REFF parsing and rebuilding.

use thiserror::Error;

/// Errors that can occur when working with REFF containers.
#[derive(Debug, Error)]
pub enum Error {
    /// Byte-level error.
    #[error(transparent)]
    Common(#[from] rekindle_common::Error),

    /// Node engine error.
    #[error(transparent)]
    Node(#[from] rekindle_node::Error),

    /// The buffer does not start with the REFF tag.
    #[error("not a REFF container: expected tag {expected:?}, got {actual:?}")]
    TagMismatch { expected: [u8; 4], actual: Vec<u8> },

    /// A node's declared length disagrees with the bytes its parts declare.
    #[error("{node}: declared length {declared:#x} but parts account for {consumed:#x}")]
    LengthMismatch {
        node: &'static str,
        declared: usize,
        consumed: usize,
    },

    /// A count or offset field holds a negative value.
    #[error("{field} is negative ({value})")]
    Negative { field: &'static str, value: i64 },

    /// A value does not fit the width of the field it is written to.
    #[error("{field} value {value} does not fit its field")]
    FieldOverflow { field: &'static str, value: usize },

    /// A curve table record has the wrong length.
    #[error("record stride mismatch: expected {expected} bytes, got {actual}")]
    StrideMismatch { expected: usize, actual: usize },

    /// A name cannot be stored in a length-prefixed string field.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// An index is past the end of a child collection.
    #[error("index {index} out of range for {len} items")]
    IndexOutOfRange { index: usize, len: usize },

    /// A region is too short for the fixed-layout block it holds.
    #[error("{node}: region of {len:#x} bytes is shorter than the {min:#x}-byte block")]
    Truncated {
        node: &'static str,
        len: usize,
        min: usize,
    },

    /// A required payload block was discarded during populate.
    #[error("entry payload has no {block} block")]
    MissingBlock { block: &'static str },
}

/// Result type alias using the REFF Error type.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Flatten into the node engine's error, for the host-facing editing API.
    pub(crate) fn into_node(self) -> rekindle_node::Error {
        match self {
            Error::Node(err) => err,
            Error::Common(err) => rekindle_node::Error::Common(err),
            other => rekindle_node::Error::InvalidValue {
                field: "value".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

/// Convert a size or offset to a `u32` field.
pub(crate) fn to_u32(field: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::FieldOverflow { field, value })
}

/// Convert a size or offset to an `i32` field.
pub(crate) fn to_i32(field: &'static str, value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::FieldOverflow { field, value })
}

/// Convert a count or short length to a `u16` field.
pub(crate) fn to_u16(field: &'static str, value: usize) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::FieldOverflow { field, value })
}

/// Convert a count to an `i16` field.
pub(crate) fn to_i16(field: &'static str, value: usize) -> Result<i16> {
    i16::try_from(value).map_err(|_| Error::FieldOverflow { field, value })
}

/// Read a signed count or offset as `usize`, rejecting negatives.
pub(crate) fn non_negative(field: &'static str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::Negative { field, value })
}
