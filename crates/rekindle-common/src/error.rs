//! Error types for rekindle-common.

use thiserror::Error;

/// Common error type for byte-level operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or write touched bytes past the end of its buffer.
    #[error("access of {width} bytes at offset {offset:#x} exceeds buffer of {len} bytes")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// A child region would extend past the end of its parent region.
    #[error("child region {offset:#x}+{len:#x} exceeds parent region of {parent_len:#x} bytes")]
    StructuralOverflow {
        offset: usize,
        len: usize,
        parent_len: usize,
    },

    /// Invalid magic bytes encountered.
    #[error("invalid magic: expected {expected:?}, got {actual:?}")]
    InvalidMagic { expected: Vec<u8>, actual: Vec<u8> },
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
