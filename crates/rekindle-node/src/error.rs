//! Error types for the node engine.

use thiserror::Error;

/// Errors raised while sizing, rebuilding, or editing a node tree.
#[derive(Debug, Error)]
pub enum Error {
    /// Byte-level error.
    #[error(transparent)]
    Common(#[from] rekindle_common::Error),

    /// The bytes produced for a node differ from its computed size.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A verbatim layout was requested for a node with no source bytes.
    #[error("node has no source region to copy")]
    MissingSource,

    /// The node has no field of that name.
    #[error("{kind} has no field named {field:?}")]
    UnknownField { kind: &'static str, field: String },

    /// A field was assigned a value of the wrong type.
    #[error("field type mismatch: expected {expected}, got {actual}")]
    FieldType {
        expected: &'static str,
        actual: &'static str,
    },

    /// A value was rejected by the node it was assigned to.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// The node kind carries no name that can be changed.
    #[error("{kind} cannot be renamed")]
    NotRenamable { kind: &'static str },
}

/// Result type alias using the node Error type.
pub type Result<T> = std::result::Result<T, Error>;
