//! Common utilities for rekindle.
//!
//! This crate provides the byte-level foundation shared by the node engine
//! and the format crates:
//!
//! - [`BinaryReader`] - Sequential big-endian reading from byte slices
//! - [`BinaryWriter`] - Sequential big-endian writing into a pre-sized slice
//! - [`Region`] - Non-owning window into a shared source buffer
//! - [`endian`] - Offset-addressed big-endian accessors and [`BigEndianCodec`]
//! - [`Vec2`], [`Vec3`], [`Rgba`] - Scalar aggregates found in effect parameters

mod align;
mod error;
mod reader;
mod region;
mod types;
mod writer;

pub mod endian;

pub use align::{align4, align_up};
pub use endian::BigEndianCodec;
pub use error::{Error, Result};
pub use reader::BinaryReader;
pub use region::Region;
pub use types::{Rgba, Vec2, Vec3};
pub use writer::BinaryWriter;

/// Re-export memchr for terminator scanning
pub use memchr;
