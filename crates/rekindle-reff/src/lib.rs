//! REFF particle-effect containers.
//!
//! A REFF file is a header, an identifier string, and an object table of
//! named entries. Each entry payload holds an emitter descriptor, a particle
//! block, and an animation track list whose curves carry up to five tables.
//!
//! ```text
//! Reff
//! └── Entry
//!     ├── Emitter
//!     ├── Particle
//!     └── AnimationList
//!         └── AnimCurve
//!             ├── CurveTable (key, range, random, info)
//!             └── NameTable
//! ```
//!
//! Every node implements [`rekindle_node::Lifecycle`]; untouched subtrees are
//! copied from the source buffer on rebuild, edited ones are re-derived.
//!
//! # Example
//!
//! ```no_run
//! use rekindle_reff::Reff;
//!
//! let data = std::fs::read("effect.breff")?;
//! let mut reff = Reff::parse(&data)?;
//! if let Some(entry) = reff.entry_mut(0) {
//!     entry.set_name("renamed")?;
//! }
//! let rebuilt = reff.to_bytes()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod strings;

pub mod animation;
pub mod container;
pub mod curve;
pub mod curve_table;
pub mod emitter;
pub mod entry;
pub mod particle;
pub mod table;

pub use animation::{AnimationList, TrackSet};
pub use container::{is_reff, Reff, REFF_TAG};
pub use curve::{AnimCurve, CurveSeed, CurveType, ProcessFlags, Slot, CURVE_HEADER_SIZE};
pub use curve_table::{CurveTable, NameTable, TableKind};
pub use emitter::{Emitter, EmitterCommonFlags, EMITTER_DESC_SIZE};
pub use entry::Entry;
pub use error::{Error, Result};
pub use particle::Particle;
pub use strings::PrefixedString;
