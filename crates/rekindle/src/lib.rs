//! Rekindle - parse, edit and rebuild REFF particle-effect containers.
//!
//! This crate provides a unified interface to the rekindle crates.
//!
//! # Crates
//!
//! - [`rekindle_common`] - Big-endian cursors, regions, scalar types
//! - [`rekindle_node`] - Node lifecycle engine, layouts, reflection
//! - [`rekindle_reff`] - REFF container node set
//!
//! # Example
//!
//! ```no_run
//! use rekindle::prelude::*;
//!
//! let data = std::fs::read("effect.breff")?;
//! let mut reff = Reff::parse(&data)?;
//! println!("{}: {} entries", reff.name(), reff.entries().len());
//!
//! let rebuilt = reff.to_bytes_with(&BuildOptions::forced())?;
//! assert_eq!(rebuilt.len(), data.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use rekindle_common as common;
pub use rekindle_node as node;
pub use rekindle_reff as reff;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use rekindle_common::{Region, Rgba, Vec2, Vec3};
    pub use rekindle_node::{
        tree, BuildOptions, Field, FieldValue, Layout, Lifecycle, Snapshot, TreeNode,
    };
    pub use rekindle_reff::{
        AnimCurve, AnimationList, CurveTable, Emitter, EmitterCommonFlags, Entry, NameTable,
        Particle, PrefixedString, Reff, TableKind, TrackSet,
    };
}

pub use rekindle_reff::Reff;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
