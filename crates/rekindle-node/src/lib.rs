//! Node lifecycle engine for offset-addressed binary containers.
//!
//! A container is parsed into a tree of nodes, each owning its children and
//! borrowing its bytes from one shared source buffer. Every node kind
//! implements [`Lifecycle`]:
//!
//! | Pass | Direction | Operation |
//! |------|-----------|-----------|
//! | parse | top-down | [`Lifecycle::initialize`], [`Lifecycle::populate`] |
//! | size | bottom-up | [`Lifecycle::calculate_size`] returns a [`Layout`] |
//! | rebuild | top-down | [`Lifecycle::rebuild`] writes into a carved window |
//!
//! [`NodeState`] carries the per-node bookkeeping (source region, edit flag,
//! cached layout). The [`tree`] module sequences the passes, and
//! [`TreeNode`] exposes a type-erased view for hosts.

mod error;
mod layout;
mod lifecycle;
mod macros;
mod reflect;
mod state;

pub mod field;
pub mod tree;

pub use error::{Error, Result};
pub use field::{Field, FieldValue, RawField};
pub use layout::{check_size, Carved, Layout};
pub use lifecycle::Lifecycle;
pub use reflect::{node_at, node_at_mut, unknown_field, Snapshot, TreeNode};
pub use state::{NodeState, Phase};
pub use tree::BuildOptions;

#[doc(hidden)]
pub mod __private {
    pub use rekindle_common::endian::BigEndianCodec;
}
