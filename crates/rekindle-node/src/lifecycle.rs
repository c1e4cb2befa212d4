use rekindle_common::Region;

use crate::{Layout, NodeState};

/// The four-pass contract every node kind implements.
///
/// Parse runs top-down (`initialize` then `populate`), sizing runs
/// bottom-up, and rebuild runs top-down again with the layouts the size
/// pass produced.
pub trait Lifecycle<'a>: Sized {
    /// What the parent learned while carving this node's region.
    type Seed;

    /// Format-level error type.
    type Error: From<crate::Error> + From<rekindle_common::Error>;

    /// Interpret the header fields of `region`.
    ///
    /// `Ok(None)` means the region is semantically empty (or not this
    /// format, for a root) and the node should be discarded. Children are
    /// never created here.
    fn initialize(region: Region<'a>, seed: Self::Seed) -> Result<Option<Self>, Self::Error>;

    /// Carve and initialize child regions, then populate each child.
    fn populate(&mut self) -> Result<(), Self::Error>;

    /// Compute this subtree's layout. Memoized until the node is edited.
    fn calculate_size(&mut self, force: bool) -> Result<Layout, Self::Error>;

    /// Write this subtree into `target`, which is exactly `layout.size()`
    /// bytes long.
    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<(), Self::Error>;

    fn state(&self) -> &NodeState<'a>;
}
