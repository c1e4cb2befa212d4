//! Per-node bookkeeping shared by every node kind.

use rekindle_common::Region;

use crate::layout::{check_size, Carved};
use crate::{Error, Layout, Result};

/// Where a node is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Unparsed,
    Initialized,
    Populated,
    SizeCalculated,
    Rebuilt,
}

/// Source region, modification flag, and cached layout of one node.
#[derive(Debug, Clone)]
pub struct NodeState<'a> {
    source: Option<Region<'a>>,
    modified: bool,
    cached: Option<Layout>,
    phase: Phase,
}

impl<'a> NodeState<'a> {
    /// State of a node initialized from `region`.
    pub fn parsed(region: Region<'a>) -> Self {
        Self {
            source: Some(region),
            modified: false,
            cached: None,
            phase: Phase::Initialized,
        }
    }

    /// State of a node built in memory. It has no source bytes, so it is
    /// always sized from its fields.
    pub fn synthetic() -> Self {
        Self {
            source: None,
            modified: true,
            cached: None,
            phase: Phase::Populated,
        }
    }

    #[inline]
    pub fn source(&self) -> Option<Region<'a>> {
        self.source
    }

    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn cached(&self) -> Option<&Layout> {
        self.cached.as_ref()
    }

    /// Record that populate finished.
    pub fn mark_populated(&mut self) {
        self.phase = Phase::Populated;
    }

    /// Drop the cached layout and mark the node as edited.
    pub fn invalidate(&mut self) {
        self.modified = true;
        self.cached = None;
        if self.phase > Phase::Populated {
            self.phase = Phase::Populated;
        }
    }

    /// Run the size pass for this node.
    ///
    /// Without `force`, a cached layout is reused and a node untouched since
    /// parse reports its source length as a verbatim layout. Otherwise
    /// `compute` derives the layout from current field values.
    pub fn size_with<E, F>(&mut self, force: bool, compute: F) -> std::result::Result<Layout, E>
    where
        F: FnOnce() -> std::result::Result<Layout, E>,
    {
        if !force {
            if let Some(layout) = &self.cached {
                return Ok(layout.clone());
            }
        }

        let layout = match self.source {
            Some(region) if !force && !self.modified => Layout::verbatim(region.len()),
            _ => compute()?,
        };

        self.cached = Some(layout.clone());
        self.phase = Phase::SizeCalculated;
        Ok(layout)
    }

    /// Run the rebuild pass for this node.
    ///
    /// `target` must be exactly `layout.size()` bytes. Verbatim layouts copy
    /// the source region; derived layouts are carved and handed to `write`.
    pub fn rebuild_with<'t, E, F>(
        &mut self,
        target: &'t mut [u8],
        layout: &Layout,
        write: F,
    ) -> std::result::Result<(), E>
    where
        E: From<Error>,
        F: FnOnce(Carved<'t>) -> std::result::Result<(), E>,
    {
        check_size(layout.size(), target.len())?;

        if layout.is_verbatim() {
            let source = self.source.ok_or(Error::MissingSource)?;
            check_size(layout.size(), source.len())?;
            target.copy_from_slice(source.bytes());
        } else {
            write(layout.carve(target)?)?;
        }

        self.phase = Phase::Rebuilt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unmodified_node_is_verbatim() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut state = NodeState::parsed(Region::new(&data).sub(1, 4).unwrap());

        let layout = state
            .size_with::<Error, _>(false, || unreachable!("verbatim node is not derived"))
            .unwrap();
        assert!(layout.is_verbatim());
        assert_eq!(layout.size(), 4);
        assert_eq!(state.phase(), Phase::SizeCalculated);

        let mut out = [0u8; 4];
        state
            .rebuild_with::<Error, _>(&mut out, &layout, |_| unreachable!())
            .unwrap();
        assert_eq!(out, [2, 3, 4, 5]);
        assert_eq!(state.phase(), Phase::Rebuilt);
    }

    #[test]
    fn test_force_derives_layout() {
        let data = [0u8; 4];
        let mut state = NodeState::parsed(Region::new(&data));
        let layout = state
            .size_with::<Error, _>(true, || Ok(Layout::leaf(8)))
            .unwrap();
        assert_eq!(layout, Layout::leaf(8));
    }

    #[test]
    fn test_cache_until_invalidated() {
        let mut state = NodeState::synthetic();
        let mut calls = 0;

        for _ in 0..2 {
            state
                .size_with::<Error, _>(false, || {
                    calls += 1;
                    Ok(Layout::leaf(4))
                })
                .unwrap();
        }
        assert_eq!(calls, 1);

        state.invalidate();
        assert!(state.cached().is_none());
        assert_eq!(state.phase(), Phase::Populated);
        state
            .size_with::<Error, _>(false, || {
                calls += 1;
                Ok(Layout::leaf(4))
            })
            .unwrap();
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_verbatim_without_source() {
        let mut state = NodeState::synthetic();
        let mut out = [0u8; 2];
        let result = state.rebuild_with::<Error, _>(&mut out, &Layout::verbatim(2), |_| Ok(()));
        assert!(matches!(result, Err(Error::MissingSource)));
    }
}
