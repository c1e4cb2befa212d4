//! Parse / size / rebuild orchestration.

use rekindle_common::Region;
use tracing::{debug, instrument};

use crate::{Layout, Lifecycle};

/// Options for [`build`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Re-derive every node from its fields instead of copying untouched
    /// subtrees from the source buffer.
    pub force: bool,
}

impl BuildOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Initialize the root over `buffer` and populate the whole tree.
///
/// Returns `Ok(None)` when the root does not recognize the buffer.
#[instrument(level = "debug", skip_all, fields(len = buffer.len()))]
pub fn load<'a, N>(buffer: &'a [u8], seed: N::Seed) -> Result<Option<N>, N::Error>
where
    N: Lifecycle<'a>,
{
    let Some(mut root) = N::initialize(Region::new(buffer), seed)? else {
        debug!("root declined buffer");
        return Ok(None);
    };
    root.populate()?;
    Ok(Some(root))
}

/// Run the size pass over the whole tree.
pub fn calculate<'a, N>(root: &mut N, force: bool) -> Result<Layout, N::Error>
where
    N: Lifecycle<'a>,
{
    root.calculate_size(force)
}

/// Size the tree, allocate one output buffer, and rebuild into it.
#[instrument(level = "debug", skip_all, fields(force = options.force))]
pub fn build<'a, N>(root: &mut N, options: &BuildOptions) -> Result<Vec<u8>, N::Error>
where
    N: Lifecycle<'a>,
{
    let layout = root.calculate_size(options.force)?;
    debug!(
        size = layout.size(),
        verbatim = layout.is_verbatim(),
        "size pass complete"
    );

    let mut output = vec![0u8; layout.size()];
    root.rebuild(&mut output, &layout)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, NodeState, Phase};
    use pretty_assertions::assert_eq;
    use rekindle_common::{BinaryWriter, Region};

    /// `[u8 len][len bytes]`, where each byte is one child.
    struct Counted<'a> {
        state: NodeState<'a>,
        items: Vec<Item<'a>>,
    }

    struct Item<'a> {
        state: NodeState<'a>,
        value: u8,
    }

    impl<'a> Lifecycle<'a> for Item<'a> {
        type Seed = ();
        type Error = Error;

        fn initialize(region: Region<'a>, _seed: ()) -> Result<Option<Self>, Error> {
            let value = region.read::<u8>(0)?;
            if value == 0 {
                return Ok(None);
            }
            Ok(Some(Self {
                state: NodeState::parsed(region),
                value,
            }))
        }

        fn populate(&mut self) -> Result<(), Error> {
            self.state.mark_populated();
            Ok(())
        }

        fn calculate_size(&mut self, force: bool) -> Result<Layout, Error> {
            self.state.size_with(force, || Ok(Layout::leaf(1)))
        }

        fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<(), Error> {
            let value = self.value;
            self.state.rebuild_with(target, layout, |carved| {
                carved.header[0] = value;
                Ok(())
            })
        }

        fn state(&self) -> &NodeState<'a> {
            &self.state
        }
    }

    impl<'a> Lifecycle<'a> for Counted<'a> {
        type Seed = ();
        type Error = Error;

        fn initialize(region: Region<'a>, _seed: ()) -> Result<Option<Self>, Error> {
            if region.is_empty() {
                return Ok(None);
            }
            Ok(Some(Self {
                state: NodeState::parsed(region),
                items: Vec::new(),
            }))
        }

        fn populate(&mut self) -> Result<(), Error> {
            let Some(region) = self.state.source() else {
                return Ok(());
            };
            let count = region.read::<u8>(0)? as usize;
            for index in 0..count {
                if let Some(mut item) = Item::initialize(region.sub(1 + index, 1)?, ())? {
                    item.populate()?;
                    self.items.push(item);
                }
            }
            self.state.mark_populated();
            Ok(())
        }

        fn calculate_size(&mut self, force: bool) -> Result<Layout, Error> {
            let items = &mut self.items;
            self.state.size_with(force, || {
                let children = items
                    .iter_mut()
                    .map(|item| item.calculate_size(force))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Layout::node(1, children, 0))
            })
        }

        fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<(), Error> {
            let items = &mut self.items;
            self.state.rebuild_with(target, layout, |carved| {
                BinaryWriter::new(carved.header).write_u8(items.len() as u8)?;
                for ((item, window), child) in items
                    .iter_mut()
                    .zip(carved.children)
                    .zip(layout.children())
                {
                    item.rebuild(window, child)?;
                }
                Ok(())
            })
        }

        fn state(&self) -> &NodeState<'a> {
            &self.state
        }
    }

    #[test]
    fn test_load_discards_empty_children() {
        let data = [3u8, 7, 0, 9];
        let root: Counted = load(&data, ()).unwrap().unwrap();
        assert_eq!(root.items.len(), 2);
        assert_eq!(root.state().phase(), Phase::Populated);
    }

    #[test]
    fn test_load_declines() {
        let root: Option<Counted> = load(&[], ()).unwrap();
        assert!(root.is_none());
    }

    #[test]
    fn test_build_verbatim_and_forced() {
        let data = [3u8, 7, 0, 9];
        let mut root: Counted = load(&data, ()).unwrap().unwrap();

        assert_eq!(build(&mut root, &BuildOptions::default()).unwrap(), data);
        assert_eq!(
            build(&mut root, &BuildOptions::forced()).unwrap(),
            vec![2, 7, 9]
        );
    }

    #[test]
    fn test_edit_invalidates_parent() {
        let data = [2u8, 1, 2];
        let mut root: Counted = load(&data, ()).unwrap().unwrap();
        calculate(&mut root, false).unwrap();

        root.state.invalidate();
        root.items[1].value = 5;
        root.items[1].state.invalidate();

        assert_eq!(
            build(&mut root, &BuildOptions::default()).unwrap(),
            vec![2, 1, 5]
        );
        assert_eq!(root.items[1].state().phase(), Phase::Rebuilt);
    }

    #[test]
    fn test_idempotent_sizing() {
        let data = [2u8, 1, 2];
        let mut root: Counted = load(&data, ()).unwrap().unwrap();
        let first = calculate(&mut root, true).unwrap();
        let second = calculate(&mut root, true).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.size(), 3);
    }
}
