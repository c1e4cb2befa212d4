//! Size-pass results.
//!
//! A [`Layout`] is what `calculate_size` hands to `rebuild`: the node's total
//! size split into the bytes the node writes itself (its header), one nested
//! layout per child in write order, and trailing bytes written after the
//! last child.

use crate::{Error, Result};

/// The computed byte layout of one node and its subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    size: usize,
    header: usize,
    trailing: usize,
    children: Vec<Layout>,
    verbatim: bool,
}

/// Disjoint output windows for one node, produced by [`Layout::carve`].
#[derive(Debug)]
pub struct Carved<'t> {
    pub header: &'t mut [u8],
    pub children: Vec<&'t mut [u8]>,
    pub trailing: &'t mut [u8],
}

impl Layout {
    /// An untouched node: rebuild copies its source bytes.
    pub fn verbatim(size: usize) -> Self {
        Self {
            size,
            header: size,
            trailing: 0,
            children: Vec::new(),
            verbatim: true,
        }
    }

    /// A derived node without children.
    pub fn leaf(size: usize) -> Self {
        Self {
            size,
            header: size,
            trailing: 0,
            children: Vec::new(),
            verbatim: false,
        }
    }

    /// A derived node: `header` bytes, then each child, then `trailing` bytes.
    pub fn node(header: usize, children: Vec<Layout>, trailing: usize) -> Self {
        let size = header + children.iter().map(Layout::size).sum::<usize>() + trailing;
        Self {
            size,
            header,
            trailing,
            children,
            verbatim: false,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn header(&self) -> usize {
        self.header
    }

    #[inline]
    pub fn trailing(&self) -> usize {
        self.trailing
    }

    #[inline]
    pub fn children(&self) -> &[Layout] {
        &self.children
    }

    #[inline]
    pub fn is_verbatim(&self) -> bool {
        self.verbatim
    }

    /// Offset of child `index` relative to the start of this node.
    pub fn child_offset(&self, index: usize) -> usize {
        self.header + self.children[..index.min(self.children.len())]
            .iter()
            .map(Layout::size)
            .sum::<usize>()
    }

    /// Split `target` into this layout's header, child, and trailing windows.
    pub fn carve<'t>(&self, target: &'t mut [u8]) -> Result<Carved<'t>> {
        check_size(self.size, target.len())?;

        let (header, mut rest) = target.split_at_mut(self.header);
        let mut children = Vec::with_capacity(self.children.len());
        for child in &self.children {
            let (window, remainder) = std::mem::take(&mut rest).split_at_mut(child.size);
            children.push(window);
            rest = remainder;
        }

        Ok(Carved {
            header,
            children,
            trailing: rest,
        })
    }
}

/// Fail with [`Error::SizeMismatch`] unless `actual == expected`.
#[inline]
pub fn check_size(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::SizeMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_node_size_sums_parts() {
        let layout = Layout::node(8, vec![Layout::leaf(4), Layout::verbatim(12)], 3);
        assert_eq!(layout.size(), 27);
        assert_eq!(layout.child_offset(0), 8);
        assert_eq!(layout.child_offset(1), 12);
        assert_eq!(layout.child_offset(2), 24);
        assert!(!layout.is_verbatim());
        assert!(layout.children()[1].is_verbatim());
    }

    #[test]
    fn test_carve_windows() {
        let layout = Layout::node(2, vec![Layout::leaf(3), Layout::leaf(1)], 2);
        let mut buf = [0u8; 8];
        {
            let mut carved = layout.carve(&mut buf).unwrap();
            carved.header.fill(1);
            carved.children[0].fill(2);
            carved.children[1].fill(3);
            carved.trailing.fill(4);
        }
        assert_eq!(buf, [1, 1, 2, 2, 2, 3, 4, 4]);
    }

    #[test]
    fn test_carve_rejects_wrong_target() {
        let layout = Layout::leaf(4);
        let mut buf = [0u8; 5];
        assert!(matches!(
            layout.carve(&mut buf),
            Err(Error::SizeMismatch {
                expected: 4,
                actual: 5
            })
        ));
    }
}
