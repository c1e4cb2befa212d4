//! Read-only windows into a shared source buffer.

use crate::endian::{self, BigEndianCodec};
use crate::{BinaryReader, Error, Result};

/// A non-owning `(base, len)` window into a borrowed buffer.
///
/// Regions are cheap to copy and may overlap. Every region produced by
/// [`Region::sub`] lies entirely inside its parent, so `bytes()` never
/// panics.
#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    buffer: &'a [u8],
    base: usize,
    len: usize,
}

impl<'a> Region<'a> {
    /// A region spanning the whole buffer.
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            base: 0,
            len: buffer.len(),
        }
    }

    /// Absolute offset of this window in the source buffer.
    #[inline]
    pub const fn base(&self) -> usize {
        self.base
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bytes covered by this window.
    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        &self.buffer[self.base..self.base + self.len]
    }

    /// A child window at `offset` (relative to this region) of `len` bytes.
    pub fn sub(&self, offset: usize, len: usize) -> Result<Region<'a>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(Region {
                buffer: self.buffer,
                base: self.base + offset,
                len,
            }),
            _ => Err(Error::StructuralOverflow {
                offset,
                len,
                parent_len: self.len,
            }),
        }
    }

    /// The child window from `offset` to the end of this region.
    pub fn tail(&self, offset: usize) -> Result<Region<'a>> {
        self.sub(offset, self.len.saturating_sub(offset))
    }

    /// A sequential reader over this window.
    pub fn reader(&self) -> BinaryReader<'a> {
        BinaryReader::new(self.bytes())
    }

    #[inline]
    pub fn read<T: BigEndianCodec>(&self, offset: usize) -> Result<T> {
        endian::read(self.bytes(), offset)
    }

    #[inline]
    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        self.read(offset)
    }

    #[inline]
    pub fn read_i16(&self, offset: usize) -> Result<i16> {
        self.read(offset)
    }

    #[inline]
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.read(offset)
    }

    #[inline]
    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        self.read(offset)
    }

    pub fn read_cstring(&self, offset: usize, limit: usize) -> Result<&'a [u8]> {
        endian::read_cstring(self.bytes(), offset, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_is_relative() {
        let data: Vec<u8> = (0..32).collect();
        let root = Region::new(&data);
        let child = root.sub(8, 16).unwrap();
        let grandchild = child.sub(4, 4).unwrap();

        assert_eq!(child.base(), 8);
        assert_eq!(grandchild.base(), 12);
        assert_eq!(grandchild.bytes(), &[12, 13, 14, 15]);
        assert_eq!(grandchild.read_u32(0).unwrap(), 0x0C0D0E0F);
    }

    #[test]
    fn test_sub_overflow() {
        let data = [0u8; 16];
        let root = Region::new(&data);
        let child = root.sub(4, 8).unwrap();

        assert!(matches!(
            child.sub(4, 5),
            Err(Error::StructuralOverflow {
                offset: 4,
                len: 5,
                parent_len: 8
            })
        ));
        assert!(child.sub(usize::MAX, 2).is_err());
        assert!(child.sub(8, 0).unwrap().is_empty());
    }

    #[test]
    fn test_tail() {
        let data = [1u8, 2, 3, 4, 5];
        let root = Region::new(&data);
        assert_eq!(root.tail(3).unwrap().bytes(), &[4, 5]);
        assert!(root.tail(5).unwrap().is_empty());
        assert!(root.tail(6).is_err());
    }
}
