//! Sequential big-endian writer into a pre-sized slice.
//!
//! Rebuild passes know their exact output size before writing, so the writer
//! never grows: running past the end of the target is an error.

use crate::endian::BigEndianCodec;
use crate::{align_up, Error, Result};

/// A cursor writing big-endian values into a borrowed mutable slice.
#[derive(Debug)]
pub struct BinaryWriter<'w> {
    data: &'w mut [u8],
    position: usize,
}

impl<'w> BinaryWriter<'w> {
    /// Create a writer positioned at the start of `data`.
    #[inline]
    pub fn new(data: &'w mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Whether every byte of the target has been written.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.position == self.data.len()
    }

    fn claim(&mut self, count: usize) -> Result<&mut [u8]> {
        if self.remaining() < count {
            return Err(Error::OutOfBounds {
                offset: self.position,
                width: count,
                len: self.data.len(),
            });
        }
        let start = self.position;
        self.position += count;
        Ok(&mut self.data[start..start + count])
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.claim(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    #[inline]
    pub fn write<T: BigEndianCodec>(&mut self, value: T) -> Result<()> {
        value.encode(self.claim(T::WIDTH)?);
        Ok(())
    }

    #[inline]
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write(value)
    }

    #[inline]
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write(value)
    }

    #[inline]
    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.write(value)
    }

    #[inline]
    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.write(value)
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write(value)
    }

    #[inline]
    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.write(value)
    }

    #[inline]
    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write(value)
    }

    /// Write `count` zero bytes.
    pub fn zero_fill(&mut self, count: usize) -> Result<()> {
        self.claim(count)?.fill(0);
        Ok(())
    }

    /// Zero-fill up to the next multiple of `alignment`, relative to the
    /// start of the target.
    pub fn pad_to_alignment(&mut self, alignment: usize) -> Result<()> {
        let aligned = align_up(self.position, alignment);
        self.zero_fill(aligned - self.position)
    }
}
