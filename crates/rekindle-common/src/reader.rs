//! Sequential big-endian reader over byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! binary data from a byte slice without copying.

use crate::endian::BigEndianCodec;
use crate::{Error, Result};

/// A binary reader that provides zero-copy, big-endian reading from a byte slice.
///
/// # Example
///
/// ```
/// use rekindle_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0xFF, 0xFE];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x01020304);
/// assert_eq!(reader.read_i16().unwrap(), -2);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Advance the position by a number of bytes.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::OutOfBounds {
                offset: self.position,
                width: count,
                len: self.data.len(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read any fixed-width big-endian value.
    #[inline]
    pub fn read<T: BigEndianCodec>(&mut self) -> Result<T> {
        self.read_bytes(T::WIDTH).map(T::decode)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read()
    }

    /// Read a signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read()
    }

    /// Read a big-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read()
    }

    /// Read a big-endian i16.
    #[inline]
    pub fn read_i16(&mut self) -> Result<i16> {
        self.read()
    }

    /// Read a big-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read()
    }

    /// Read a big-endian i32.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read()
    }

    /// Read a big-endian f32.
    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read()
    }

    /// Expect specific magic bytes.
    pub fn expect_magic(&mut self, expected: &[u8]) -> Result<()> {
        let actual = self.read_bytes(expected.len())?;
        if actual != expected {
            return Err(Error::InvalidMagic {
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_primitives() {
        let data = [
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x01020304
            0xFF, 0xFF, 0xFF, 0xFE, // i32: -2
        ];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x01020304);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_eof_error() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data);

        assert!(matches!(
            reader.read_u32(),
            Err(Error::OutOfBounds { width: 4, .. })
        ));
    }

    #[test]
    fn test_expect_magic() {
        let mut reader = BinaryReader::new(b"REFFREFE");
        assert!(reader.expect_magic(b"REFF").is_ok());
        assert!(matches!(
            reader.expect_magic(b"REFF"),
            Err(Error::InvalidMagic { .. })
        ));
    }
}
