//! Length-prefixed strings and padded tails shared by the container, the
//! object table, the particle block and the curve name table.

use std::borrow::Cow;
use std::fmt;

use rekindle_common::{align4, BinaryWriter, Region};

use crate::{Error, Result};

/// A zero-terminated string stored as its declared bytes: the text, the
/// terminator, and anything after the terminator inside the declared length.
///
/// An untouched string re-encodes byte for byte. Text that is not UTF-8 is
/// kept as bytes and shown lossily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixedString<'a> {
    raw: Cow<'a, [u8]>,
    text: String,
}

impl<'a> PrefixedString<'a> {
    /// The `declared` bytes of `block` at `offset`.
    pub(crate) fn at(block: &Region<'a>, offset: usize, declared: usize) -> Result<Self> {
        let raw = block.sub(offset, declared)?;
        let text = raw.read_cstring(0, declared)?;
        Ok(Self {
            text: String::from_utf8_lossy(text).into_owned(),
            raw: Cow::Borrowed(raw.bytes()),
        })
    }

    /// Read a `(u16 len, len bytes)` string at `cursor`.
    pub(crate) fn read(block: &Region<'a>, cursor: usize) -> Result<Self> {
        let declared = block.read_u16(cursor)? as usize;
        Self::at(block, cursor + 2, declared)
    }

    /// `text` followed by a single terminator.
    pub fn new(text: &str) -> Result<Self> {
        validate_name(text)?;
        let mut raw = Vec::with_capacity(text.len() + 1);
        raw.extend_from_slice(text.as_bytes());
        raw.push(0);
        Ok(Self {
            raw: Cow::Owned(raw),
            text: text.to_string(),
        })
    }

    /// A string with a declared length of zero.
    pub fn absent() -> Self {
        Self {
            raw: Cow::Borrowed(&[]),
            text: String::new(),
        }
    }

    /// Text before the terminator, lossily decoded.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The declared bytes, terminator and trailing bytes included.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn declared(&self) -> usize {
        self.raw.len()
    }

    /// A declared length of 0 or 1 carries no text.
    pub fn is_absent(&self) -> bool {
        self.raw.len() <= 1
    }

    /// Size of the length prefix plus the declared bytes.
    pub(crate) fn encoded_size(&self) -> usize {
        2 + self.raw.len()
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter<'_>) -> Result<()> {
        writer.write_u16(crate::error::to_u16("string length", self.raw.len())?)?;
        writer.write_bytes(&self.raw)?;
        Ok(())
    }
}

impl Default for PrefixedString<'_> {
    fn default() -> Self {
        Self::absent()
    }
}

impl fmt::Display for PrefixedString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Reject names that cannot round-trip through a zero-terminated,
/// `u16`-length-prefixed field.
pub(crate) fn validate_name(name: &str) -> Result<()> {
    if name.as_bytes().contains(&0) {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "contains a zero byte",
        });
    }
    if name.len() + 1 > i16::MAX as usize {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "too long",
        });
    }
    Ok(())
}

/// Bytes after a run of prefixed strings: optional zero padding to 4, then
/// an opaque remainder kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PaddedTail<'a> {
    aligned: bool,
    bytes: Cow<'a, [u8]>,
}

impl<'a> PaddedTail<'a> {
    /// Split `block[cursor..]` into padding and remainder.
    pub(crate) fn parse(block: &Region<'a>, cursor: usize) -> Result<Self> {
        let rest = block.tail(cursor)?.bytes();
        let pad = align4(cursor) - cursor;

        if rest.len() >= pad && rest[..pad].iter().all(|&b| b == 0) {
            Ok(Self {
                aligned: true,
                bytes: Cow::Borrowed(&rest[pad..]),
            })
        } else {
            Ok(Self {
                aligned: false,
                bytes: Cow::Borrowed(rest),
            })
        }
    }

    pub(crate) fn aligned() -> Self {
        Self {
            aligned: true,
            bytes: Cow::Borrowed(&[]),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Encoded size when the strings end at `cursor`.
    pub(crate) fn size_after(&self, cursor: usize) -> usize {
        let padding = if self.aligned {
            align4(cursor) - cursor
        } else {
            0
        };
        padding + self.bytes.len()
    }

    pub(crate) fn write(&self, writer: &mut BinaryWriter<'_>) -> Result<()> {
        if self.aligned {
            writer.pad_to_alignment(4)?;
        }
        writer.write_bytes(&self.bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_prefixed() {
        let data = [0, 4, b'a', b'b', b'c', 0, 0, 1, 0];
        let region = Region::new(&data);

        let abc = PrefixedString::read(&region, 0).unwrap();
        assert_eq!((abc.declared(), abc.as_str()), (4, "abc"));
        assert!(!abc.is_absent());
        let empty = PrefixedString::read(&region, 6).unwrap();
        assert_eq!((empty.declared(), empty.as_str()), (1, ""));
        assert!(empty.is_absent());
        assert!(PrefixedString::read(&region, 7).is_err());
    }

    #[test]
    fn test_declared_bytes_are_kept() {
        let data = [0, 7, b'a', b'b', 0, 0xEE, 0xEE, 0, 0];
        let region = Region::new(&data);
        let padded = PrefixedString::read(&region, 0).unwrap();
        assert_eq!(padded.as_str(), "ab");
        assert_eq!(padded.encoded_size(), 9);

        let mut out = [0u8; 9];
        padded.write(&mut BinaryWriter::new(&mut out)).unwrap();
        assert_eq!(out, data);

        let fresh = PrefixedString::new("ab").unwrap();
        assert_eq!(fresh.raw(), b"ab\0");
        assert_eq!(PrefixedString::absent().declared(), 0);
    }

    #[test]
    fn test_non_utf8_text_is_lossy() {
        let raw = [b'f', 0x82, b'x', 0];
        let name = PrefixedString::at(&Region::new(&raw), 0, raw.len()).unwrap();
        assert_eq!(name.as_str(), "f\u{FFFD}x");
        assert_eq!(name.raw(), &raw);
        assert_eq!(name.to_string(), name.as_str());
    }

    #[test]
    fn test_padded_tail() {
        let data = [1, 2, 3, 0, 9, 9];
        let region = Region::new(&data);

        let tail = PaddedTail::parse(&region, 3).unwrap();
        assert!(tail.aligned);
        assert_eq!(&tail.bytes[..], &[9, 9]);
        assert_eq!(tail.size_after(3), 3);
        assert_eq!(tail.size_after(5), 5);

        let unaligned = PaddedTail::parse(&region, 2).unwrap();
        assert!(!unaligned.aligned);
        assert_eq!(unaligned.len(), 4);
        assert_eq!(unaligned.size_after(2), 4);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("ptcl_fire").is_ok());
        assert!(validate_name("bad\0name").is_err());
        assert!(validate_name(&"x".repeat(40_000)).is_err());
    }
}
