//! The object table: a directory of named payloads whose offsets are
//! relative to the table base.
//!
//! | Offset | Type | Field |
//! |--------|------|-------|
//! | 0x00 | i32 | table length (4-aligned) |
//! | 0x04 | i16 | entry count |
//! | 0x06 | i16 | reserved |
//! | 0x08 | ... | entries |
//!
//! Each entry is `u16 nameLen`, `nameLen` name bytes (terminator included),
//! `u32 offset`, `u32 length`; the next entry begins `nameLen + 10` bytes
//! after the current one.

use rekindle_common::{align4, Region};
use tracing::trace;

use crate::strings::PrefixedString;
use crate::Result;

/// Size of the table header before the first entry.
pub const TABLE_HEADER_SIZE: usize = 8;

/// One decoded table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord<'a> {
    /// Offset of the entry from the table base.
    pub base: usize,
    /// The name field as declared, terminator included.
    pub name: PrefixedString<'a>,
    /// Payload offset from the table base.
    pub offset: u32,
    pub length: u32,
}

/// Distance from one entry to the next.
#[inline]
pub const fn entry_stride(name_len: usize) -> usize {
    2 + name_len + 8
}

/// Walk `count` entries of the table starting at the base of `table`.
pub fn walk<'a>(table: Region<'a>, count: usize) -> Result<Vec<TableRecord<'a>>> {
    let mut records = Vec::with_capacity(count);
    let mut cursor = TABLE_HEADER_SIZE;

    for _ in 0..count {
        let name = PrefixedString::read(&table, cursor)?;
        let stride = entry_stride(name.declared());
        let fields = cursor + name.encoded_size();

        let record = TableRecord {
            base: cursor,
            name,
            offset: table.read_u32(fields)?,
            length: table.read_u32(fields + 4)?,
        };
        trace!(
            name = %record.name,
            base = record.base,
            offset = record.offset,
            length = record.length,
            "table entry"
        );
        records.push(record);
        cursor += stride;
    }

    Ok(records)
}

/// Table byte length for entries whose name fields declare the given
/// lengths, terminator included: `align4(9 + sum(len + 10))`.
///
/// For names written with a single terminator this is the familiar
/// `align4(9 + sum(text + 11))`.
pub fn table_length(declared: impl IntoIterator<Item = usize>) -> usize {
    align4(9 + declared.into_iter().map(|len| len + 10).sum::<usize>())
}
