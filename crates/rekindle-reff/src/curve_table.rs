//! Animation curve sub-tables.
//!
//! Every table starts with `u16 count, u16 pad`. Generic tables follow with
//! `count` equal-stride records of `(len - 4) / count` bytes each; the name
//! table follows with `count` u32 slots and `count` length-prefixed strings.
//! A table with a zero count is semantically empty.

use std::borrow::Cow;
use std::fmt;

use rekindle_common::{BinaryWriter, Region};
use rekindle_node::{
    check_size, unknown_field, Field, FieldValue, Layout, Lifecycle, NodeState, TreeNode,
};
use tracing::trace;

use crate::error::to_u16;
use crate::strings::{PaddedTail, PrefixedString};
use crate::{Error, Result};

/// Size of the `count, pad` header shared by every table.
pub const TABLE_PREFIX_SIZE: usize = 4;

/// Which of the five curve slots a table occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Key,
    Range,
    Random,
    Name,
    Info,
}

impl TableKind {
    /// Slot order inside a curve.
    pub const ALL: [TableKind; 5] = [
        TableKind::Key,
        TableKind::Range,
        TableKind::Random,
        TableKind::Name,
        TableKind::Info,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TableKind::Key => "Key Table",
            TableKind::Range => "Range Table",
            TableKind::Random => "Random Table",
            TableKind::Name => "Name Table",
            TableKind::Info => "Info Table",
        }
    }

    /// Index of this slot in [`Self::ALL`].
    pub fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A key, range, random, or info table of opaque fixed-stride records.
#[derive(Debug, Clone)]
pub struct CurveTable<'a> {
    state: NodeState<'a>,
    kind: TableKind,
    pad: u16,
    stride: usize,
    records: Vec<Cow<'a, [u8]>>,
    tail: Cow<'a, [u8]>,
}

impl<'a> CurveTable<'a> {
    /// An in-memory table with records of `stride` bytes.
    pub fn new(kind: TableKind, stride: usize) -> Self {
        Self {
            state: NodeState::synthetic(),
            kind,
            pad: 0,
            stride,
            records: Vec::new(),
            tail: Cow::Borrowed(&[]),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pad(&self) -> u16 {
        self.pad
    }

    pub fn set_pad(&mut self, pad: u16) {
        self.pad = pad;
        self.state.invalidate();
    }

    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.records.iter().map(|record| &record[..])
    }

    pub fn record(&self, index: usize) -> Option<&[u8]> {
        self.records.get(index).map(|record| &record[..])
    }

    fn check_stride(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.stride {
            return Err(Error::StrideMismatch {
                expected: self.stride,
                actual: bytes.len(),
            });
        }
        Ok(())
    }

    /// Overwrite one record. `bytes` must be exactly one stride long.
    pub fn set_record(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        self.check_stride(bytes)?;
        let len = self.records.len();
        let record = self
            .records
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        *record = Cow::Owned(bytes.to_vec());
        self.state.invalidate();
        Ok(())
    }

    pub fn push_record(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_stride(bytes)?;
        self.records.push(Cow::Owned(bytes.to_vec()));
        self.state.invalidate();
        Ok(())
    }

    pub fn remove_record(&mut self, index: usize) -> Result<Vec<u8>> {
        if index >= self.records.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.records.len(),
            });
        }
        self.state.invalidate();
        Ok(self.records.remove(index).into_owned())
    }

    fn encoded_size(&self) -> usize {
        TABLE_PREFIX_SIZE + self.records.len() * self.stride + self.tail.len()
    }
}

impl<'a> Lifecycle<'a> for CurveTable<'a> {
    type Seed = TableKind;
    type Error = Error;

    fn initialize(region: Region<'a>, kind: TableKind) -> Result<Option<Self>> {
        let count = region.read_u16(0)? as usize;
        if count == 0 {
            return Ok(None);
        }
        let pad = region.read_u16(2)?;
        let stride = (region.len() - TABLE_PREFIX_SIZE) / count;

        let records = (0..count)
            .map(|i| {
                region
                    .sub(TABLE_PREFIX_SIZE + i * stride, stride)
                    .map(|r| Cow::Borrowed(r.bytes()))
            })
            .collect::<rekindle_common::Result<Vec<_>>>()?;
        let tail = region.tail(TABLE_PREFIX_SIZE + count * stride)?.bytes();
        trace!(%kind, count, stride, tail = tail.len(), "curve table");

        Ok(Some(Self {
            state: NodeState::parsed(region),
            kind,
            pad,
            stride,
            records,
            tail: Cow::Borrowed(tail),
        }))
    }

    fn populate(&mut self) -> Result<()> {
        self.state.mark_populated();
        Ok(())
    }

    fn calculate_size(&mut self, force: bool) -> Result<Layout> {
        let size = self.encoded_size();
        self.state.size_with(force, || Ok(Layout::leaf(size)))
    }

    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<()> {
        let Self {
            state,
            pad,
            records,
            tail,
            ..
        } = self;

        state.rebuild_with(target, layout, |carved| {
            let expected = carved.header.len();
            let mut writer = BinaryWriter::new(carved.header);
            writer.write_u16(to_u16("table count", records.len())?)?;
            writer.write_u16(*pad)?;
            for record in records.iter() {
                writer.write_bytes(record)?;
            }
            writer.write_bytes(tail)?;
            check_size(expected, writer.position())?;
            Ok(())
        })
    }

    fn state(&self) -> &NodeState<'a> {
        &self.state
    }
}

impl TreeNode for CurveTable<'_> {
    fn name(&self) -> String {
        self.kind.label().to_string()
    }

    fn kind(&self) -> &'static str {
        "curve-table"
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("count", self.count() as u32),
            Field::at("pad", 2, self.pad),
            Field::new("stride", self.stride as u32),
            Field::new("records", FieldValue::Opaque(self.records.len() * self.stride)),
            Field::new("tail", FieldValue::Opaque(self.tail.len())),
        ]
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> rekindle_node::Result<()> {
        match name {
            "pad" => self.set_pad(value.try_into()?),
            _ => return Err(unknown_field(TreeNode::kind(self), name)),
        }
        Ok(())
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        Vec::new()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
        Vec::new()
    }
}

/// The name table: opaque u32 slots followed by length-prefixed names.
#[derive(Debug, Clone)]
pub struct NameTable<'a> {
    state: NodeState<'a>,
    pad: u16,
    slots: Vec<u32>,
    names: Vec<PrefixedString<'a>>,
    tail: PaddedTail<'a>,
}

impl<'a> NameTable<'a> {
    pub fn new() -> Self {
        Self {
            state: NodeState::synthetic(),
            pad: 0,
            slots: Vec::new(),
            names: Vec::new(),
            tail: PaddedTail::aligned(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.names.iter().map(PrefixedString::as_str).collect()
    }

    /// The names as stored, declared bytes included.
    pub fn entries(&self) -> &[PrefixedString<'a>] {
        &self.names
    }

    pub fn pad(&self) -> u16 {
        self.pad
    }

    pub fn set_pad(&mut self, pad: u16) {
        self.pad = pad;
        self.state.invalidate();
    }

    /// The opaque u32 slot paired with each name.
    pub fn slots(&self) -> &[u32] {
        &self.slots
    }

    pub fn set_name(&mut self, index: usize, name: &str) -> Result<()> {
        let encoded = PrefixedString::new(name)?;
        let len = self.names.len();
        let slot = self
            .names
            .get_mut(index)
            .ok_or(Error::IndexOutOfRange { index, len })?;
        *slot = encoded;
        self.state.invalidate();
        Ok(())
    }

    pub fn push_name(&mut self, name: &str) -> Result<()> {
        self.names.push(PrefixedString::new(name)?);
        self.slots.push(0);
        self.state.invalidate();
        Ok(())
    }

    pub fn remove_name(&mut self, index: usize) -> Result<PrefixedString<'a>> {
        if index >= self.names.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.names.len(),
            });
        }
        self.slots.remove(index);
        self.state.invalidate();
        Ok(self.names.remove(index))
    }

    /// Replace every name, keeping existing slots and zero-filling new ones.
    /// A name equal to the one already at its index keeps its declared bytes.
    pub fn replace_names<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let names = names
            .iter()
            .enumerate()
            .map(|(index, name)| match self.names.get(index) {
                Some(existing) if existing.as_str() == name.as_ref() => Ok(existing.clone()),
                _ => PrefixedString::new(name.as_ref()),
            })
            .collect::<Result<Vec<_>>>()?;
        self.names = names;
        self.slots.resize(self.names.len(), 0);
        self.state.invalidate();
        Ok(())
    }

    fn encoded_size(&self) -> usize {
        let cursor = TABLE_PREFIX_SIZE
            + self.slots.len() * 4
            + self
                .names
                .iter()
                .map(PrefixedString::encoded_size)
                .sum::<usize>();
        cursor + self.tail.size_after(cursor)
    }
}

impl Default for NameTable<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Lifecycle<'a> for NameTable<'a> {
    type Seed = ();
    type Error = Error;

    fn initialize(region: Region<'a>, _seed: ()) -> Result<Option<Self>> {
        let count = region.read_u16(0)? as usize;
        if count == 0 {
            return Ok(None);
        }
        let pad = region.read_u16(2)?;

        let mut reader = region.sub(TABLE_PREFIX_SIZE, count * 4)?.reader();
        let slots = (0..count)
            .map(|_| reader.read_u32())
            .collect::<rekindle_common::Result<Vec<_>>>()?;

        let mut cursor = TABLE_PREFIX_SIZE + count * 4;
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            let name = PrefixedString::read(&region, cursor)?;
            cursor += name.encoded_size();
            names.push(name);
        }
        trace!(
            names = ?names.iter().map(PrefixedString::as_str).collect::<Vec<_>>(),
            "curve name table"
        );

        Ok(Some(Self {
            state: NodeState::parsed(region),
            pad,
            slots,
            names,
            tail: PaddedTail::parse(&region, cursor)?,
        }))
    }

    fn populate(&mut self) -> Result<()> {
        self.state.mark_populated();
        Ok(())
    }

    fn calculate_size(&mut self, force: bool) -> Result<Layout> {
        let size = self.encoded_size();
        self.state.size_with(force, || Ok(Layout::leaf(size)))
    }

    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<()> {
        let Self {
            state,
            pad,
            slots,
            names,
            tail,
        } = self;

        state.rebuild_with(target, layout, |carved| {
            let expected = carved.header.len();
            let mut writer = BinaryWriter::new(carved.header);
            writer.write_u16(to_u16("name count", names.len())?)?;
            writer.write_u16(*pad)?;
            for slot in slots.iter() {
                writer.write_u32(*slot)?;
            }
            for name in names.iter() {
                name.write(&mut writer)?;
            }
            tail.write(&mut writer)?;
            check_size(expected, writer.position())?;
            Ok(())
        })
    }

    fn state(&self) -> &NodeState<'a> {
        &self.state
    }
}

impl TreeNode for NameTable<'_> {
    fn name(&self) -> String {
        TableKind::Name.label().to_string()
    }

    fn kind(&self) -> &'static str {
        "name-table"
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("count", self.names.len() as u32),
            Field::at("pad", 2, self.pad),
            Field::new("names", self.names().join(",")),
        ]
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> rekindle_node::Result<()> {
        match name {
            "pad" => self.set_pad(value.try_into()?),
            "names" => {
                let joined = String::try_from(value)?;
                let names: Vec<&str> = if joined.is_empty() {
                    Vec::new()
                } else {
                    joined.split(',').map(str::trim).collect()
                };
                self.replace_names(&names).map_err(Error::into_node)?;
            }
            _ => return Err(unknown_field(self.kind(), name)),
        }
        Ok(())
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        Vec::new()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekindle_node::{tree, BuildOptions};

    #[test]
    fn test_generic_table_stride() {
        // count 2, pad 0x10, two 6-byte records, 1 tail byte
        let mut data = vec![0, 2, 0, 0x10];
        data.extend_from_slice(&[1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2, 9]);
        let table: CurveTable = tree::load(&data, TableKind::Key).unwrap().unwrap();

        assert_eq!(table.count(), 2);
        assert_eq!(table.stride(), 6);
        assert_eq!(table.pad(), 0x10);
        assert_eq!(table.record(1), Some(&[2u8, 2, 2, 2, 2, 2][..]));
    }

    #[test]
    fn test_zero_count_is_empty() {
        let data = [0u8, 0, 0, 0, 5, 5];
        assert!(tree::load::<CurveTable>(&data, TableKind::Range)
            .unwrap()
            .is_none());
        assert!(tree::load::<NameTable>(&data, ()).unwrap().is_none());
    }

    #[test]
    fn test_edit_records() {
        let data = [0u8, 1, 0, 0, 7, 7, 7, 7];
        let mut table: CurveTable = tree::load(&data, TableKind::Info).unwrap().unwrap();

        assert!(matches!(
            table.push_record(&[1, 2]),
            Err(Error::StrideMismatch { expected: 4, .. })
        ));
        table.push_record(&[1, 2, 3, 4]).unwrap();
        table.set_record(0, &[0, 0, 0, 1]).unwrap();

        let bytes = tree::build(&mut table, &BuildOptions::default()).unwrap();
        assert_eq!(bytes, vec![0, 2, 0, 0, 0, 0, 0, 1, 1, 2, 3, 4]);
    }

    fn name_table_bytes() -> Vec<u8> {
        let mut data = vec![0, 2, 0, 0];
        data.extend_from_slice(&[0, 0, 0, 0xA, 0, 0, 0, 0xB]);
        data.extend_from_slice(&[0, 4, b'r', b'o', b't', 0]);
        data.extend_from_slice(&[0, 2, b's', 0]);
        // 4 + 8 + 6 + 4 = 22, pad to 24
        data.extend_from_slice(&[0, 0]);
        data
    }

    #[test]
    fn test_name_table_parse() {
        let data = name_table_bytes();
        let table: NameTable = tree::load(&data, ()).unwrap().unwrap();
        assert_eq!(table.names(), ["rot", "s"]);
        assert_eq!(table.slots(), &[0xA, 0xB]);
    }

    #[test]
    fn test_name_table_forced_rebuild() {
        let data = name_table_bytes();
        let mut table: NameTable = tree::load(&data, ()).unwrap().unwrap();
        let bytes = tree::build(&mut table, &BuildOptions::forced()).unwrap();
        assert_eq!(bytes, data);
    }

    #[test]
    fn test_name_table_edit() {
        let data = name_table_bytes();
        let mut table: NameTable = tree::load(&data, ()).unwrap().unwrap();
        table
            .set_field("names", FieldValue::Text("translate, s, alpha".into()))
            .unwrap();

        let bytes = tree::build(&mut table, &BuildOptions::default()).unwrap();
        assert_eq!(bytes.len() % 4, 0);
        let reparsed: NameTable = tree::load(&bytes, ()).unwrap().unwrap();
        assert_eq!(reparsed.names(), ["translate", "s", "alpha"]);
        assert_eq!(reparsed.slots(), &[0xA, 0xB, 0]);
    }

    #[test]
    fn test_name_table_keeps_untouched_declared_bytes() {
        // "rot" declares 6 bytes: text, terminator, two trailing bytes
        let mut data = vec![0, 2, 0, 0];
        data.extend_from_slice(&[0, 0, 0, 0xA, 0, 0, 0, 0xB]);
        data.extend_from_slice(&[0, 6, b'r', b'o', b't', 0, 0x5A, 0x5A]);
        data.extend_from_slice(&[0, 2, b's', 0]);
        // 4 + 8 + 8 + 4 = 24
        let mut table: NameTable = tree::load(&data, ()).unwrap().unwrap();
        assert_eq!(table.entries()[0].declared(), 6);
        let forced = tree::build(&mut table, &BuildOptions::forced()).unwrap();
        assert_eq!(forced, data);

        table
            .set_field("names", FieldValue::Text("rot,scale".into()))
            .unwrap();
        let bytes = tree::build(&mut table, &BuildOptions::default()).unwrap();
        assert_eq!(&bytes[12..20], &data[12..20]);

        let reparsed: NameTable = tree::load(&bytes, ()).unwrap().unwrap();
        assert_eq!(reparsed.names(), ["rot", "scale"]);
        assert_eq!(reparsed.entries()[0].raw(), b"rot\0\x5A\x5A");
    }
}
