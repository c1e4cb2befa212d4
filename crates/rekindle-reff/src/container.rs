//! The REFF container: file header, identifier, object table, entries.
//!
//! | Offset | Type | Field |
//! |--------|------|-------|
//! | 0x00 | [u8; 4] | tag `REFF` |
//! | 0x04 | u16 | byte-order mark |
//! | 0x06 | u16 | version |
//! | 0x08 | u32 | file length |
//! | 0x0C | u16 | first block offset |
//! | 0x0E | u16 | block count |
//! | 0x10 | [u8; 4] | block tag `REFF` |
//! | 0x14 | i32 | data length, from 0x18 to the end |
//! | 0x18 | i32 | data offset, from 0x18 to the object table |
//! | 0x1C | i32 | previous link |
//! | 0x20 | i32 | next link |
//! | 0x24 | u16 | identifier length, terminator included |
//! | 0x26 | u16 | padding |
//! | 0x28 | cstring | identifier, zero padded to 4 |
//! | ... | bytes | extra header bytes, kept verbatim |
//! | T | | object table, then entry payloads |
//! | ... | bytes | trailing bytes after the last payload, kept verbatim |

use std::borrow::Cow;

use rekindle_common::{align4, BinaryWriter, Region};
use rekindle_node::{
    check_size, tree, unknown_field, BuildOptions, Field, FieldValue, Layout, Lifecycle,
    NodeState, TreeNode,
};
use tracing::{debug, instrument, warn};

use crate::entry::Entry;
use crate::error::{non_negative, to_i16, to_i32, to_u16, to_u32};
use crate::strings::PrefixedString;
use crate::table::{self, TableRecord};
use crate::{Error, Result};

/// Tag at the start of the file and of the block header.
pub const REFF_TAG: [u8; 4] = *b"REFF";

/// Offset of the block tag.
const BLOCK_TAG: usize = 0x10;
/// Anchor of the data length and data offset fields.
const DATA_ANCHOR: usize = 0x18;
/// Offset of the identifier string.
const NAME_OFFSET: usize = 0x28;

pub const DEFAULT_BYTE_ORDER: u16 = 0xFEFF;
pub const DEFAULT_VERSION: u16 = 0x0700;
/// Extra header bytes written after the identifier of a new container.
pub const DEFAULT_EXTRA_SIZE: usize = 8;

/// Whether `buffer` starts with the REFF tag.
pub fn is_reff(buffer: &[u8]) -> bool {
    buffer.starts_with(&REFF_TAG)
}

/// A REFF container and its entries.
#[derive(Debug, Clone)]
pub struct Reff<'a> {
    state: NodeState<'a>,
    name: PrefixedString<'a>,
    byte_order: u16,
    version: u16,
    first_offset: u16,
    block_count: u16,
    link_prev: i32,
    link_next: i32,
    padding: u16,
    extra: Cow<'a, [u8]>,
    table_reserved: i16,
    entries: Vec<Entry<'a>>,
    trailing: Cow<'a, [u8]>,
    /// Entry records and the table base, from `initialize` until `populate`.
    pending: Option<(Region<'a>, Vec<TableRecord<'a>>)>,
}

impl<'a> Reff<'a> {
    /// An empty container named `name`.
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            state: NodeState::synthetic(),
            name: PrefixedString::new(name)?,
            byte_order: DEFAULT_BYTE_ORDER,
            version: DEFAULT_VERSION,
            first_offset: BLOCK_TAG as u16,
            block_count: 1,
            link_prev: 0,
            link_next: 0,
            padding: 0,
            extra: Cow::Owned(vec![0; DEFAULT_EXTRA_SIZE]),
            table_reserved: 0,
            entries: Vec::new(),
            trailing: Cow::Borrowed(&[]),
            pending: None,
        })
    }

    /// Parse and populate a container.
    ///
    /// Unlike [`tree::load`], a buffer that is not a REFF container is an
    /// error here.
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        tree::load(buffer, ())?.ok_or_else(|| Error::TagMismatch {
            expected: REFF_TAG,
            actual: buffer.iter().take(REFF_TAG.len()).copied().collect(),
        })
    }

    /// Serialize, copying untouched subtrees from the source buffer.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.to_bytes_with(&BuildOptions::default())
    }

    pub fn to_bytes_with(&mut self, options: &BuildOptions) -> Result<Vec<u8>> {
        tree::build(self, options)
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The identifier as declared, terminator included.
    pub fn stored_name(&self) -> &PrefixedString<'a> {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.name = PrefixedString::new(name)?;
        self.state.invalidate();
        Ok(())
    }

    pub fn byte_order(&self) -> u16 {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, value: u16) {
        self.byte_order = value;
        self.state.invalidate();
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn set_version(&mut self, value: u16) {
        self.version = value;
        self.state.invalidate();
    }

    pub fn first_offset(&self) -> u16 {
        self.first_offset
    }

    pub fn block_count(&self) -> u16 {
        self.block_count
    }

    pub fn links(&self) -> (i32, i32) {
        (self.link_prev, self.link_next)
    }

    pub fn set_links(&mut self, prev: i32, next: i32) {
        self.link_prev = prev;
        self.link_next = next;
        self.state.invalidate();
    }

    pub fn padding(&self) -> u16 {
        self.padding
    }

    pub fn set_padding(&mut self, value: u16) {
        self.padding = value;
        self.state.invalidate();
    }

    /// Header bytes between the identifier and the object table.
    pub fn extra(&self) -> &[u8] {
        &self.extra
    }

    pub fn set_extra(&mut self, bytes: Vec<u8>) {
        self.extra = Cow::Owned(bytes);
        self.state.invalidate();
    }

    /// Bytes after the last entry payload.
    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }

    pub fn set_trailing(&mut self, bytes: Vec<u8>) {
        self.trailing = Cow::Owned(bytes);
        self.state.invalidate();
    }

    pub fn table_reserved(&self) -> i16 {
        self.table_reserved
    }

    pub fn set_table_reserved(&mut self, value: i16) {
        self.table_reserved = value;
        self.state.invalidate();
    }

    /// Offset of the object table from the start of the file.
    pub fn table_offset(&self) -> usize {
        NAME_OFFSET + align4(self.name.declared()) + self.extra.len()
    }

    /// Object table length for the current entry names.
    pub fn table_length(&self) -> usize {
        table::table_length(
            self.entries
                .iter()
                .map(|entry| entry.stored_name().declared()),
        )
    }

    pub fn entries(&self) -> &[Entry<'a>] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [Entry<'a>] {
        self.state.invalidate();
        &mut self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&Entry<'a>> {
        self.entries.get(index)
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut Entry<'a>> {
        self.state.invalidate();
        self.entries.get_mut(index)
    }

    /// First entry named `name`.
    pub fn find(&self, name: &str) -> Option<&Entry<'a>> {
        self.entries.iter().find(|entry| entry.name() == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name() == name)
    }

    pub fn push(&mut self, entry: Entry<'a>) {
        self.entries.push(entry);
        self.state.invalidate();
    }

    pub fn insert(&mut self, index: usize, entry: Entry<'a>) -> Result<()> {
        if index > self.entries.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.entries.insert(index, entry);
        self.state.invalidate();
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Entry<'a>> {
        if index >= self.entries.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        self.state.invalidate();
        Ok(self.entries.remove(index))
    }

    /// Move the entry at `from` so it ends up at `to`.
    pub fn move_entry(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.entries.len();
        for index in [from, to] {
            if index >= len {
                return Err(Error::IndexOutOfRange { index, len });
            }
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        self.state.invalidate();
        Ok(())
    }
}

impl<'a> Lifecycle<'a> for Reff<'a> {
    type Seed = ();
    type Error = Error;

    #[instrument(level = "debug", skip_all, fields(len = region.len()))]
    fn initialize(region: Region<'a>, _seed: ()) -> Result<Option<Self>> {
        let mut reader = region.reader();
        if let Err(err) = reader.expect_magic(&REFF_TAG) {
            debug!(%err, "missing file tag");
            return Ok(None);
        }
        reader.seek(BLOCK_TAG);
        if let Err(err) = reader.expect_magic(&REFF_TAG) {
            debug!(%err, "missing block tag");
            return Ok(None);
        }

        reader.seek(4);
        let byte_order = reader.read_u16()?;
        let version = reader.read_u16()?;
        let file_length = reader.read_u32()? as usize;
        let first_offset = reader.read_u16()?;
        let block_count = reader.read_u16()?;
        reader.seek(DATA_ANCHOR);
        let data_offset = non_negative("data offset", reader.read_i32()? as i64)?;
        let link_prev = reader.read_i32()?;
        let link_next = reader.read_i32()?;
        let name_len = reader.read_u16()? as usize;
        let padding = reader.read_u16()?;

        if file_length != region.len() {
            warn!(
                declared = file_length,
                actual = region.len(),
                "file length field disagrees with buffer"
            );
        }

        let name = PrefixedString::at(&region, NAME_OFFSET, name_len)?;
        let name_end = NAME_OFFSET + align4(name_len);
        let table_at = DATA_ANCHOR + data_offset;
        if table_at < name_end {
            return Err(Error::LengthMismatch {
                node: "container header",
                declared: table_at,
                consumed: name_end,
            });
        }
        let extra = region.sub(name_end, table_at - name_end)?;

        let base = region.tail(table_at)?;
        let table_len = non_negative("object table length", base.read_i32(0)? as i64)?;
        let count = non_negative("entry count", base.read_i16(4)? as i64)?;
        let table_reserved = base.read_i16(6)?;
        let records = table::walk(base.sub(0, table_len)?, count)?;
        let data_end = records
            .iter()
            .map(|record| record.offset as usize + record.length as usize)
            .fold(table_len, usize::max);
        let trailing = base.tail(data_end)?;
        debug!(
            identifier = %name,
            table_at,
            table_len,
            entries = records.len(),
            trailing = trailing.len(),
            "container header"
        );

        Ok(Some(Self {
            state: NodeState::parsed(region),
            name,
            byte_order,
            version,
            first_offset,
            block_count,
            link_prev,
            link_next,
            padding,
            extra: Cow::Borrowed(extra.bytes()),
            table_reserved,
            entries: Vec::with_capacity(records.len()),
            trailing: Cow::Borrowed(trailing.bytes()),
            pending: Some((base, records)),
        }))
    }

    #[instrument(level = "debug", skip_all, fields(identifier = %self.name))]
    fn populate(&mut self) -> Result<()> {
        let Some((base, records)) = self.pending.take() else {
            return Ok(());
        };
        for record in records {
            let region = base.sub(record.offset as usize, record.length as usize)?;
            let label = record.name.to_string();
            let Some(mut entry) = Entry::initialize(region, record.name)? else {
                warn!(entry = %label, "entry discarded");
                continue;
            };
            entry.populate()?;
            self.entries.push(entry);
        }
        self.state.mark_populated();
        Ok(())
    }

    fn calculate_size(&mut self, force: bool) -> Result<Layout> {
        let header = self.table_offset() + self.table_length();
        let trailing = self.trailing.len();
        let Self { state, entries, .. } = self;

        state.size_with(force, || {
            let children = entries
                .iter_mut()
                .map(|entry| entry.calculate_size(force))
                .collect::<Result<Vec<_>>>()?;
            Ok(Layout::node(header, children, trailing))
        })
    }

    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<()> {
        let table_at = self.table_offset();
        let table_len = self.table_length();
        let total = layout.size();
        let Self {
            state,
            name,
            byte_order,
            version,
            first_offset,
            block_count,
            link_prev,
            link_next,
            padding,
            extra,
            table_reserved,
            entries,
            trailing,
            ..
        } = self;

        state.rebuild_with(target, layout, |carved| {
            let mut writer = BinaryWriter::new(carved.header);
            writer.write_bytes(&REFF_TAG)?;
            writer.write_u16(*byte_order)?;
            writer.write_u16(*version)?;
            writer.write_u32(to_u32("file length", total)?)?;
            writer.write_u16(*first_offset)?;
            writer.write_u16(*block_count)?;
            writer.write_bytes(&REFF_TAG)?;
            writer.write_i32(to_i32("data length", total - DATA_ANCHOR)?)?;
            writer.write_i32(to_i32("data offset", table_at - DATA_ANCHOR)?)?;
            writer.write_i32(*link_prev)?;
            writer.write_i32(*link_next)?;
            writer.write_u16(to_u16("identifier length", name.declared())?)?;
            writer.write_u16(*padding)?;
            writer.write_bytes(name.raw())?;
            writer.pad_to_alignment(4)?;
            writer.write_bytes(extra)?;

            writer.write_i32(to_i32("object table length", table_len)?)?;
            writer.write_i16(to_i16("entry count", entries.len())?)?;
            writer.write_i16(*table_reserved)?;
            let mut offset = table_len;
            for (entry, child) in entries.iter().zip(layout.children()) {
                entry.stored_name().write(&mut writer)?;
                writer.write_u32(to_u32("entry offset", offset)?)?;
                writer.write_u32(to_u32("entry length", child.size())?)?;
                offset += child.size();
            }
            writer.zero_fill(writer.remaining())?;

            for ((entry, window), child) in entries
                .iter_mut()
                .zip(carved.children)
                .zip(layout.children())
            {
                entry.rebuild(window, child)?;
            }
            check_size(carved.trailing.len(), trailing.len())?;
            carved.trailing.copy_from_slice(trailing);
            Ok(())
        })
    }

    fn state(&self) -> &NodeState<'a> {
        &self.state
    }
}

impl TreeNode for Reff<'_> {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn kind(&self) -> &'static str {
        "reff"
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::at("byte_order", 0x04, self.byte_order),
            Field::at("version", 0x06, self.version),
            Field::at("first_offset", 0x0C, self.first_offset),
            Field::at("block_count", 0x0E, self.block_count),
            Field::at("link_prev", 0x1C, self.link_prev),
            Field::at("link_next", 0x20, self.link_next),
            Field::at("padding", 0x26, self.padding),
            Field::at("name", NAME_OFFSET, self.name()),
            Field::new("extra", FieldValue::Opaque(self.extra.len())),
            Field::new("trailing", FieldValue::Opaque(self.trailing.len())),
            Field::new("table_reserved", self.table_reserved),
        ]
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> rekindle_node::Result<()> {
        match name {
            "byte_order" => self.byte_order = value.try_into()?,
            "version" => self.version = value.try_into()?,
            "first_offset" => self.first_offset = value.try_into()?,
            "block_count" => self.block_count = value.try_into()?,
            "link_prev" => self.link_prev = value.try_into()?,
            "link_next" => self.link_next = value.try_into()?,
            "padding" => self.padding = value.try_into()?,
            "table_reserved" => self.table_reserved = value.try_into()?,
            "name" => {
                let text: String = value.try_into()?;
                return self.rename(&text);
            }
            _ => return Err(unknown_field(self.kind(), name)),
        }
        self.state.invalidate();
        Ok(())
    }

    fn rename(&mut self, name: &str) -> rekindle_node::Result<()> {
        self.set_name(name).map_err(Error::into_node)
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        self.entries
            .iter()
            .map(|entry| entry as &dyn TreeNode)
            .collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
        self.state.invalidate();
        self.entries
            .iter_mut()
            .map(|entry| entry as &mut dyn TreeNode)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut reff = Reff::new("effect").unwrap();
        reff.push(Entry::new("A").unwrap());
        reff.push(Entry::new("BB").unwrap());
        reff.to_bytes().unwrap()
    }

    #[test]
    fn test_new_container_header() {
        let bytes = sample();
        assert_eq!(&bytes[0..4], b"REFF");
        assert_eq!(&bytes[0x10..0x14], b"REFF");
        assert_eq!(u32::from_be_bytes(bytes[8..12].try_into().unwrap()) as usize, bytes.len());
        assert_eq!(
            i32::from_be_bytes(bytes[0x14..0x18].try_into().unwrap()) as usize,
            bytes.len() - 0x18
        );
        // "effect\0" pads to 8, plus 8 extra bytes
        assert_eq!(i32::from_be_bytes(bytes[0x18..0x1C].try_into().unwrap()), 0x10 + 8 + 8);
        assert_eq!(u16::from_be_bytes([bytes[0x24], bytes[0x25]]), 7);
        assert_eq!(&bytes[0x28..0x2F], b"effect\0");
    }

    #[test]
    fn test_parse_entries() {
        let bytes = sample();
        let reff = Reff::parse(&bytes).unwrap();
        assert_eq!(reff.name(), "effect");
        assert_eq!(reff.version(), DEFAULT_VERSION);
        assert_eq!(reff.entries().len(), 2);
        assert_eq!(reff.entries()[1].name(), "BB");
        assert_eq!(reff.extra(), &[0u8; 8]);
        assert_eq!(reff.table_length(), 36);
        assert!(reff.find("A").is_some());
        assert!(reff.find("C").is_none());
    }

    #[test]
    fn test_first_entry_follows_table() {
        let bytes = sample();
        let reff = Reff::parse(&bytes).unwrap();
        let t = reff.table_offset();
        let first_offset = u32::from_be_bytes(bytes[t + 12..t + 16].try_into().unwrap());
        assert_eq!(first_offset as usize, reff.table_length());
    }

    #[test]
    fn test_not_reff() {
        assert!(!is_reff(b"RIFF"));
        let result = tree::load::<Reff>(b"RIFF0000", ()).unwrap();
        assert!(result.is_none());
        assert!(matches!(
            Reff::parse(b"RIF"),
            Err(Error::TagMismatch { .. })
        ));
    }

    #[test]
    fn test_block_tag_checked() {
        let mut bytes = sample();
        bytes[0x10] = b'X';
        assert!(tree::load::<Reff>(&bytes, ()).unwrap().is_none());
    }

    #[test]
    fn test_reorder_entries() {
        let bytes = sample();
        let mut reff = Reff::parse(&bytes).unwrap();
        reff.move_entry(1, 0).unwrap();
        assert!(reff.move_entry(0, 9).is_err());
        let out = reff.to_bytes().unwrap();

        let reparsed = Reff::parse(&out).unwrap();
        let names: Vec<_> = reparsed.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["BB", "A"]);
        assert_eq!(out.len(), bytes.len());
    }

    #[test]
    fn test_trailing_bytes_survive_rebuild() {
        let mut bytes = sample();
        bytes.extend_from_slice(&[0xEE; 12]);
        let total = bytes.len() as u32;
        bytes[8..12].copy_from_slice(&total.to_be_bytes());
        bytes[0x14..0x18].copy_from_slice(&(total - 0x18).to_be_bytes());

        let mut reff = Reff::parse(&bytes).unwrap();
        assert_eq!(reff.trailing(), &[0xEEu8; 12]);
        let forced = reff.to_bytes_with(&BuildOptions::forced()).unwrap();
        assert_eq!(forced, bytes);

        reff.set_version(0x0800);
        let derived = reff.to_bytes().unwrap();
        assert_eq!(derived.len(), bytes.len());
        assert_eq!(&derived[..6], &bytes[..6]);
        assert_eq!(&derived[6..8], &0x0800u16.to_be_bytes());
        assert_eq!(&derived[8..], &bytes[8..]);
    }

    #[test]
    fn test_identifier_declared_bytes_kept() {
        let mut bytes = sample();
        // the zero pad byte after "effect\0" joins the declared identifier
        bytes[0x25] = 8;
        let mut reff = Reff::parse(&bytes).unwrap();
        assert_eq!(reff.name(), "effect");
        assert_eq!(reff.stored_name().declared(), 8);

        reff.set_links(1, 2);
        let out = reff.to_bytes().unwrap();
        assert_eq!(out.len(), bytes.len());
        assert_eq!(out[0x25], 8);
        assert_eq!(Reff::parse(&out).unwrap().links(), (1, 2));
    }
}
