//! Animation curves.
//!
//! | Offset | Type | Field |
//! |--------|------|-------|
//! | 0x00 | u8 | magic |
//! | 0x01 | u8 | kind type (animated target) |
//! | 0x02 | u8 | curve flag ([`CurveType`]) |
//! | 0x03 | u8 | kind enable |
//! | 0x04 | u8 | process flag ([`ProcessFlags`]) |
//! | 0x05 | u8 | loop count |
//! | 0x06 | u16 | random seed |
//! | 0x08 | u16 | frame length |
//! | 0x0A | u16 | padding |
//! | 0x0C | 5 x u32 | key, range, random, name, info table sizes |
//!
//! The five tables follow the header back to back. A table is only decoded
//! when its declared size exceeds 4 bytes; smaller slots are kept as raw
//! bytes.

use std::borrow::Cow;

use rekindle_common::{endian, Region};
use rekindle_node::{
    be_fields, check_size, unknown_field, Field, FieldValue, Layout, Lifecycle, NodeState,
    TreeNode,
};
use tracing::{debug, warn};

use crate::curve_table::{CurveTable, NameTable, TableKind};
use crate::error::to_u32;
use crate::{Error, Result};

/// Size of the fixed curve header.
pub const CURVE_HEADER_SIZE: usize = 0x20;

/// Offset of the first table size field.
const TABLE_SIZES: usize = 0x0C;

/// Smallest slot size that holds a decodable table.
const MIN_TABLE_SIZE: usize = 5;

/// Values of the curve flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurveType {
    ParticleByte = 0,
    PostField = 2,
    ParticleFloat = 3,
    ParticleTexture = 4,
    Child = 5,
    ParticleRotate = 6,
    Field = 7,
    EmitterFloat = 11,
}

impl TryFrom<u8> for CurveType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        Ok(match value {
            0 => CurveType::ParticleByte,
            2 => CurveType::PostField,
            3 => CurveType::ParticleFloat,
            4 => CurveType::ParticleTexture,
            5 => CurveType::Child,
            6 => CurveType::ParticleRotate,
            7 => CurveType::Field,
            11 => CurveType::EmitterFloat,
            other => return Err(other),
        })
    }
}

/// Bits of the process flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ProcessFlags(pub u8);

impl ProcessFlags {
    pub const SYNC_RANDOM: u8 = 0x04;
    pub const STOP: u8 = 0x08;
    pub const EMITTER_TIMING: u8 = 0x10;
    pub const INFINITE_LOOP: u8 = 0x20;
    pub const TURN: u8 = 0x40;
    pub const FITTING: u8 = 0x80;

    #[inline]
    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit == bit
    }
}

/// One of the five table slots of a curve.
#[derive(Debug, Clone)]
pub enum Slot<'a, T> {
    Present(T),
    /// Undecoded slot bytes, written back as-is.
    Empty(Cow<'a, [u8]>),
}

/// A table slot with no records: count 0, pad 0.
const EMPTY_TABLE_MARKER: [u8; 4] = [0; 4];

impl<T> Slot<'_, T> {
    /// A slot holding only the empty-table marker.
    pub fn marker() -> Self {
        Slot::Empty(Cow::Borrowed(&EMPTY_TABLE_MARKER))
    }

    pub fn table(&self) -> Option<&T> {
        match self {
            Slot::Present(table) => Some(table),
            Slot::Empty(_) => None,
        }
    }

    pub fn table_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Present(table) => Some(table),
            Slot::Empty(_) => None,
        }
    }
}

impl<T> Default for Slot<'_, T> {
    fn default() -> Self {
        Self::marker()
    }
}

/// What the track list knows about a curve before it is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CurveSeed {
    /// Position of the curve across both track arrays.
    pub index: usize,
    /// Value of the curve's entry in the placeholder array.
    pub placeholder: u32,
}

/// A single animation curve with its optional tables.
#[derive(Debug, Clone)]
pub struct AnimCurve<'a> {
    state: NodeState<'a>,
    index: usize,
    placeholder: u32,
    header: Cow<'a, [u8]>,
    key: Slot<'a, CurveTable<'a>>,
    range: Slot<'a, CurveTable<'a>>,
    random: Slot<'a, CurveTable<'a>>,
    names: Slot<'a, NameTable<'a>>,
    info: Slot<'a, CurveTable<'a>>,
}

be_fields! {
    AnimCurve {
        magic, set_magic: u8 = 0x00;
        kind_type, set_kind_type: u8 = 0x01;
        curve_flag, set_curve_flag: u8 = 0x02;
        kind_enable, set_kind_enable: u8 = 0x03;
        process_flag, set_process_flag: u8 = 0x04;
        loop_count, set_loop_count: u8 = 0x05;
        /// Seed for per-particle randomization at playback time.
        random_seed, set_random_seed: u16 = 0x06;
        frame_length, set_frame_length: u16 = 0x08;
        padding, set_padding: u16 = 0x0A;
    }
}

const SIZE_FIELDS: [&str; 5] = [
    "key_table_size",
    "range_table_size",
    "random_table_size",
    "name_table_size",
    "info_table_size",
];

impl<'a> AnimCurve<'a> {
    /// An in-memory curve whose five slots hold the empty-table marker.
    pub fn new(kind_type: u8, curve_type: CurveType) -> Self {
        let mut curve = Self {
            state: NodeState::synthetic(),
            index: 0,
            placeholder: 0,
            header: Cow::Owned(vec![0; CURVE_HEADER_SIZE]),
            key: Slot::marker(),
            range: Slot::marker(),
            random: Slot::marker(),
            names: Slot::marker(),
            info: Slot::marker(),
        };
        curve.set_kind_type(kind_type);
        curve.set_curve_flag(curve_type as u8);
        curve
    }

    fn raw(&self) -> &[u8] {
        &self.header
    }

    fn raw_mut(&mut self) -> &mut [u8] {
        self.state.invalidate();
        self.header.to_mut()
    }

    /// Display name, `AnimCurve{index}`.
    pub fn label(&self) -> String {
        format!("AnimCurve{}", self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn placeholder(&self) -> u32 {
        self.placeholder
    }

    pub fn set_placeholder(&mut self, value: u32) {
        self.placeholder = value;
        self.state.invalidate();
    }

    pub fn curve_type(&self) -> Option<CurveType> {
        CurveType::try_from(self.curve_flag()).ok()
    }

    pub fn process_flags(&self) -> ProcessFlags {
        ProcessFlags(self.process_flag())
    }

    /// Table sizes as currently declared in the header.
    pub fn declared_table_sizes(&self) -> [u32; 5] {
        std::array::from_fn(|i| endian::read_u32(&self.header, TABLE_SIZES + i * 4).unwrap_or(0))
    }

    pub fn table(&self, kind: TableKind) -> Option<&CurveTable<'a>> {
        match kind {
            TableKind::Key => self.key.table(),
            TableKind::Range => self.range.table(),
            TableKind::Random => self.random.table(),
            TableKind::Info => self.info.table(),
            TableKind::Name => None,
        }
    }

    pub fn table_mut(&mut self, kind: TableKind) -> Option<&mut CurveTable<'a>> {
        self.state.invalidate();
        match kind {
            TableKind::Key => self.key.table_mut(),
            TableKind::Range => self.range.table_mut(),
            TableKind::Random => self.random.table_mut(),
            TableKind::Info => self.info.table_mut(),
            TableKind::Name => None,
        }
    }

    pub fn name_table(&self) -> Option<&NameTable<'a>> {
        self.names.table()
    }

    pub fn name_table_mut(&mut self) -> Option<&mut NameTable<'a>> {
        self.state.invalidate();
        self.names.table_mut()
    }

    /// Install or clear a generic table; a cleared slot holds the empty-table
    /// marker. The name slot is set through [`Self::set_name_table`].
    pub fn set_table(&mut self, kind: TableKind, table: Option<CurveTable<'a>>) -> Result<()> {
        let slot = match table {
            Some(table) => Slot::Present(table),
            None => Slot::marker(),
        };
        match kind {
            TableKind::Key => self.key = slot,
            TableKind::Range => self.range = slot,
            TableKind::Random => self.random = slot,
            TableKind::Info => self.info = slot,
            TableKind::Name => {
                return Err(Error::IndexOutOfRange {
                    index: kind.slot(),
                    len: TableKind::ALL.len(),
                })
            }
        }
        self.state.invalidate();
        Ok(())
    }

    pub fn set_name_table(&mut self, table: Option<NameTable<'a>>) {
        self.names = match table {
            Some(table) => Slot::Present(table),
            None => Slot::marker(),
        };
        self.state.invalidate();
    }

    /// Number of decoded tables.
    pub fn table_count(&self) -> usize {
        [
            self.key.table().is_some(),
            self.range.table().is_some(),
            self.random.table().is_some(),
            self.names.table().is_some(),
            self.info.table().is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

fn load_slot<'a, T>(region: Region<'a>, seed: T::Seed, kind: TableKind) -> Result<Slot<'a, T>>
where
    T: Lifecycle<'a, Error = Error>,
{
    if region.len() < MIN_TABLE_SIZE {
        return Ok(Slot::Empty(Cow::Borrowed(region.bytes())));
    }
    match T::initialize(region, seed)? {
        Some(mut table) => {
            table.populate()?;
            Ok(Slot::Present(table))
        }
        None => {
            debug!(%kind, len = region.len(), "empty curve table kept as raw bytes");
            Ok(Slot::Empty(Cow::Borrowed(region.bytes())))
        }
    }
}

fn slot_size<'a, T>(slot: &mut Slot<'a, T>, force: bool) -> Result<Layout>
where
    T: Lifecycle<'a, Error = Error>,
{
    match slot {
        Slot::Present(table) => table.calculate_size(force),
        Slot::Empty(bytes) => Ok(Layout::leaf(bytes.len())),
    }
}

fn slot_rebuild<'a, T>(slot: &mut Slot<'a, T>, target: &mut [u8], layout: &Layout) -> Result<()>
where
    T: Lifecycle<'a, Error = Error>,
{
    match slot {
        Slot::Present(table) => table.rebuild(target, layout),
        Slot::Empty(bytes) => {
            check_size(bytes.len(), target.len())?;
            target.copy_from_slice(bytes);
            Ok(())
        }
    }
}

impl<'a> Lifecycle<'a> for AnimCurve<'a> {
    type Seed = CurveSeed;
    type Error = Error;

    fn initialize(region: Region<'a>, seed: CurveSeed) -> Result<Option<Self>> {
        let header = region.sub(0, CURVE_HEADER_SIZE)?;

        let mut consumed = CURVE_HEADER_SIZE;
        for i in 0..TableKind::ALL.len() {
            consumed += header.read_u32(TABLE_SIZES + i * 4)? as usize;
        }
        if consumed != region.len() {
            return Err(Error::LengthMismatch {
                node: "anim curve",
                declared: region.len(),
                consumed,
            });
        }

        Ok(Some(Self {
            state: NodeState::parsed(region),
            index: seed.index,
            placeholder: seed.placeholder,
            header: Cow::Borrowed(header.bytes()),
            key: Slot::default(),
            range: Slot::default(),
            random: Slot::default(),
            names: Slot::default(),
            info: Slot::default(),
        }))
    }

    fn populate(&mut self) -> Result<()> {
        let Some(region) = self.state.source() else {
            return Ok(());
        };

        let sizes = self.declared_table_sizes();
        let mut cursor = CURVE_HEADER_SIZE;
        let mut slots = [Region::new(&[]); 5];
        for (slot, size) in slots.iter_mut().zip(sizes) {
            *slot = region.sub(cursor, size as usize)?;
            cursor += size as usize;
        }

        self.key = load_slot(slots[0], TableKind::Key, TableKind::Key)?;
        self.range = load_slot(slots[1], TableKind::Range, TableKind::Range)?;
        self.random = load_slot(slots[2], TableKind::Random, TableKind::Random)?;
        self.names = load_slot(slots[3], (), TableKind::Name)?;
        self.info = load_slot(slots[4], TableKind::Info, TableKind::Info)?;

        if self.table_count() == 0 && sizes.iter().any(|&size| size as usize >= MIN_TABLE_SIZE) {
            warn!(curve = self.index, "curve declares tables but none decoded");
        }
        self.state.mark_populated();
        Ok(())
    }

    fn calculate_size(&mut self, force: bool) -> Result<Layout> {
        let Self {
            state,
            key,
            range,
            random,
            names,
            info,
            ..
        } = self;

        state.size_with(force, || {
            let children = vec![
                slot_size(key, force)?,
                slot_size(range, force)?,
                slot_size(random, force)?,
                slot_size(names, force)?,
                slot_size(info, force)?,
            ];
            Ok(Layout::node(CURVE_HEADER_SIZE, children, 0))
        })
    }

    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<()> {
        let Self {
            state,
            header,
            key,
            range,
            random,
            names,
            info,
            ..
        } = self;

        state.rebuild_with(target, layout, |carved| {
            check_size(header.len(), carved.header.len())?;
            carved.header.copy_from_slice(header);
            for (i, child) in layout.children().iter().enumerate() {
                endian::write_u32(
                    carved.header,
                    TABLE_SIZES + i * 4,
                    to_u32("curve table size", child.size())?,
                )?;
            }
            let sizes = TABLE_SIZES..CURVE_HEADER_SIZE;
            if header[sizes.clone()] != carved.header[sizes.clone()] {
                header.to_mut()[sizes.clone()].copy_from_slice(&carved.header[sizes]);
            }

            let mut windows = carved.children.into_iter();
            let mut next = || windows.next().ok_or(rekindle_node::Error::SizeMismatch {
                expected: TableKind::ALL.len(),
                actual: layout.children().len(),
            });
            let children = layout.children();
            check_size(TableKind::ALL.len(), children.len())?;
            slot_rebuild(key, next()?, &children[0])?;
            slot_rebuild(range, next()?, &children[1])?;
            slot_rebuild(random, next()?, &children[2])?;
            slot_rebuild(names, next()?, &children[3])?;
            slot_rebuild(info, next()?, &children[4])?;
            Ok(())
        })
    }

    fn state(&self) -> &NodeState<'a> {
        &self.state
    }
}

impl TreeNode for AnimCurve<'_> {
    fn name(&self) -> String {
        self.label()
    }

    fn kind(&self) -> &'static str {
        "anim-curve"
    }

    fn fields(&self) -> Vec<Field> {
        let mut fields = self.declared_fields();
        for (i, (field, size)) in SIZE_FIELDS
            .iter()
            .zip(self.declared_table_sizes())
            .enumerate()
        {
            fields.push(Field::at(*field, TABLE_SIZES + i * 4, size));
        }
        fields.push(Field::new("placeholder", self.placeholder));
        fields
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> rekindle_node::Result<()> {
        if name == "placeholder" {
            self.set_placeholder(value.try_into()?);
            return Ok(());
        }
        if self.assign_declared_field(name, value)? {
            return Ok(());
        }
        Err(unknown_field(self.kind(), name))
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        let mut children: Vec<&dyn TreeNode> = Vec::new();
        if let Some(table) = self.key.table() {
            children.push(table);
        }
        if let Some(table) = self.range.table() {
            children.push(table);
        }
        if let Some(table) = self.random.table() {
            children.push(table);
        }
        if let Some(table) = self.names.table() {
            children.push(table);
        }
        if let Some(table) = self.info.table() {
            children.push(table);
        }
        children
    }

    fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
        self.state.invalidate();
        let mut children: Vec<&mut dyn TreeNode> = Vec::new();
        if let Some(table) = self.key.table_mut() {
            children.push(table);
        }
        if let Some(table) = self.range.table_mut() {
            children.push(table);
        }
        if let Some(table) = self.random.table_mut() {
            children.push(table);
        }
        if let Some(table) = self.names.table_mut() {
            children.push(table);
        }
        if let Some(table) = self.info.table_mut() {
            children.push(table);
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekindle_node::{tree, BuildOptions};

    fn curve_bytes(sizes: [u32; 5], tables: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; CURVE_HEADER_SIZE];
        data[0] = 0xAC;
        data[2] = CurveType::ParticleFloat as u8;
        data[6..8].copy_from_slice(&0x1234u16.to_be_bytes());
        data[8..10].copy_from_slice(&60u16.to_be_bytes());
        for (i, size) in sizes.iter().enumerate() {
            data[TABLE_SIZES + i * 4..TABLE_SIZES + i * 4 + 4].copy_from_slice(&size.to_be_bytes());
        }
        data.extend_from_slice(tables);
        data
    }

    fn seed() -> CurveSeed {
        CurveSeed {
            index: 3,
            placeholder: 0,
        }
    }

    #[test]
    fn test_all_small_slots_have_no_tables() {
        let data = curve_bytes([4; 5], &[0u8; 20]);
        let curve: AnimCurve = tree::load(&data, seed()).unwrap().unwrap();

        assert_eq!(curve.table_count(), 0);
        assert!(curve.children().is_empty());
        assert_eq!(curve.name(), "AnimCurve3");
        assert_eq!(curve.random_seed(), 0x1234);
        assert_eq!(curve.frame_length(), 60);
        assert_eq!(curve.curve_type(), Some(CurveType::ParticleFloat));
    }

    #[test]
    fn test_tables_are_gated_by_size() {
        // key: 4 + 2 x 4-byte records, range: 4 bytes, random: 0, name: 0, info: count 0
        let mut tables = vec![0, 2, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];
        tables.extend_from_slice(&[0, 0, 0, 0]);
        tables.extend_from_slice(&[0, 0, 0, 0, 0xEE, 0xEE]);
        let data = curve_bytes([12, 4, 0, 0, 6], &tables);
        let curve: AnimCurve = tree::load(&data, seed()).unwrap().unwrap();

        assert_eq!(curve.table_count(), 1);
        let key = curve.table(TableKind::Key).unwrap();
        assert_eq!(key.count(), 2);
        assert!(curve.table(TableKind::Info).is_none());
    }

    #[test]
    fn test_length_mismatch() {
        let data = curve_bytes([8, 0, 0, 0, 0], &[0u8; 12]);
        let result = tree::load::<AnimCurve>(&data, seed());
        assert!(matches!(
            result,
            Err(Error::LengthMismatch {
                declared: 0x2C,
                consumed: 0x28,
                ..
            })
        ));
    }

    #[test]
    fn test_forced_rebuild_is_byte_exact() {
        let mut tables = vec![0, 2, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];
        tables.extend_from_slice(&[0, 0, 0, 0]);
        tables.extend_from_slice(&[0, 0, 0, 0, 0xEE, 0xEE]);
        let data = curve_bytes([12, 4, 0, 0, 6], &tables);
        let mut curve: AnimCurve = tree::load(&data, seed()).unwrap().unwrap();

        let bytes = tree::build(&mut curve, &BuildOptions::forced()).unwrap();
        assert_eq!(bytes, data);
    }

    #[test]
    fn test_table_edit_updates_header_size() {
        let tables = [0u8, 1, 0, 0, 5, 5, 5, 5];
        let data = curve_bytes([8, 0, 0, 0, 0], &tables);
        let mut curve: AnimCurve = tree::load(&data, seed()).unwrap().unwrap();

        curve
            .table_mut(TableKind::Key)
            .unwrap()
            .push_record(&[6, 6, 6, 6])
            .unwrap();
        let bytes = tree::build(&mut curve, &BuildOptions::default()).unwrap();

        let reparsed: AnimCurve = tree::load(&bytes, seed()).unwrap().unwrap();
        assert_eq!(reparsed.declared_table_sizes(), [12, 0, 0, 0, 0]);
        assert_eq!(reparsed.table(TableKind::Key).unwrap().count(), 2);
    }

    #[test]
    fn test_process_flags() {
        let mut curve = AnimCurve::new(1, CurveType::EmitterFloat);
        curve.set_process_flag(ProcessFlags::INFINITE_LOOP | ProcessFlags::TURN);
        assert!(curve.process_flags().contains(ProcessFlags::TURN));
        assert!(!curve.process_flags().contains(ProcessFlags::STOP));
        assert_eq!(curve.curve_type(), Some(CurveType::EmitterFloat));
    }

    #[test]
    fn test_new_curve_writes_empty_markers() {
        let mut curve = AnimCurve::new(2, CurveType::ParticleFloat);
        let bytes = tree::build(&mut curve, &BuildOptions::default()).unwrap();
        assert_eq!(bytes.len(), CURVE_HEADER_SIZE + 5 * 4);
        assert!(bytes[CURVE_HEADER_SIZE..].iter().all(|&b| b == 0));

        let reparsed: AnimCurve = tree::load(&bytes, seed()).unwrap().unwrap();
        assert_eq!(reparsed.declared_table_sizes(), [4; 5]);
        assert_eq!(reparsed.table_count(), 0);
    }

    #[test]
    fn test_cleared_slot_returns_to_marker() {
        let mut curve = AnimCurve::new(2, CurveType::ParticleFloat);
        let mut info = CurveTable::new(TableKind::Info, 4);
        info.push_record(&[1, 2, 3, 4]).unwrap();
        curve.set_table(TableKind::Info, Some(info)).unwrap();
        let mut names = NameTable::new();
        names.push_name("a").unwrap();
        curve.set_name_table(Some(names));
        let bytes = tree::build(&mut curve, &BuildOptions::default()).unwrap();
        let reparsed: AnimCurve = tree::load(&bytes, seed()).unwrap().unwrap();
        // name table: prefix, one slot, "a" with its terminator
        assert_eq!(reparsed.declared_table_sizes(), [4, 4, 4, 12, 8]);
        assert_eq!(reparsed.table_count(), 2);

        curve.set_table(TableKind::Info, None).unwrap();
        curve.set_name_table(None);
        let bytes = tree::build(&mut curve, &BuildOptions::default()).unwrap();
        let reparsed: AnimCurve = tree::load(&bytes, seed()).unwrap().unwrap();
        assert_eq!(reparsed.declared_table_sizes(), [4; 5]);
    }
}
