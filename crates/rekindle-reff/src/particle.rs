//! Particle parameter block.
//!
//! | Offset | Type | Field |
//! |--------|------|-------|
//! | 0x00 | u32 | descriptor size `D` |
//! | 0x04 | 136 bytes | fixed descriptor prefix |
//! | 0x8C | 3 x (u16 len, bytes) | texture names, `len <= 1` is absent |
//! | ... | | zero padding to 4, then opaque tail, up to `4 + D` |

use std::borrow::Cow;

use rekindle_common::{BinaryWriter, Region, Rgba, Vec2, Vec3};
use rekindle_node::{
    be_fields, check_size, unknown_field, Field, FieldValue, Layout, Lifecycle, NodeState,
    TreeNode,
};
use tracing::trace;

use crate::error::to_u32;
use crate::strings::{PaddedTail, PrefixedString};
use crate::{Error, Result};

/// Length of the fixed descriptor prefix before the texture names.
pub const PARTICLE_PREFIX_SIZE: usize = 136;

/// Number of texture name slots.
pub const TEXTURE_SLOTS: usize = 3;

/// The particle parameter block of one entry.
#[derive(Debug, Clone)]
pub struct Particle<'a> {
    state: NodeState<'a>,
    prefix: Cow<'a, [u8]>,
    textures: [PrefixedString<'a>; TEXTURE_SLOTS],
    tail: PaddedTail<'a>,
}

be_fields! {
    Particle {
        color11, set_color11: Rgba = 0;
        color12, set_color12: Rgba = 4;
        color21, set_color21: Rgba = 8;
        color22, set_color22: Rgba = 12;
        size, set_size: Vec2 = 16;
        scale, set_scale: Vec2 = 24;
        rotate, set_rotate: Vec3 = 32;
        texture_scale1, set_texture_scale1: Vec2 = 44;
        texture_scale2, set_texture_scale2: Vec2 = 52;
        texture_scale3, set_texture_scale3: Vec2 = 60;
        texture_rotate, set_texture_rotate: Vec3 = 68;
        texture_translate1, set_texture_translate1: Vec2 = 80;
        texture_translate2, set_texture_translate2: Vec2 = 88;
        texture_translate3, set_texture_translate3: Vec2 = 96;
        /// Runtime texture references, zero on disk.
        texture_ref1, set_texture_ref1: u32 = 104;
        texture_ref2, set_texture_ref2: u32 = 108;
        texture_ref3, set_texture_ref3: u32 = 112;
        texture_wrap, set_texture_wrap: u16 = 116;
        texture_reverse, set_texture_reverse: u8 = 118;
        alpha_compare_ref0, set_alpha_compare_ref0: u8 = 119;
        alpha_compare_ref1, set_alpha_compare_ref1: u8 = 120;
        rotate_offset_random_x, set_rotate_offset_random_x: u8 = 121;
        rotate_offset_random_y, set_rotate_offset_random_y: u8 = 122;
        rotate_offset_random_z, set_rotate_offset_random_z: u8 = 123;
        rotate_offset, set_rotate_offset: Vec3 = 124;
    }
}

const TEXTURE_FIELDS: [&str; TEXTURE_SLOTS] = ["texture1", "texture2", "texture3"];

impl<'a> Particle<'a> {
    /// A zeroed descriptor with no textures.
    pub fn new() -> Self {
        Self {
            state: NodeState::synthetic(),
            prefix: Cow::Owned(vec![0; PARTICLE_PREFIX_SIZE]),
            textures: std::array::from_fn(|_| PrefixedString::absent()),
            tail: PaddedTail::aligned(),
        }
    }

    fn raw(&self) -> &[u8] {
        &self.prefix
    }

    fn raw_mut(&mut self) -> &mut [u8] {
        self.state.invalidate();
        self.prefix.to_mut()
    }

    /// The texture slots as stored, absent ones included.
    pub fn textures(&self) -> &[PrefixedString<'a>; TEXTURE_SLOTS] {
        &self.textures
    }

    pub fn texture(&self, slot: usize) -> Option<&str> {
        self.textures
            .get(slot)
            .filter(|texture| !texture.is_absent())
            .map(PrefixedString::as_str)
    }

    /// Replace the texture name in `slot`; `None` clears it. The other
    /// slots keep their declared bytes.
    pub fn set_texture(&mut self, slot: usize, name: Option<&str>) -> Result<()> {
        if slot >= TEXTURE_SLOTS {
            return Err(Error::IndexOutOfRange {
                index: slot,
                len: TEXTURE_SLOTS,
            });
        }
        self.textures[slot] = match name {
            Some(name) if !name.is_empty() => PrefixedString::new(name)?,
            _ => PrefixedString::absent(),
        };
        self.state.invalidate();
        Ok(())
    }

    /// Bytes following the texture names and their padding.
    pub fn tail(&self) -> usize {
        self.tail.len()
    }

    fn descriptor_size(&self) -> usize {
        let cursor = PARTICLE_PREFIX_SIZE
            + self
                .textures
                .iter()
                .map(PrefixedString::encoded_size)
                .sum::<usize>();
        cursor + self.tail.size_after(cursor)
    }
}

impl Default for Particle<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Lifecycle<'a> for Particle<'a> {
    type Seed = ();
    type Error = Error;

    fn initialize(region: Region<'a>, _seed: ()) -> Result<Option<Self>> {
        let declared = region.read_u32(0)? as usize;
        if region.len() != 4 + declared {
            return Err(Error::LengthMismatch {
                node: "particle",
                declared: region.len(),
                consumed: 4 + declared,
            });
        }

        let desc = region.sub(4, declared)?;
        if desc.len() < PARTICLE_PREFIX_SIZE {
            return Err(Error::Truncated {
                node: "particle",
                len: desc.len(),
                min: PARTICLE_PREFIX_SIZE,
            });
        }
        let prefix = desc.sub(0, PARTICLE_PREFIX_SIZE)?.bytes();

        let mut cursor = PARTICLE_PREFIX_SIZE;
        let mut textures: [PrefixedString<'a>; TEXTURE_SLOTS] =
            std::array::from_fn(|_| PrefixedString::absent());
        for texture in &mut textures {
            *texture = PrefixedString::read(&desc, cursor)?;
            trace!(name = %texture, declared = texture.declared(), "particle texture");
            cursor += texture.encoded_size();
        }

        Ok(Some(Self {
            state: NodeState::parsed(region),
            prefix: Cow::Borrowed(prefix),
            textures,
            tail: PaddedTail::parse(&desc, cursor)?,
        }))
    }

    fn populate(&mut self) -> Result<()> {
        self.state.mark_populated();
        Ok(())
    }

    fn calculate_size(&mut self, force: bool) -> Result<Layout> {
        let size = 4 + self.descriptor_size();
        self.state.size_with(force, || Ok(Layout::leaf(size)))
    }

    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<()> {
        let Self {
            state,
            prefix,
            textures,
            tail,
        } = self;

        state.rebuild_with(target, layout, |carved| {
            let expected = carved.header.len();
            let mut writer = BinaryWriter::new(carved.header);
            writer.write_u32(to_u32("particle descriptor size", expected.saturating_sub(4))?)?;
            writer.write_bytes(prefix)?;
            for texture in textures.iter() {
                texture.write(&mut writer)?;
            }
            // padding is relative to the descriptor, which starts 4-aligned
            tail.write(&mut writer)?;
            check_size(expected, writer.position())?;
            Ok(())
        })
    }

    fn state(&self) -> &NodeState<'a> {
        &self.state
    }
}

impl TreeNode for Particle<'_> {
    fn name(&self) -> String {
        "Particle".to_string()
    }

    fn kind(&self) -> &'static str {
        "particle"
    }

    fn fields(&self) -> Vec<Field> {
        let mut fields = self.declared_fields();
        for (field, texture) in TEXTURE_FIELDS.iter().zip(&self.textures) {
            fields.push(Field::new(*field, texture.as_str()));
        }
        fields.push(Field::new("tail", FieldValue::Opaque(self.tail.len())));
        fields
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> rekindle_node::Result<()> {
        if let Some(slot) = TEXTURE_FIELDS.iter().position(|field| *field == name) {
            let text = String::try_from(value)?;
            return self
                .set_texture(slot, Some(&text))
                .map_err(Error::into_node);
        }
        if self.assign_declared_field(name, value)? {
            return Ok(());
        }
        Err(unknown_field(self.kind(), name))
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        Vec::new()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
        Vec::new()
    }
}
