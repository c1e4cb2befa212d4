//! Emitter descriptor: a fixed-layout parameter block kept as raw bytes.

use std::borrow::Cow;

use rekindle_common::{Region, Vec3};
use rekindle_node::{
    be_fields, unknown_field, Field, FieldValue, Layout, Lifecycle, NodeState, TreeNode,
};

use crate::{Error, Result};

/// Size of a complete emitter descriptor, including draw settings.
pub const EMITTER_DESC_SIZE: usize = 0x14C;

/// The emitter descriptor of one entry.
#[derive(Debug, Clone)]
pub struct Emitter<'a> {
    state: NodeState<'a>,
    raw: Cow<'a, [u8]>,
}

be_fields! {
    Emitter {
        common_flag, set_common_flag: u32 = 0x00;
        /// Low byte is the emit form type.
        emit_flag, set_emit_flag: u32 = 0x04;
        emit_life, set_emit_life: u16 = 0x08;
        ptcl_life, set_ptcl_life: u16 = 0x0A;
        ptcl_life_random, set_ptcl_life_random: i8 = 0x0C;
        inherit_child_ptcl_translate, set_inherit_child_ptcl_translate: i8 = 0x0D;
        emit_interval_random, set_emit_interval_random: i8 = 0x0E;
        emit_random, set_emit_random: i8 = 0x0F;
        emit_amount, set_emit_amount: f32 = 0x10;
        emit_start, set_emit_start: u16 = 0x14;
        emit_past, set_emit_past: u16 = 0x16;
        emit_interval, set_emit_interval: u16 = 0x18;
        inherit_ptcl_translate, set_inherit_ptcl_translate: i8 = 0x1A;
        inherit_child_emit_translate, set_inherit_child_emit_translate: i8 = 0x1B;
        common_param1, set_common_param1: f32 = 0x1C;
        common_param2, set_common_param2: f32 = 0x20;
        common_param3, set_common_param3: f32 = 0x24;
        common_param4, set_common_param4: f32 = 0x28;
        common_param5, set_common_param5: f32 = 0x2C;
        common_param6, set_common_param6: f32 = 0x30;
        /// Also known as the original tick.
        emit_div, set_emit_div: u16 = 0x34;
        vel_init_velocity_random, set_vel_init_velocity_random: i8 = 0x36;
        vel_momentum_random, set_vel_momentum_random: i8 = 0x37;
        vel_power_radiation_dir, set_vel_power_radiation_dir: f32 = 0x38;
        vel_power_y_axis, set_vel_power_y_axis: f32 = 0x3C;
        vel_power_random_dir, set_vel_power_random_dir: f32 = 0x40;
        vel_power_normal_dir, set_vel_power_normal_dir: f32 = 0x44;
        vel_diffusion_emitter_normal, set_vel_diffusion_emitter_normal: f32 = 0x48;
        vel_power_spec_dir, set_vel_power_spec_dir: f32 = 0x4C;
        vel_diffusion_spec_dir, set_vel_diffusion_spec_dir: f32 = 0x50;
        vel_spec_dir, set_vel_spec_dir: Vec3 = 0x54;
        scale, set_scale: Vec3 = 0x60;
        rotate, set_rotate: Vec3 = 0x6C;
        translate, set_translate: Vec3 = 0x78;
        lod_near, set_lod_near: u8 = 0x84;
        lod_far, set_lod_far: u8 = 0x85;
        lod_min_emit, set_lod_min_emit: u8 = 0x86;
        lod_alpha, set_lod_alpha: u8 = 0x87;
        random_seed, set_random_seed: u32 = 0x88;
        draw_flags, set_draw_flags: u16 = 0x94;
        alpha_compare_comp0, set_alpha_compare_comp0: u8 = 0x96;
        alpha_compare_comp1, set_alpha_compare_comp1: u8 = 0x97;
        alpha_compare_op, set_alpha_compare_op: u8 = 0x98;
        tev_stage_count, set_tev_stage_count: u8 = 0x99;
        flag_clamp, set_flag_clamp: u8 = 0x9A;
        indirect_target_stage, set_indirect_target_stage: u8 = 0x9B;
    }
}

/// Bits of the common flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct EmitterCommonFlags(pub u32);

impl EmitterCommonFlags {
    pub const SYNC_LIFE: u32 = 0x1;
    pub const INVISIBLE: u32 = 0x2;
    pub const MAX_LIFE: u32 = 0x4;
    pub const INHERIT_PTCL_SCALE: u32 = 0x20;
    pub const INHERIT_PTCL_ROTATE: u32 = 0x40;
    pub const INHERIT_CHILD_EMIT_SCALE: u32 = 0x80;
    pub const INHERIT_CHILD_EMIT_ROTATE: u32 = 0x100;
    pub const DISABLE_CALC: u32 = 0x200;
    pub const INHERIT_PTCL_PIVOT: u32 = 0x400;
    pub const INHERIT_CHILD_PIVOT: u32 = 0x800;
    pub const INHERIT_CHILD_PTCL_SCALE: u32 = 0x1000;
    pub const INHERIT_CHILD_PTCL_ROTATE: u32 = 0x2000;
    /// Set by the runtime once pointers are relocated.
    pub const RELOCATE_COMPLETE: u32 = 0x8000_0000;

    #[inline]
    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit == bit
    }

    #[inline]
    pub fn with(self, bit: u32) -> Self {
        Self(self.0 | bit)
    }

    #[inline]
    pub fn without(self, bit: u32) -> Self {
        Self(self.0 & !bit)
    }
}

/// Offset of the eight user-data bytes.
const USER_DATA: usize = 0x8C;

impl<'a> Emitter<'a> {
    /// A zeroed, full-size descriptor.
    pub fn new() -> Self {
        Self {
            state: NodeState::synthetic(),
            raw: Cow::Owned(vec![0; EMITTER_DESC_SIZE]),
        }
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn raw_mut(&mut self) -> &mut [u8] {
        self.state.invalidate();
        self.raw.to_mut()
    }

    /// The descriptor bytes, as they will be written.
    pub fn bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn size(&self) -> usize {
        self.raw.len()
    }

    /// Emit form type, the low byte of [`Self::emit_flag`].
    pub fn emit_form(&self) -> u8 {
        (self.emit_flag() & 0xFF) as u8
    }

    pub fn common_flags(&self) -> EmitterCommonFlags {
        EmitterCommonFlags(self.common_flag())
    }

    pub fn set_common_flags(&mut self, flags: EmitterCommonFlags) {
        self.set_common_flag(flags.0);
    }

    pub fn user_data(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(&self.raw[USER_DATA..USER_DATA + 8]);
        out
    }

    pub fn set_user_data(&mut self, data: [u8; 8]) {
        self.raw_mut()[USER_DATA..USER_DATA + 8].copy_from_slice(&data);
    }
}

impl Default for Emitter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Lifecycle<'a> for Emitter<'a> {
    type Seed = ();
    type Error = Error;

    fn initialize(region: Region<'a>, _seed: ()) -> Result<Option<Self>> {
        if region.len() < Self::DECLARED_END {
            return Err(Error::Truncated {
                node: "emitter",
                len: region.len(),
                min: Self::DECLARED_END,
            });
        }
        Ok(Some(Self {
            state: NodeState::parsed(region),
            raw: Cow::Borrowed(region.bytes()),
        }))
    }

    fn populate(&mut self) -> Result<()> {
        self.state.mark_populated();
        Ok(())
    }

    fn calculate_size(&mut self, force: bool) -> Result<Layout> {
        let size = self.raw.len();
        self.state.size_with(force, || Ok(Layout::leaf(size)))
    }

    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<()> {
        let raw = &self.raw;
        self.state.rebuild_with(target, layout, |carved| {
            rekindle_node::check_size(raw.len(), carved.header.len())?;
            carved.header.copy_from_slice(raw);
            Ok(())
        })
    }

    fn state(&self) -> &NodeState<'a> {
        &self.state
    }
}

impl TreeNode for Emitter<'_> {
    fn name(&self) -> String {
        "Emitter".to_string()
    }

    fn kind(&self) -> &'static str {
        "emitter"
    }

    fn fields(&self) -> Vec<Field> {
        let mut fields = self.declared_fields();
        fields.push(Field::new("size", self.size() as u32));
        fields
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> rekindle_node::Result<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use rekindle_node::{tree, BuildOptions};

    fn sample() -> Vec<u8> {
        let mut data = vec![0u8; EMITTER_DESC_SIZE];
        data[0x08..0x0A].copy_from_slice(&30u16.to_be_bytes());
        data[0x10..0x14].copy_from_slice(&2.5f32.to_be_bytes());
        data[0x84] = 7;
        data
    }

    #[test]
    fn test_typed_accessors() {
        let data = sample();
        let emitter: Emitter = tree::load(&data, ()).unwrap().unwrap();
        assert_eq!(emitter.emit_life(), 30);
        assert_eq!(emitter.emit_amount(), 2.5);
        assert_eq!(emitter.lod_near(), 7);
        assert_eq!(emitter.scale(), Vec3::default());
    }

    #[test]
    fn test_setter_round_trip() {
        let data = sample();
        let mut emitter: Emitter = tree::load(&data, ()).unwrap().unwrap();
        emitter.set_translate(Vec3::new(1.0, 2.0, 3.0));
        emitter.set_ptcl_life_random(-4);
        assert!(emitter.state().is_modified());

        let bytes = tree::build(&mut emitter, &BuildOptions::default()).unwrap();
        let reparsed: Emitter = tree::load(&bytes, ()).unwrap().unwrap();
        assert_eq!(reparsed.translate(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(reparsed.ptcl_life_random(), -4);
        assert_eq!(reparsed.emit_life(), 30);
    }

    #[test]
    fn test_set_field_by_name() {
        let mut emitter = Emitter::new();
        emitter
            .set_field("emit_interval", FieldValue::U16(12))
            .unwrap();
        assert_eq!(emitter.emit_interval(), 12);
        assert!(emitter.set_field("emit_interval", FieldValue::F32(1.0)).is_err());
        assert!(emitter.set_field("nope", FieldValue::U8(0)).is_err());
    }

    #[test]
    fn test_common_flags() {
        let mut data = sample();
        data[0..4].copy_from_slice(&0x8000_0201u32.to_be_bytes());
        let mut emitter: Emitter = tree::load(&data, ()).unwrap().unwrap();

        let flags = emitter.common_flags();
        assert!(flags.contains(EmitterCommonFlags::SYNC_LIFE));
        assert!(flags.contains(EmitterCommonFlags::DISABLE_CALC));
        assert!(flags.contains(EmitterCommonFlags::RELOCATE_COMPLETE));
        assert!(!flags.contains(EmitterCommonFlags::INVISIBLE));

        emitter.set_common_flags(
            flags
                .without(EmitterCommonFlags::DISABLE_CALC)
                .with(EmitterCommonFlags::INVISIBLE),
        );
        let bytes = tree::build(&mut emitter, &BuildOptions::default()).unwrap();
        assert_eq!(&bytes[0..4], &0x8000_0003u32.to_be_bytes());
        assert_eq!(bytes[4..], data[4..]);
    }

    #[test]
    fn test_truncated_descriptor() {
        let data = [0u8; 0x40];
        let result = tree::load::<Emitter>(&data, ());
        assert!(matches!(result, Err(Error::Truncated { .. })));
    }
}
