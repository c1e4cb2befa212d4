//! Table entries and their payloads.
//!
//! | Offset | Type | Field |
//! |--------|------|-------|
//! | 0x00 | u32 | reserved |
//! | 0x04 | u32 | emitter descriptor size `E` |
//! | 0x08 | `E` bytes | emitter descriptor |
//! | 0x08 + E | `4 + D` bytes | particle block |
//! | ... | | animation track list, up to the entry length |

use rekindle_common::{BinaryWriter, Region};
use rekindle_node::{
    check_size, unknown_field, Field, FieldValue, Layout, Lifecycle, NodeState, TreeNode,
};
use tracing::debug;

use crate::animation::AnimationList;
use crate::emitter::Emitter;
use crate::error::to_u32;
use crate::particle::Particle;
use crate::strings::PrefixedString;
use crate::{Error, Result};

/// Bytes before the emitter descriptor.
pub const ENTRY_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone)]
struct Payload<'a> {
    emitter: Emitter<'a>,
    particle: Particle<'a>,
    animations: AnimationList<'a>,
}

/// One named effect in the object table.
#[derive(Debug, Clone)]
pub struct Entry<'a> {
    state: NodeState<'a>,
    name: PrefixedString<'a>,
    reserved: u32,
    payload: Option<Payload<'a>>,
}

impl<'a> Entry<'a> {
    /// A new entry with a default emitter, particle block and no tracks.
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            state: NodeState::synthetic(),
            name: PrefixedString::new(name)?,
            reserved: 0,
            payload: Some(Payload {
                emitter: Emitter::new(),
                particle: Particle::new(),
                animations: AnimationList::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// The name field as written to the object table.
    pub fn stored_name(&self) -> &PrefixedString<'a> {
        &self.name
    }

    /// Change the name written to the object table.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.name = PrefixedString::new(name)?;
        self.state.invalidate();
        Ok(())
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    pub fn set_reserved(&mut self, value: u32) {
        self.reserved = value;
        self.state.invalidate();
    }

    pub fn emitter(&self) -> Option<&Emitter<'a>> {
        self.payload.as_ref().map(|p| &p.emitter)
    }

    pub fn emitter_mut(&mut self) -> Option<&mut Emitter<'a>> {
        self.state.invalidate();
        self.payload.as_mut().map(|p| &mut p.emitter)
    }

    pub fn particle(&self) -> Option<&Particle<'a>> {
        self.payload.as_ref().map(|p| &p.particle)
    }

    pub fn particle_mut(&mut self) -> Option<&mut Particle<'a>> {
        self.state.invalidate();
        self.payload.as_mut().map(|p| &mut p.particle)
    }

    pub fn animations(&self) -> Option<&AnimationList<'a>> {
        self.payload.as_ref().map(|p| &p.animations)
    }

    pub fn animations_mut(&mut self) -> Option<&mut AnimationList<'a>> {
        self.state.invalidate();
        self.payload.as_mut().map(|p| &mut p.animations)
    }
}

fn required<T>(node: Option<T>, block: &'static str) -> Result<T> {
    node.ok_or(Error::MissingBlock { block })
}

impl<'a> Lifecycle<'a> for Entry<'a> {
    /// The entry's name field from the object table.
    type Seed = PrefixedString<'a>;
    type Error = Error;

    fn initialize(region: Region<'a>, name: PrefixedString<'a>) -> Result<Option<Self>> {
        if region.len() < ENTRY_HEADER_SIZE {
            return Err(Error::Truncated {
                node: "entry",
                len: region.len(),
                min: ENTRY_HEADER_SIZE,
            });
        }
        Ok(Some(Self {
            state: NodeState::parsed(region),
            name,
            reserved: region.read_u32(0)?,
            payload: None,
        }))
    }

    fn populate(&mut self) -> Result<()> {
        let Some(region) = self.state.source() else {
            return Ok(());
        };

        let emitter_size = region.read_u32(4)? as usize;
        let particle_at = ENTRY_HEADER_SIZE + emitter_size;
        let particle_size = 4 + region.read_u32(particle_at)? as usize;
        let animations_at = particle_at + particle_size;
        debug!(
            entry = %self.name,
            emitter_size,
            particle_size,
            animations = region.len().saturating_sub(animations_at),
            "entry payload"
        );

        let mut emitter = required(
            Emitter::initialize(region.sub(ENTRY_HEADER_SIZE, emitter_size)?, ())?,
            "emitter",
        )?;
        let mut particle = required(
            Particle::initialize(region.sub(particle_at, particle_size)?, ())?,
            "particle",
        )?;
        let mut animations = required(
            AnimationList::initialize(region.tail(animations_at)?, ())?,
            "animation",
        )?;
        emitter.populate()?;
        particle.populate()?;
        animations.populate()?;

        self.payload = Some(Payload {
            emitter,
            particle,
            animations,
        });
        self.state.mark_populated();
        Ok(())
    }

    fn calculate_size(&mut self, force: bool) -> Result<Layout> {
        let Self { state, payload, .. } = self;
        let source_len = state.source().map(|region| region.len());

        state.size_with(force, || match payload {
            Some(payload) => Ok(Layout::node(
                ENTRY_HEADER_SIZE,
                vec![
                    payload.emitter.calculate_size(force)?,
                    payload.particle.calculate_size(force)?,
                    payload.animations.calculate_size(force)?,
                ],
                0,
            )),
            // never populated: nothing to derive from, so the source stands
            None => Ok(Layout::verbatim(
                source_len.ok_or(rekindle_node::Error::MissingSource)?,
            )),
        })
    }

    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<()> {
        let Self {
            state,
            reserved,
            payload,
            ..
        } = self;

        state.rebuild_with(target, layout, |carved| {
            let payload = payload
                .as_mut()
                .ok_or(rekindle_node::Error::MissingSource)?;
            let children = layout.children();
            check_size(3, children.len())?;

            let mut writer = BinaryWriter::new(carved.header);
            writer.write_u32(*reserved)?;
            writer.write_u32(to_u32("emitter size", children[0].size())?)?;

            let mut windows = carved.children.into_iter();
            if let (Some(emitter), Some(particle), Some(animations)) =
                (windows.next(), windows.next(), windows.next())
            {
                payload.emitter.rebuild(emitter, &children[0])?;
                payload.particle.rebuild(particle, &children[1])?;
                payload.animations.rebuild(animations, &children[2])?;
            }
            Ok(())
        })
    }

    fn state(&self) -> &NodeState<'a> {
        &self.state
    }
}

impl TreeNode for Entry<'_> {
    fn name(&self) -> String {
        self.name.to_string()
    }

    fn kind(&self) -> &'static str {
        "entry"
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("name", self.name()),
            Field::at("reserved", 0, self.reserved),
        ]
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> rekindle_node::Result<()> {
        match name {
            "name" => {
                let text: String = value.try_into()?;
                self.rename(&text)
            }
            "reserved" => {
                self.set_reserved(value.try_into()?);
                Ok(())
            }
            _ => Err(unknown_field(self.kind(), name)),
        }
    }

    fn rename(&mut self, name: &str) -> rekindle_node::Result<()> {
        self.set_name(name).map_err(Error::into_node)
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        match &self.payload {
            Some(p) => vec![
                &p.emitter as &dyn TreeNode,
                &p.particle,
                &p.animations,
            ],
            None => Vec::new(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
        self.state.invalidate();
        match &mut self.payload {
            Some(p) => vec![
                &mut p.emitter as &mut dyn TreeNode,
                &mut p.particle,
                &mut p.animations,
            ],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::EMITTER_DESC_SIZE;
    use rekindle_node::{tree, BuildOptions};

    fn seed(name: &str) -> PrefixedString<'static> {
        PrefixedString::new(name).unwrap()
    }

    fn built(entry: &mut Entry<'_>) -> Vec<u8> {
        tree::build(entry, &BuildOptions::default()).unwrap()
    }

    #[test]
    fn test_new_entry_layout() {
        let mut entry = Entry::new("smoke").unwrap();
        entry.set_reserved(0x55);
        let bytes = built(&mut entry);

        assert_eq!(&bytes[0..4], &0x55u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &(EMITTER_DESC_SIZE as u32).to_be_bytes());

        let parsed: Entry = tree::load(&bytes, seed("smoke")).unwrap().unwrap();
        assert_eq!(parsed.reserved(), 0x55);
        assert_eq!(parsed.emitter().unwrap().size(), EMITTER_DESC_SIZE);
        assert_eq!(parsed.animations().unwrap().track_count(), 0);
        assert_eq!(parsed.children().len(), 3);
    }

    #[test]
    fn test_forced_rebuild_matches_default() {
        let mut entry = Entry::new("fire").unwrap();
        entry.emitter_mut().unwrap().set_emit_life(90);
        let bytes = built(&mut entry);

        let mut parsed: Entry = tree::load(&bytes, seed("fire")).unwrap().unwrap();
        let forced = tree::build(&mut parsed, &BuildOptions::forced()).unwrap();
        assert_eq!(forced, bytes);
        assert_eq!(parsed.emitter().unwrap().emit_life(), 90);
    }

    #[test]
    fn test_emitter_size_past_end() {
        let mut entry = Entry::new("x").unwrap();
        let mut bytes = built(&mut entry);
        bytes[4..8].copy_from_slice(&0x10000u32.to_be_bytes());
        assert!(tree::load::<Entry>(&bytes, seed("x")).is_err());
    }

    #[test]
    fn test_rename_validation() {
        let mut entry = Entry::new("ok").unwrap();
        assert!(entry.rename("bad\0name").is_err());
        entry.rename("better").unwrap();
        assert_eq!(entry.name(), "better");
        assert!(Entry::new("a\0").is_err());
    }
}
