//! Animation track list: particle tracks, emitter tracks, post-field info.
//!
//! | Offset | Type | Field |
//! |--------|------|-------|
//! | 0x00 | i16 | particle track count `p` |
//! | 0x02 | i16 | particle init count |
//! | 0x04 | u32[p] | placeholders |
//! | ... | u32[p] | track sizes |
//! | ... | i16 | emitter track count `e` |
//! | ... | i16 | emitter init count |
//! | ... | u32[e] | placeholders |
//! | ... | u32[e] | track sizes |
//!
//! The curves follow back to back, particle tracks first. Their offsets are
//! the running sum of the sizes. Whatever remains is post-field info.

use std::borrow::Cow;
use std::fmt;

use rekindle_common::{BinaryWriter, Region};
use rekindle_node::{
    check_size, unknown_field, Field, FieldValue, Layout, Lifecycle, NodeState, TreeNode,
};
use tracing::{debug, instrument};

use crate::curve::{AnimCurve, CurveSeed};
use crate::error::{non_negative, to_i16, to_u32};
use crate::{Error, Result};

/// Which of the two track arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSet {
    Particle,
    Emitter,
}

impl fmt::Display for TrackSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSet::Particle => write!(f, "particle"),
            TrackSet::Emitter => write!(f, "emitter"),
        }
    }
}

/// Bytes taken by one array header: count, init count.
const ARRAY_HEADER_SIZE: usize = 4;

/// Size of the two arrays for `particle` + `emitter` tracks.
#[inline]
fn arrays_size(particle: usize, emitter: usize) -> usize {
    2 * ARRAY_HEADER_SIZE + 8 * (particle + emitter)
}

/// Track regions found by `initialize`, consumed by `populate`.
#[derive(Debug, Clone, Default)]
struct PendingTracks<'a> {
    particle: Vec<(CurveSeed, Region<'a>)>,
    emitter: Vec<(CurveSeed, Region<'a>)>,
}

/// The animation part of an entry payload.
#[derive(Debug, Clone)]
pub struct AnimationList<'a> {
    state: NodeState<'a>,
    particle_init: i16,
    emitter_init: i16,
    particle_tracks: Vec<AnimCurve<'a>>,
    emitter_tracks: Vec<AnimCurve<'a>>,
    post_field: Cow<'a, [u8]>,
    pending: PendingTracks<'a>,
}

impl<'a> AnimationList<'a> {
    /// An empty track list with no post-field info.
    pub fn new() -> Self {
        Self {
            state: NodeState::synthetic(),
            particle_init: 0,
            emitter_init: 0,
            particle_tracks: Vec::new(),
            emitter_tracks: Vec::new(),
            post_field: Cow::Borrowed(&[]),
            pending: PendingTracks::default(),
        }
    }

    pub fn particle_init(&self) -> i16 {
        self.particle_init
    }

    pub fn set_particle_init(&mut self, value: i16) {
        self.particle_init = value;
        self.state.invalidate();
    }

    pub fn emitter_init(&self) -> i16 {
        self.emitter_init
    }

    pub fn set_emitter_init(&mut self, value: i16) {
        self.emitter_init = value;
        self.state.invalidate();
    }

    pub fn tracks(&self, set: TrackSet) -> &[AnimCurve<'a>] {
        match set {
            TrackSet::Particle => &self.particle_tracks,
            TrackSet::Emitter => &self.emitter_tracks,
        }
    }

    fn tracks_vec(&mut self, set: TrackSet) -> &mut Vec<AnimCurve<'a>> {
        self.state.invalidate();
        match set {
            TrackSet::Particle => &mut self.particle_tracks,
            TrackSet::Emitter => &mut self.emitter_tracks,
        }
    }

    pub fn track_mut(&mut self, set: TrackSet, index: usize) -> Option<&mut AnimCurve<'a>> {
        self.tracks_vec(set).get_mut(index)
    }

    /// Total number of tracks in both arrays.
    pub fn track_count(&self) -> usize {
        self.particle_tracks.len() + self.emitter_tracks.len()
    }

    /// Append a track to `set`.
    pub fn push_track(&mut self, set: TrackSet, curve: AnimCurve<'a>) {
        self.tracks_vec(set).push(curve);
        self.renumber();
    }

    /// Insert a track at `index` within `set`.
    pub fn insert_track(&mut self, set: TrackSet, index: usize, curve: AnimCurve<'a>) -> Result<()> {
        let tracks = self.tracks_vec(set);
        if index > tracks.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: tracks.len(),
            });
        }
        tracks.insert(index, curve);
        self.renumber();
        Ok(())
    }

    pub fn remove_track(&mut self, set: TrackSet, index: usize) -> Result<AnimCurve<'a>> {
        let tracks = self.tracks_vec(set);
        if index >= tracks.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: tracks.len(),
            });
        }
        let curve = tracks.remove(index);
        self.renumber();
        Ok(curve)
    }

    pub fn post_field(&self) -> &[u8] {
        &self.post_field
    }

    pub fn set_post_field(&mut self, bytes: Vec<u8>) {
        self.post_field = Cow::Owned(bytes);
        self.state.invalidate();
    }

    /// Curve indices run across both arrays, particle tracks first.
    fn renumber(&mut self) {
        let Self {
            particle_tracks,
            emitter_tracks,
            ..
        } = self;
        for (index, curve) in particle_tracks.iter_mut().chain(emitter_tracks).enumerate() {
            curve.set_index(index);
        }
    }
}

impl Default for AnimationList<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one array: count, init count, placeholders, sizes.
fn read_array(region: &Region<'_>, at: usize, set: TrackSet) -> Result<(i16, Vec<(u32, u32)>)> {
    let field = match set {
        TrackSet::Particle => "particle track count",
        TrackSet::Emitter => "emitter track count",
    };
    let count = non_negative(field, region.read_i16(at)? as i64)?;
    let init = region.read_i16(at + 2)?;

    let placeholders = at + ARRAY_HEADER_SIZE;
    let sizes = placeholders + 4 * count;
    let mut tracks = Vec::with_capacity(count);
    for i in 0..count {
        tracks.push((
            region.read_u32(placeholders + 4 * i)?,
            region.read_u32(sizes + 4 * i)?,
        ));
    }
    Ok((init, tracks))
}

fn write_array(
    writer: &mut BinaryWriter<'_>,
    init: i16,
    tracks: &[AnimCurve<'_>],
    layouts: &[Layout],
) -> Result<()> {
    writer.write_i16(to_i16("track count", tracks.len())?)?;
    writer.write_i16(init)?;
    for curve in tracks {
        writer.write_u32(curve.placeholder())?;
    }
    for layout in layouts {
        writer.write_u32(to_u32("track size", layout.size())?)?;
    }
    Ok(())
}

impl<'a> Lifecycle<'a> for AnimationList<'a> {
    type Seed = ();
    type Error = Error;

    fn initialize(region: Region<'a>, _seed: ()) -> Result<Option<Self>> {
        let (particle_init, particle) = read_array(&region, 0, TrackSet::Particle)?;
        let emitter_at = ARRAY_HEADER_SIZE + 8 * particle.len();
        let (emitter_init, emitter) = read_array(&region, emitter_at, TrackSet::Emitter)?;

        let mut pending = PendingTracks::default();
        let mut cursor = arrays_size(particle.len(), emitter.len());
        let mut index = 0;
        for (set, tracks) in [(&mut pending.particle, particle), (&mut pending.emitter, emitter)] {
            for (placeholder, size) in tracks {
                let seed = CurveSeed { index, placeholder };
                set.push((seed, region.sub(cursor, size as usize)?));
                cursor += size as usize;
                index += 1;
            }
        }

        Ok(Some(Self {
            state: NodeState::parsed(region),
            particle_init,
            emitter_init,
            particle_tracks: Vec::new(),
            emitter_tracks: Vec::new(),
            post_field: Cow::Borrowed(region.tail(cursor)?.bytes()),
            pending,
        }))
    }

    #[instrument(level = "trace", skip_all)]
    fn populate(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        for (tracks, found) in [
            (&mut self.particle_tracks, pending.particle),
            (&mut self.emitter_tracks, pending.emitter),
        ] {
            for (seed, region) in found {
                let mut curve = AnimCurve::initialize(region, seed)?.ok_or(Error::MissingBlock {
                    block: "animation curve",
                })?;
                curve.populate()?;
                tracks.push(curve);
            }
        }
        debug!(
            particle = self.particle_tracks.len(),
            emitter = self.emitter_tracks.len(),
            post_field = self.post_field.len(),
            "animation tracks"
        );
        self.state.mark_populated();
        Ok(())
    }

    fn calculate_size(&mut self, force: bool) -> Result<Layout> {
        let Self {
            state,
            particle_tracks,
            emitter_tracks,
            post_field,
            ..
        } = self;

        state.size_with(force, || {
            let header = arrays_size(particle_tracks.len(), emitter_tracks.len());
            let children = particle_tracks
                .iter_mut()
                .chain(emitter_tracks.iter_mut())
                .map(|curve| curve.calculate_size(force))
                .collect::<Result<Vec<_>>>()?;
            Ok(Layout::node(header, children, post_field.len()))
        })
    }

    fn rebuild(&mut self, target: &mut [u8], layout: &Layout) -> Result<()> {
        let Self {
            state,
            particle_init,
            emitter_init,
            particle_tracks,
            emitter_tracks,
            post_field,
            ..
        } = self;

        state.rebuild_with(target, layout, |carved| {
            let children = layout.children();
            check_size(particle_tracks.len() + emitter_tracks.len(), children.len())?;
            let (particle_layouts, emitter_layouts) = children.split_at(particle_tracks.len());

            let mut writer = BinaryWriter::new(carved.header);
            write_array(&mut writer, *particle_init, particle_tracks, particle_layouts)?;
            write_array(&mut writer, *emitter_init, emitter_tracks, emitter_layouts)?;
            check_size(writer.len(), writer.position())?;

            let curves = particle_tracks.iter_mut().chain(emitter_tracks.iter_mut());
            for ((curve, window), child) in curves.zip(carved.children).zip(children) {
                curve.rebuild(window, child)?;
            }

            check_size(post_field.len(), carved.trailing.len())?;
            carved.trailing.copy_from_slice(post_field);
            Ok(())
        })
    }

    fn state(&self) -> &NodeState<'a> {
        &self.state
    }
}

impl TreeNode for AnimationList<'_> {
    fn name(&self) -> String {
        "Animations".to_string()
    }

    fn kind(&self) -> &'static str {
        "animation-list"
    }

    fn fields(&self) -> Vec<Field> {
        vec![
            Field::new("particle_count", self.particle_tracks.len() as u32),
            Field::new("particle_init", self.particle_init),
            Field::new("emitter_count", self.emitter_tracks.len() as u32),
            Field::new("emitter_init", self.emitter_init),
            Field::new("post_field", FieldValue::Opaque(self.post_field.len())),
        ]
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> rekindle_node::Result<()> {
        match name {
            "particle_init" => self.set_particle_init(value.try_into()?),
            "emitter_init" => self.set_emitter_init(value.try_into()?),
            _ => return Err(unknown_field(self.kind(), name)),
        }
        Ok(())
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        self.particle_tracks
            .iter()
            .chain(&self.emitter_tracks)
            .map(|curve| curve as &dyn TreeNode)
            .collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn TreeNode> {
        self.state.invalidate();
        self.particle_tracks
            .iter_mut()
            .chain(self.emitter_tracks.iter_mut())
            .map(|curve| curve as &mut dyn TreeNode)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{CurveType, CURVE_HEADER_SIZE};
    use crate::curve_table::TableKind;
    use rekindle_node::{tree, BuildOptions};

    /// A curve with only a key table of one 4-byte record.
    fn curve(fill: u8) -> Vec<u8> {
        let mut data = vec![0u8; CURVE_HEADER_SIZE];
        data[2] = CurveType::ParticleFloat as u8;
        data[0x0C..0x10].copy_from_slice(&8u32.to_be_bytes());
        data.extend_from_slice(&[0, 1, 0, 0, fill, fill, fill, fill]);
        data
    }

    fn list(particle: &[Vec<u8>], emitter: &[Vec<u8>], post: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        for (i, tracks) in [particle, emitter].into_iter().enumerate() {
            data.extend_from_slice(&(tracks.len() as i16).to_be_bytes());
            data.extend_from_slice(&(i as i16 + 1).to_be_bytes());
            for (n, _) in tracks.iter().enumerate() {
                data.extend_from_slice(&(0xA0 + n as u32).to_be_bytes());
            }
            for track in tracks {
                data.extend_from_slice(&(track.len() as u32).to_be_bytes());
            }
        }
        for track in particle.iter().chain(emitter) {
            data.extend_from_slice(track);
        }
        data.extend_from_slice(post);
        data
    }

    #[test]
    fn test_tracks_are_carved_sequentially() {
        let data = list(&[curve(1), curve(2)], &[curve(3)], &[9, 9, 9, 9]);
        let anims: AnimationList = tree::load(&data, ()).unwrap().unwrap();

        assert_eq!(anims.tracks(TrackSet::Particle).len(), 2);
        assert_eq!(anims.tracks(TrackSet::Emitter).len(), 1);
        assert_eq!(anims.particle_init(), 1);
        assert_eq!(anims.emitter_init(), 2);
        assert_eq!(anims.post_field(), &[9, 9, 9, 9]);

        let emitter_track = &anims.tracks(TrackSet::Emitter)[0];
        assert_eq!(emitter_track.name(), "AnimCurve2");
        assert_eq!(emitter_track.placeholder(), 0xA0);
        let key = emitter_track.table(TableKind::Key).unwrap();
        assert_eq!(key.record(0), Some(&[3u8, 3, 3, 3][..]));
    }

    #[test]
    fn test_forced_rebuild_is_byte_exact() {
        let data = list(&[curve(1)], &[curve(2), curve(3)], &[1, 2]);
        let mut anims: AnimationList = tree::load(&data, ()).unwrap().unwrap();
        let bytes = tree::build(&mut anims, &BuildOptions::forced()).unwrap();
        assert_eq!(bytes, data);
    }

    #[test]
    fn test_empty_list() {
        let data = list(&[], &[], &[]);
        let anims: AnimationList = tree::load(&data, ()).unwrap().unwrap();
        assert_eq!(anims.track_count(), 0);
        assert!(anims.children().is_empty());
    }

    #[test]
    fn test_negative_count() {
        let mut data = list(&[], &[], &[]);
        data[0..2].copy_from_slice(&(-1i16).to_be_bytes());
        let result = tree::load::<AnimationList>(&data, ());
        assert!(matches!(result, Err(Error::Negative { .. })));
    }

    #[test]
    fn test_track_past_end() {
        let mut data = list(&[curve(1)], &[], &[]);
        data.truncate(data.len() - 4);
        let result = tree::load::<AnimationList>(&data, ());
        assert!(matches!(result, Err(Error::Common(_))));
    }

    #[test]
    fn test_remove_and_push_renumber() {
        let data = list(&[curve(1), curve(2)], &[curve(3)], &[]);
        let mut anims: AnimationList = tree::load(&data, ()).unwrap().unwrap();

        anims.remove_track(TrackSet::Particle, 0).unwrap();
        anims.push_track(TrackSet::Emitter, AnimCurve::new(4, CurveType::EmitterFloat));
        assert_eq!(anims.tracks(TrackSet::Emitter)[1].name(), "AnimCurve2");

        let bytes = tree::build(&mut anims, &BuildOptions::default()).unwrap();
        let reparsed: AnimationList = tree::load(&bytes, ()).unwrap().unwrap();
        assert_eq!(reparsed.tracks(TrackSet::Particle).len(), 1);
        assert_eq!(reparsed.tracks(TrackSet::Emitter).len(), 2);
        assert_eq!(reparsed.tracks(TrackSet::Emitter)[1].kind_type(), 4);
        assert_eq!(reparsed.tracks(TrackSet::Emitter)[1].table_count(), 0);
        assert!(anims.remove_track(TrackSet::Particle, 5).is_err());
    }
}
