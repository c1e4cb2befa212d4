//! Scalar aggregates used by effect parameter blocks.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::endian::BigEndianCodec;

/// Two packed big-endian `f32` components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Three packed big-endian `f32` components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// An 8-bit-per-channel color stored as `R, G, B, A`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl BigEndianCodec for Vec2 {
    const WIDTH: usize = 8;

    fn decode(bytes: &[u8]) -> Self {
        Self::new(f32::decode(&bytes[0..]), f32::decode(&bytes[4..]))
    }

    fn encode(self, bytes: &mut [u8]) {
        self.x.encode(&mut bytes[0..]);
        self.y.encode(&mut bytes[4..]);
    }
}

impl BigEndianCodec for Vec3 {
    const WIDTH: usize = 12;

    fn decode(bytes: &[u8]) -> Self {
        Self::new(
            f32::decode(&bytes[0..]),
            f32::decode(&bytes[4..]),
            f32::decode(&bytes[8..]),
        )
    }

    fn encode(self, bytes: &mut [u8]) {
        self.x.encode(&mut bytes[0..]);
        self.y.encode(&mut bytes[4..]);
        self.z.encode(&mut bytes[8..]);
    }
}

impl BigEndianCodec for Rgba {
    const WIDTH: usize = 4;

    fn decode(bytes: &[u8]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    fn encode(self, bytes: &mut [u8]) {
        bytes[..4].copy_from_slice(&[self.r, self.g, self.b, self.a]);
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian;

    #[test]
    fn test_vec3_decode() {
        let mut data = [0u8; 12];
        endian::write_f32(&mut data, 0, 1.0).unwrap();
        endian::write_f32(&mut data, 4, -2.5).unwrap();
        endian::write_f32(&mut data, 8, 0.25).unwrap();
        assert_eq!(
            endian::read::<Vec3>(&data, 0).unwrap(),
            Vec3::new(1.0, -2.5, 0.25)
        );
    }

    #[test]
    fn test_rgba_display() {
        assert_eq!(Rgba::new(0xFF, 0x80, 0, 0x7F).to_string(), "#FF80007F");
    }
}
