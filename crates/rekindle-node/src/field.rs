//! Typed field values exposed to hosts.

use std::fmt;

use rekindle_common::{endian::BigEndianCodec, Rgba, Vec2, Vec3};
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{Error, Result};

/// A decoded, host-native field value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(tag = "type", content = "value"))]
pub enum FieldValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Rgba(Rgba),
    Text(String),
    /// An opaque byte run, reported by length only.
    Opaque(usize),
}

/// One named field of a node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Field {
    pub name: &'static str,
    /// Byte offset inside the node's own block, for fixed-layout fields.
    pub offset: Option<usize>,
    pub value: FieldValue,
}

impl Field {
    /// A field stored at a fixed offset.
    pub fn at(name: &'static str, offset: usize, value: impl Into<FieldValue>) -> Self {
        Self {
            name,
            offset: Some(offset),
            value: value.into(),
        }
    }

    /// A field without a fixed offset (names, counts, derived values).
    pub fn new(name: &'static str, value: impl Into<FieldValue>) -> Self {
        Self {
            name,
            offset: None,
            value: value.into(),
        }
    }
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::U8(_) => "u8",
            Self::I8(_) => "i8",
            Self::U16(_) => "u16",
            Self::I16(_) => "i16",
            Self::U32(_) => "u32",
            Self::I32(_) => "i32",
            Self::F32(_) => "f32",
            Self::Vec2(_) => "vec2",
            Self::Vec3(_) => "vec3",
            Self::Rgba(_) => "rgba",
            Self::Text(_) => "text",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Parse `text` into a value of the same type as `self`.
    ///
    /// Integers accept decimal or `0x` hex; vectors take comma-separated
    /// components; colors take `#RRGGBBAA` or four comma-separated bytes.
    pub fn parse_like(&self, text: &str) -> Result<FieldValue> {
        let text = text.trim();
        let invalid = || Error::FieldType {
            expected: self.type_name(),
            actual: "unparseable text",
        };

        let value = match self {
            Self::U8(_) => Self::U8(parse_int(text).ok_or_else(invalid)?),
            Self::I8(_) => Self::I8(parse_int(text).ok_or_else(invalid)?),
            Self::U16(_) => Self::U16(parse_int(text).ok_or_else(invalid)?),
            Self::I16(_) => Self::I16(parse_int(text).ok_or_else(invalid)?),
            Self::U32(_) => Self::U32(parse_int(text).ok_or_else(invalid)?),
            Self::I32(_) => Self::I32(parse_int(text).ok_or_else(invalid)?),
            Self::F32(_) => Self::F32(text.parse().map_err(|_| invalid())?),
            Self::Vec2(_) => {
                let [x, y] = parse_floats(text).ok_or_else(invalid)?;
                Self::Vec2(Vec2::new(x, y))
            }
            Self::Vec3(_) => {
                let [x, y, z] = parse_floats(text).ok_or_else(invalid)?;
                Self::Vec3(Vec3::new(x, y, z))
            }
            Self::Rgba(_) => Self::Rgba(parse_rgba(text).ok_or_else(invalid)?),
            Self::Text(_) => Self::Text(text.to_string()),
            Self::Opaque(_) => {
                return Err(Error::FieldType {
                    expected: "editable field",
                    actual: "opaque",
                })
            }
        };
        Ok(value)
    }
}

fn parse_int<T: TryFrom<i64>>(text: &str) -> Option<T> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    T::try_from(if negative { -magnitude } else { magnitude }).ok()
}

fn parse_floats<const N: usize>(text: &str) -> Option<[f32; N]> {
    let mut out = [0.0f32; N];
    let mut parts = text.split(',');
    for slot in &mut out {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    parts.next().is_none().then_some(out)
}

fn parse_rgba(text: &str) -> Option<Rgba> {
    if let Some(hex) = text.strip_prefix('#') {
        if hex.len() != 8 {
            return None;
        }
        let packed = u32::from_str_radix(hex, 16).ok()?;
        let [r, g, b, a] = packed.to_be_bytes();
        return Some(Rgba::new(r, g, b, a));
    }
    let mut bytes = [0u8; 4];
    let mut parts = text.split(',');
    for slot in &mut bytes {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    parts
        .next()
        .is_none()
        .then(|| Rgba::new(bytes[0], bytes[1], bytes[2], bytes[3]))
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v:#010x}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::Vec2(v) => write!(f, "{v}"),
            Self::Vec3(v) => write!(f, "{v}"),
            Self::Rgba(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Opaque(len) => write!(f, "<{len} bytes>"),
        }
    }
}

/// Scalar types that can live at a fixed offset in a raw block.
pub trait RawField: BigEndianCodec + Into<FieldValue> + TryFrom<FieldValue, Error = Error> {}

impl<T> RawField for T where T: BigEndianCodec + Into<FieldValue> + TryFrom<FieldValue, Error = Error> {}

macro_rules! field_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }

            impl TryFrom<FieldValue> for $ty {
                type Error = Error;

                fn try_from(value: FieldValue) -> Result<Self> {
                    match value {
                        FieldValue::$variant(v) => Ok(v),
                        other => Err(Error::FieldType {
                            expected: $name,
                            actual: other.type_name(),
                        }),
                    }
                }
            }
        )*
    };
}

field_conversions! {
    u8 => U8, "u8";
    i8 => I8, "i8";
    u16 => U16, "u16";
    i16 => I16, "i16";
    u32 => U32, "u32";
    i32 => I32, "i32";
    f32 => F32, "f32";
    Vec2 => Vec2, "vec2";
    Vec3 => Vec3, "vec3";
    Rgba => Rgba, "rgba";
    String => Text, "text";
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Decode a raw field. `raw` is sized at construction to cover every
/// declared field, so the window is always in range.
#[doc(hidden)]
#[inline]
pub fn read_raw<T: RawField>(raw: &[u8], offset: usize) -> T {
    T::decode(&raw[offset..offset + T::WIDTH])
}

#[doc(hidden)]
#[inline]
pub fn write_raw<T: RawField>(raw: &mut [u8], offset: usize, value: T) {
    value.encode(&mut raw[offset..offset + T::WIDTH]);
}
