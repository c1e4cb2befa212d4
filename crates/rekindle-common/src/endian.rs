//! Offset-addressed big-endian accessors.
//!
//! Every multi-byte value in the supported containers is stored big-endian.
//! Values are decoded to host-native representation at the boundary through
//! [`BigEndianCodec`]; nothing above this module sees wire-order bytes.

use byteorder::{BigEndian, ByteOrder};

use crate::{Error, Result};

/// A fixed-width value with a big-endian wire encoding.
pub trait BigEndianCodec: Sized + Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Decode from the first [`Self::WIDTH`] bytes of `bytes`.
    fn decode(bytes: &[u8]) -> Self;

    /// Encode into the first [`Self::WIDTH`] bytes of `bytes`.
    fn encode(self, bytes: &mut [u8]);
}

impl BigEndianCodec for u8 {
    const WIDTH: usize = 1;

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        bytes[0]
    }

    #[inline]
    fn encode(self, bytes: &mut [u8]) {
        bytes[0] = self;
    }
}

impl BigEndianCodec for i8 {
    const WIDTH: usize = 1;

    #[inline]
    fn decode(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    #[inline]
    fn encode(self, bytes: &mut [u8]) {
        bytes[0] = self as u8;
    }
}

macro_rules! impl_codec {
    ($($ty:ty => $width:literal, $read:ident, $write:ident;)*) => {
        $(
            impl BigEndianCodec for $ty {
                const WIDTH: usize = $width;

                #[inline]
                fn decode(bytes: &[u8]) -> Self {
                    BigEndian::$read(bytes)
                }

                #[inline]
                fn encode(self, bytes: &mut [u8]) {
                    BigEndian::$write(bytes, self);
                }
            }
        )*
    };
}

impl_codec! {
    u16 => 2, read_u16, write_u16;
    i16 => 2, read_i16, write_i16;
    u32 => 4, read_u32, write_u32;
    i32 => 4, read_i32, write_i32;
    f32 => 4, read_f32, write_f32;
}

#[inline]
fn window(buffer: &[u8], offset: usize, width: usize) -> Result<&[u8]> {
    match offset.checked_add(width) {
        Some(end) if end <= buffer.len() => Ok(&buffer[offset..end]),
        _ => Err(Error::OutOfBounds {
            offset,
            width,
            len: buffer.len(),
        }),
    }
}

#[inline]
fn window_mut(buffer: &mut [u8], offset: usize, width: usize) -> Result<&mut [u8]> {
    let len = buffer.len();
    match offset.checked_add(width) {
        Some(end) if end <= len => Ok(&mut buffer[offset..end]),
        _ => Err(Error::OutOfBounds { offset, width, len }),
    }
}

/// Read any [`BigEndianCodec`] value at `offset`.
#[inline]
pub fn read<T: BigEndianCodec>(buffer: &[u8], offset: usize) -> Result<T> {
    window(buffer, offset, T::WIDTH).map(T::decode)
}

/// Write any [`BigEndianCodec`] value at `offset`.
#[inline]
pub fn write<T: BigEndianCodec>(buffer: &mut [u8], offset: usize, value: T) -> Result<()> {
    value.encode(window_mut(buffer, offset, T::WIDTH)?);
    Ok(())
}

macro_rules! scalar_accessors {
    ($($ty:ty => $read:ident, $write:ident;)*) => {
        $(
            #[doc = concat!("Read a big-endian `", stringify!($ty), "` at `offset`.")]
            #[inline]
            pub fn $read(buffer: &[u8], offset: usize) -> Result<$ty> {
                read::<$ty>(buffer, offset)
            }

            #[doc = concat!("Write a big-endian `", stringify!($ty), "` at `offset`.")]
            #[inline]
            pub fn $write(buffer: &mut [u8], offset: usize, value: $ty) -> Result<()> {
                write::<$ty>(buffer, offset, value)
            }
        )*
    };
}

scalar_accessors! {
    u8 => read_u8, write_u8;
    i8 => read_i8, write_i8;
    u16 => read_u16, write_u16;
    i16 => read_i16, write_i16;
    u32 => read_u32, write_u32;
    i32 => read_i32, write_i32;
    f32 => read_f32, write_f32;
}

/// Read the bytes starting at `offset`, stopping at the first zero byte or
/// after `limit` bytes, whichever comes first. The terminator is excluded.
pub fn read_cstring(buffer: &[u8], offset: usize, limit: usize) -> Result<&[u8]> {
    if offset > buffer.len() {
        return Err(Error::OutOfBounds {
            offset,
            width: limit,
            len: buffer.len(),
        });
    }
    let end = offset.saturating_add(limit).min(buffer.len());
    let run = &buffer[offset..end];
    let terminator = memchr::memchr(0, run).unwrap_or(run.len());
    Ok(&run[..terminator])
}
