//! Fixed-width datum packing and ASCII value streams.
//!
//! Every numeric element type an instrument can transfer implements
//! [`Datum`]; packing and unpacking go through `byteorder` in the
//! endianness the caller requests (little-endian by default at the engine
//! surface). Byte-opaque transfers (`s`/`p` style) stay at the raw-`u8`
//! level in the engine and never pass through here.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Default element separator for ASCII value streams.
pub const DEFAULT_SEPARATOR: &str = ",";

/// A fixed-width element of a binary transfer.
pub trait Datum: Copy {
    const SIZE: usize;

    /// Decode one element from the first `SIZE` bytes of `buf`.
    fn read_from(buf: &[u8], big_endian: bool) -> Self;

    /// Append the element to `out`.
    fn write_to(&self, out: &mut Vec<u8>, big_endian: bool);
}

impl Datum for u8 {
    const SIZE: usize = 1;

    fn read_from(buf: &[u8], _big_endian: bool) -> Self {
        buf[0]
    }

    fn write_to(&self, out: &mut Vec<u8>, _big_endian: bool) {
        out.push(*self);
    }
}

impl Datum for i8 {
    const SIZE: usize = 1;

    fn read_from(buf: &[u8], _big_endian: bool) -> Self {
        buf[0] as i8
    }

    fn write_to(&self, out: &mut Vec<u8>, _big_endian: bool) {
        out.push(*self as u8);
    }
}

macro_rules! impl_datum {
    ($($ty:ty, $size:expr, $read:ident, $write:ident;)*) => {
        $(
            impl Datum for $ty {
                const SIZE: usize = $size;

                fn read_from(buf: &[u8], big_endian: bool) -> Self {
                    if big_endian {
                        BigEndian::$read(buf)
                    } else {
                        LittleEndian::$read(buf)
                    }
                }

                fn write_to(&self, out: &mut Vec<u8>, big_endian: bool) {
                    let start = out.len();
                    out.resize(start + $size, 0);
                    if big_endian {
                        BigEndian::$write(&mut out[start..], *self);
                    } else {
                        LittleEndian::$write(&mut out[start..], *self);
                    }
                }
            }
        )*
    };
}

impl_datum! {
    i16, 2, read_i16, write_i16;
    u16, 2, read_u16, write_u16;
    i32, 4, read_i32, write_i32;
    u32, 4, read_u32, write_u32;
    i64, 8, read_i64, write_i64;
    u64, 8, read_u64, write_u64;
    f32, 4, read_f32, write_f32;
    f64, 8, read_f64, write_f64;
}

/// Decode a payload into elements. The payload must hold a whole number of
/// elements; a remainder is an error rather than a silent truncation.
pub fn unpack<T: Datum>(payload: &[u8], big_endian: bool) -> Result<Vec<T>> {
    if payload.len() % T::SIZE != 0 {
        return Err(Error::protocol(format!(
            "payload of {} bytes is not a multiple of the {}-byte element size",
            payload.len(),
            T::SIZE
        )));
    }
    Ok(payload
        .chunks_exact(T::SIZE)
        .map(|chunk| T::read_from(chunk, big_endian))
        .collect())
}

/// Encode elements into a contiguous payload.
pub fn pack<T: Datum>(values: &[T], big_endian: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::SIZE);
    for value in values {
        value.write_to(&mut out, big_endian);
    }
    out
}

/// Pack bytes with a leading length octet (the `p` element kind).
/// Raw byte payloads (`s`) need no framing and stay plain `u8` slices.
pub fn pack_prefixed(data: &[u8]) -> Result<Vec<u8>> {
    let len = u8::try_from(data.len()).map_err(|_| {
        Error::protocol(format!(
            "length-prefixed element of {} bytes exceeds the 255-byte limit",
            data.len()
        ))
    })?;
    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(len);
    out.extend_from_slice(data);
    Ok(out)
}

/// Decode one length-prefixed element, returning the bytes and the number
/// of payload bytes consumed.
pub fn unpack_prefixed(payload: &[u8]) -> Result<(Vec<u8>, usize)> {
    let Some(&len) = payload.first() else {
        return Err(Error::protocol("empty length-prefixed element"));
    };
    let end = 1 + len as usize;
    if payload.len() < end {
        return Err(Error::protocol(format!(
            "length-prefixed element declares {len} bytes but only {} remain",
            payload.len() - 1
        )));
    }
    Ok((payload[1..end].to_vec(), end))
}

/// Parse an ASCII value stream with the given separator and per-element
/// converter. A trailing separator (and trailing whitespace) is tolerated;
/// an empty element anywhere else is an error.
pub fn parse_ascii_values<T, F>(text: &str, separator: &str, convert: F) -> Result<Vec<T>>
where
    F: Fn(&str) -> Option<T>,
{
    let trimmed = text.trim_end();
    let trimmed = trimmed.strip_suffix(separator).unwrap_or(trimmed);

    let mut out = Vec::new();
    if trimmed.trim().is_empty() {
        return Ok(out);
    }
    for token in trimmed.split(separator) {
        let token = token.trim();
        let value = convert(token)
            .ok_or_else(|| Error::protocol(format!("cannot convert ascii value '{token}'")))?;
        out.push(value);
    }
    Ok(out)
}

/// Render values as an ASCII stream using `format` per element.
pub fn format_ascii_values<T, F>(values: &[T], separator: &str, format: F) -> String
where
    F: Fn(&T) -> String,
{
    values
        .iter()
        .map(|v| format(v))
        .collect::<Vec<_>>()
        .join(separator)
}
