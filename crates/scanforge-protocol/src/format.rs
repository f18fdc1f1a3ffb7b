//! Numeric and binary wire formats.
//!
//! The compound protocol carries every number in one of three ASCII
//! encodings, distinguished by a one-byte marker:
//!
//! ```text
//! decimal      d999              3 digits, [0, 999]
//! integer      i9999999          7 digits, [0, 9999999]
//!              i-999999          minus + 6 digits, [-999999, -1]
//! hexadecimal  xFFFFFFF          7 uppercase hex digits, [0, 0xFFFFFFF]
//! ```
//!
//! A `numeric` is whichever of the three the encoder picked; decoders accept
//! any of them. Binary data travels as a length-prefixed blob: a hexadecimal
//! byte count, the raw bytes, then NUL padding so the data stays 4-byte
//! aligned.
//!
//! Out-of-range values fail to encode and malformed literals fail to decode.
//! Nothing is ever wrapped or clamped: a field that cannot round-trip
//! exactly is a bug at the producing end, not something to paper over.

use bytes::{Buf, BufMut, Bytes};
use scanforge_core::constants::{DECIMAL_MAX, HEX_MAX, INTEGER_MAX, INTEGER_MIN};
use scanforge_core::{Error, Result};

/// Marker byte of the decimal format.
pub const MARKER_DECIMAL: u8 = b'd';

/// Marker byte of the integer format.
pub const MARKER_INTEGER: u8 = b'i';

/// Marker byte of the hexadecimal format.
pub const MARKER_HEX: u8 = b'x';

/// Encode a decimal field (`d` + 3 digits).
///
/// # Errors
/// Returns `Error::OutOfRange` unless `value` is in [0, 999].
pub fn put_decimal(buf: &mut impl BufMut, value: i32) -> Result<()> {
    if !(0..=DECIMAL_MAX).contains(&value) {
        return Err(Error::OutOfRange {
            value: value.into(),
            format: "decimal",
        });
    }
    buf.put_u8(MARKER_DECIMAL);
    buf.put_slice(format!("{:03}", value).as_bytes());
    Ok(())
}

/// Decode a decimal field.
pub fn get_decimal(buf: &mut impl Buf) -> Result<i32> {
    let raw = take_field::<4>(buf)?;
    if raw[0] != MARKER_DECIMAL {
        return Err(Error::InvalidFormat {
            message: format!("expected decimal marker 'd', got {:#04x}", raw[0]),
        });
    }
    parse_digits(&raw[1..])
}

/// Encode an integer field (`i` + 7 digits, or `i-` + 6 digits).
///
/// # Errors
/// Returns `Error::OutOfRange` unless `value` is in [-999999, 9999999].
pub fn put_integer(buf: &mut impl BufMut, value: i32) -> Result<()> {
    if !(INTEGER_MIN..=INTEGER_MAX).contains(&value) {
        return Err(Error::OutOfRange {
            value: value.into(),
            format: "integer",
        });
    }
    buf.put_u8(MARKER_INTEGER);
    if value < 0 {
        buf.put_slice(format!("-{:06}", -value).as_bytes());
    } else {
        buf.put_slice(format!("{:07}", value).as_bytes());
    }
    Ok(())
}

/// Decode an integer field.
pub fn get_integer(buf: &mut impl Buf) -> Result<i32> {
    let raw = take_field::<8>(buf)?;
    if raw[0] != MARKER_INTEGER {
        return Err(Error::InvalidFormat {
            message: format!("expected integer marker 'i', got {:#04x}", raw[0]),
        });
    }
    if raw[1] == b'-' {
        Ok(-parse_digits(&raw[2..])?)
    } else {
        parse_digits(&raw[1..])
    }
}

/// Encode a hexadecimal field (`x` + 7 uppercase hex digits).
///
/// # Errors
/// Returns `Error::OutOfRange` unless `value` is in [0, 0xFFFFFFF].
pub fn put_hexadecimal(buf: &mut impl BufMut, value: i64) -> Result<()> {
    if !(0..=HEX_MAX).contains(&value) {
        return Err(Error::OutOfRange {
            value,
            format: "hexadecimal",
        });
    }
    buf.put_u8(MARKER_HEX);
    buf.put_slice(format!("{:07X}", value).as_bytes());
    Ok(())
}

/// Decode a hexadecimal field.
pub fn get_hexadecimal(buf: &mut impl Buf) -> Result<i64> {
    let raw = take_field::<8>(buf)?;
    if raw[0] != MARKER_HEX {
        return Err(Error::InvalidFormat {
            message: format!("expected hexadecimal marker 'x', got {:#04x}", raw[0]),
        });
    }
    let mut value: i64 = 0;
    for &b in &raw[1..] {
        let digit = match b {
            b'0'..=b'9' => i64::from(b - b'0'),
            b'A'..=b'F' => i64::from(b - b'A' + 10),
            _ => {
                return Err(Error::InvalidFormat {
                    message: format!("invalid hex digit {:#04x}", b),
                });
            }
        };
        value = value * 16 + digit;
    }
    Ok(value)
}

/// Encode a numeric with the first representation that covers the value:
/// decimal, then integer, then hexadecimal.
pub fn put_numeric(buf: &mut impl BufMut, value: i32) -> Result<()> {
    if (0..=DECIMAL_MAX).contains(&value) {
        put_decimal(buf, value)
    } else if (INTEGER_MIN..=INTEGER_MAX).contains(&value) {
        put_integer(buf, value)
    } else {
        put_hexadecimal(buf, value.into())
    }
}

/// Decode whichever numeric representation is present.
pub fn get_numeric(buf: &mut impl Buf) -> Result<i32> {
    let marker = peek(buf)?;
    match marker {
        MARKER_DECIMAL => get_decimal(buf),
        MARKER_INTEGER => get_integer(buf),
        MARKER_HEX => {
            let value = get_hexadecimal(buf)?;
            i32::try_from(value).map_err(|_| Error::OutOfRange {
                value,
                format: "numeric",
            })
        }
        other => Err(Error::InvalidFormat {
            message: format!("expected a numeric marker, got {:#04x}", other),
        }),
    }
}

/// Decode a numeric that must be non-negative.
pub fn get_positive(buf: &mut impl Buf) -> Result<u32> {
    let value = get_numeric(buf)?;
    u32::try_from(value).map_err(|_| Error::OutOfRange {
        value: value.into(),
        format: "positive numeric",
    })
}

/// Decode a numeric that must be negative.
pub fn get_negative(buf: &mut impl Buf) -> Result<i32> {
    let value = get_numeric(buf)?;
    if value >= 0 {
        return Err(Error::OutOfRange {
            value: value.into(),
            format: "negative numeric",
        });
    }
    Ok(value)
}

/// Encode a length-prefixed blob.
///
/// The byte count goes out as a hexadecimal field, followed by the raw
/// bytes and NUL padding keeping the data portion 4-byte aligned.
pub fn put_blob(buf: &mut impl BufMut, data: &[u8]) -> Result<()> {
    put_hexadecimal(buf, data.len() as i64)?;
    buf.put_slice(data);
    let padding = 3 - (data.len() + 3) % 4;
    buf.put_bytes(0, padding);
    Ok(())
}

/// Decode a length-prefixed blob, consuming its padding.
pub fn get_blob(buf: &mut impl Buf) -> Result<Bytes> {
    let len = get_hexadecimal(buf)? as usize;
    let padding = 3 - (len + 3) % 4;
    if buf.remaining() < len + padding {
        return Err(Error::Truncated {
            expected: len + padding,
            actual: buf.remaining(),
        });
    }
    let data = buf.copy_to_bytes(len);
    buf.advance(padding);
    Ok(data)
}

/// Total encoded size of a blob carrying `len` data bytes.
#[must_use]
pub fn blob_wire_size(len: usize) -> usize {
    8 + len + (3 - (len + 3) % 4)
}

fn peek(buf: &mut impl Buf) -> Result<u8> {
    let chunk = buf.chunk();
    chunk.first().copied().ok_or(Error::Truncated {
        expected: 1,
        actual: 0,
    })
}

fn take_field<const N: usize>(buf: &mut impl Buf) -> Result<[u8; N]> {
    if buf.remaining() < N {
        return Err(Error::Truncated {
            expected: N,
            actual: buf.remaining(),
        });
    }
    let mut raw = [0u8; N];
    buf.copy_to_slice(&mut raw);
    Ok(raw)
}

fn parse_digits(digits: &[u8]) -> Result<i32> {
    let mut value: i32 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(Error::InvalidFormat {
                message: format!("invalid decimal digit {:#04x}", b),
            });
        }
        value = value * 10 + i32::from(b - b'0');
    }
    Ok(value)
}
