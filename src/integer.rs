//! Prefix integer encoding and decoding.
//!
//! Implements the variable-length integer encoding of RFC 7541 Section 5.1.
//! An integer occupies the low N bits of a starting octet (1 <= N <= 8) plus
//! zero or more continuation octets, each carrying 7 value bits and a
//! continuation flag in the high bit.
//!
//! HPACK bounds every representable quantity (indices, string lengths, table
//! sizes) by 2^31 - 1; decoding rejects anything larger.

use bytes::{BufMut, BytesMut};

use crate::error::{HpackError, Result};

/// Largest integer the codec will decode (2^31 - 1).
pub const MAX_INTEGER: u32 = i32::MAX as u32;

/// Encodes `value` with an N-bit prefix.
///
/// `mask` supplies the representation-type bits above the prefix and must not
/// overlap the low `prefix_bits` bits of the first octet.
pub fn encode(buf: &mut BytesMut, mask: u8, prefix_bits: u8, value: u32) {
    debug_assert!((1..=8).contains(&prefix_bits), "prefix bits must be 1-8");

    let max_prefix = max_prefix(prefix_bits);
    if value < max_prefix {
        buf.put_u8(mask | value as u8);
        return;
    }

    buf.put_u8(mask | max_prefix as u8);
    let mut remaining = value - max_prefix;
    while remaining >= 0x80 {
        buf.put_u8(0x80 | (remaining & 0x7f) as u8);
        remaining >>= 7;
    }
    buf.put_u8(remaining as u8);
}

/// Decodes an integer whose first octet starts at `src[0]`.
///
/// Returns the value and the number of octets consumed, or `Ok(None)` when
/// `src` ends before the integer does. On `Ok(None)` the caller must not
/// advance its cursor: re-presenting the same octets later resumes the
/// decode from the start of the integer.
pub fn decode(src: &[u8], prefix_bits: u8) -> Result<Option<(u32, usize)>> {
    debug_assert!((1..=8).contains(&prefix_bits), "prefix bits must be 1-8");

    let Some(&first) = src.first() else {
        return Ok(None);
    };
    let prefix = u32::from(first) & max_prefix(prefix_bits);
    if prefix < max_prefix(prefix_bits) {
        return Ok(Some((prefix, 1)));
    }
    match decode_continuation(&src[1..], prefix)? {
        Some((value, consumed)) => Ok(Some((value, consumed + 1))),
        None => Ok(None),
    }
}

/// Decodes the continuation octets of an integer whose N-bit prefix was all
/// ones, yielding `base` plus the accumulated continuation value.
///
/// `Ok(None)` signals that more octets are needed; the caller must re-present
/// the continuation octets from the start. Accumulations that would exceed
/// [`MAX_INTEGER`] fail decompression: at shift 28 the top five bits of the
/// incoming octet must be clear, and a shift of 32 or more is rejected
/// outright.
pub fn decode_continuation(src: &[u8], base: u32) -> Result<Option<(u32, usize)>> {
    let mut accumulated: u64 = 0;
    let mut shift = 0u32;

    for (i, &octet) in src.iter().enumerate() {
        if shift == 28 && octet & 0xf8 != 0 {
            return Err(HpackError::IntegerOverflow);
        }
        accumulated |= u64::from(octet & 0x7f) << shift;
        if octet & 0x80 == 0 {
            let value = u64::from(base) + accumulated;
            if value > u64::from(MAX_INTEGER) {
                return Err(HpackError::IntegerOverflow);
            }
            return Ok(Some((value as u32, i + 1)));
        }
        shift += 7;
        if shift >= 32 {
            return Err(HpackError::IntegerOverflow);
        }
    }

    Ok(None)
}

fn max_prefix(prefix_bits: u8) -> u32 {
    (1u32 << prefix_bits) - 1
}
