//! Canonical binary codec for the deterministic value space.
//!
//! The wire format is a deterministic subset of a tag-length-value binary
//! encoding: definite lengths only, shortest-form heads, big-endian
//! integers, 64-bit big-endian IEEE-754 floats, text-only map keys sorted
//! length-first then bytewise on their encoded form. Byte strings, tags,
//! indefinite lengths, and simple values other than false/true/null are
//! outside the subset and rejected.
//!
//! Both directions are total: encoding fails on the first violation,
//! decoding fails with the byte offset of the offending item. A decoded
//! value re-encodes to the exact input bytes.

use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;

use crate::types::{canonical_key_cmp, DvError, DvErrorKind, DvLimits, DvMap, DvValue};
use crate::{MAX_SAFE_INTEGER, MIN_SAFE_INTEGER};

// Major types of the underlying TLV encoding.
const MAJOR_UINT: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;
const MAJOR_SIMPLE: u8 = 7;

// Additional-info values within major 7.
const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;
const AI_FLOAT16: u8 = 25;
const AI_FLOAT32: u8 = 26;
const AI_FLOAT64: u8 = 27;

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a value into canonical bytes under the given limits.
///
/// Limits are clamped against the protocol defaults first: callers can
/// tighten but never loosen. Encoding aborts on the first violation.
pub fn encode(value: &DvValue, limits: &DvLimits) -> Result<Vec<u8>, DvError> {
    let limits = limits.clamped();
    let mut out = Vec::new();
    encode_value(value, &mut out, 1, &limits)?;
    Ok(out)
}

fn encode_value(
    value: &DvValue,
    out: &mut Vec<u8>,
    depth: u32,
    limits: &DvLimits,
) -> Result<(), DvError> {
    if depth > limits.max_depth {
        return Err(DvError::new(DvErrorKind::DepthExceeded));
    }

    match value {
        DvValue::Null => out.push(0xf6),
        DvValue::Bool(false) => out.push(0xf4),
        DvValue::Bool(true) => out.push(0xf5),
        DvValue::Int(n) => encode_integer(*n, out)?,
        DvValue::Float(f) => encode_float(*f, out)?,
        DvValue::String(s) => encode_text(s, out, limits)?,
        DvValue::Array(items) => {
            if items.len() > limits.max_container_len as usize {
                return Err(DvError::new(DvErrorKind::ArrayTooLong));
            }
            put_head(out, MAJOR_ARRAY, items.len() as u64);
            for item in items {
                encode_value(item, out, depth + 1, limits)?;
                ensure_encoded_size(out, limits)?;
            }
        }
        DvValue::Map(map) => {
            if map.len() > limits.max_container_len as usize {
                return Err(DvError::new(DvErrorKind::MapTooLong));
            }
            put_head(out, MAJOR_MAP, map.len() as u64);
            for (key, entry) in map.iter() {
                encode_text(key, out, limits)?;
                encode_value(entry, out, depth + 1, limits)?;
                ensure_encoded_size(out, limits)?;
            }
        }
    }

    ensure_encoded_size(out, limits)
}

fn encode_integer(n: i64, out: &mut Vec<u8>) -> Result<(), DvError> {
    if !(MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&n) {
        return Err(DvError::new(DvErrorKind::IntegerOutOfRange));
    }
    if n >= 0 {
        put_head(out, MAJOR_UINT, n as u64);
    } else {
        // Negative integers carry -1 - n in the head.
        put_head(out, MAJOR_NEGATIVE, (-1 - n) as u64);
    }
    Ok(())
}

fn encode_float(f: f64, out: &mut Vec<u8>) -> Result<(), DvError> {
    if !f.is_finite() {
        return Err(DvError::new(DvErrorKind::NanOrInf));
    }
    // Canonicalize: -0 becomes 0, and integral doubles within the safe
    // range take the integer form.
    if f.fract() == 0.0 && f >= MIN_SAFE_INTEGER as f64 && f <= MAX_SAFE_INTEGER as f64 {
        return encode_integer(f as i64, out);
    }
    out.push(0xe0 | AI_FLOAT64);
    out.extend_from_slice(&f.to_bits().to_be_bytes());
    Ok(())
}

fn encode_text(s: &str, out: &mut Vec<u8>, limits: &DvLimits) -> Result<(), DvError> {
    if s.len() > limits.max_string_bytes as usize {
        return Err(DvError::new(DvErrorKind::StringTooLong));
    }
    put_head(out, MAJOR_TEXT, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Writes a head byte plus the shortest-form argument.
fn put_head(out: &mut Vec<u8>, major: u8, arg: u64) {
    let tag = major << 5;
    if arg < 24 {
        out.push(tag | arg as u8);
    } else if arg <= 0xff {
        out.push(tag | 24);
        out.push(arg as u8);
    } else if arg <= 0xffff {
        out.push(tag | 25);
        out.extend_from_slice(&(arg as u16).to_be_bytes());
    } else if arg <= 0xffff_ffff {
        out.push(tag | 26);
        out.extend_from_slice(&(arg as u32).to_be_bytes());
    } else {
        out.push(tag | 27);
        out.extend_from_slice(&arg.to_be_bytes());
    }
}

fn ensure_encoded_size(out: &[u8], limits: &DvLimits) -> Result<(), DvError> {
    if out.len() > limits.max_encoded_bytes as usize {
        return Err(DvError::new(DvErrorKind::EncodedTooLarge));
    }
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes canonical bytes into a value under the given limits.
///
/// Rejects every non-canonical form: wider-than-necessary heads, float
/// encodings of integral values, out-of-order or duplicate map keys,
/// trailing bytes. Failures carry the byte offset of the offending item.
pub fn decode(bytes: &[u8], limits: &DvLimits) -> Result<DvValue, DvError> {
    let limits = limits.clamped();
    if bytes.len() > limits.max_encoded_bytes as usize {
        return Err(DvError::new(DvErrorKind::EncodedTooLarge));
    }

    let mut offset = 0usize;
    let value = decode_value(bytes, &mut offset, 1, &limits)?;
    if offset != bytes.len() {
        return Err(DvError::at(DvErrorKind::TrailingBytes, offset));
    }
    Ok(value)
}

/// Encode-then-decode clone: canonicalizes a value and proves it is within
/// limits in one pass.
pub fn canonical_clone(value: &DvValue, limits: &DvLimits) -> Result<DvValue, DvError> {
    let bytes = encode(value, limits)?;
    decode(&bytes, limits)
}

fn decode_value(
    bytes: &[u8],
    offset: &mut usize,
    depth: u32,
    limits: &DvLimits,
) -> Result<DvValue, DvError> {
    let item_start = *offset;
    if depth > limits.max_depth {
        return Err(DvError::at(DvErrorKind::DepthExceeded, item_start));
    }

    let head = get_u8(bytes, offset)?;
    let major = head >> 5;
    let ai = head & 0x1f;

    match major {
        MAJOR_UINT => {
            let arg = get_arg(bytes, offset, ai, item_start, DvErrorKind::NonCanonicalInteger)?;
            if arg > MAX_SAFE_INTEGER as u64 {
                return Err(DvError::at(DvErrorKind::IntegerOutOfRange, item_start));
            }
            Ok(DvValue::Int(arg as i64))
        }
        MAJOR_NEGATIVE => {
            let arg = get_arg(bytes, offset, ai, item_start, DvErrorKind::NonCanonicalInteger)?;
            // -1 - arg must stay within -(2^53 - 1).
            if arg >= MAX_SAFE_INTEGER as u64 {
                return Err(DvError::at(DvErrorKind::IntegerOutOfRange, item_start));
            }
            Ok(DvValue::Int(-1 - arg as i64))
        }
        MAJOR_TEXT => {
            let len = get_arg(bytes, offset, ai, item_start, DvErrorKind::NonCanonicalLength)?;
            let s = decode_text_payload(bytes, offset, len, item_start, limits)?;
            Ok(DvValue::String(s))
        }
        MAJOR_ARRAY => {
            let len = get_arg(bytes, offset, ai, item_start, DvErrorKind::NonCanonicalLength)?;
            if len > limits.max_container_len as u64 {
                return Err(DvError::at(DvErrorKind::ArrayTooLong, item_start));
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(decode_value(bytes, offset, depth + 1, limits)?);
            }
            Ok(DvValue::Array(items))
        }
        MAJOR_MAP => {
            let len = get_arg(bytes, offset, ai, item_start, DvErrorKind::NonCanonicalLength)?;
            if len > limits.max_container_len as u64 {
                return Err(DvError::at(DvErrorKind::MapTooLong, item_start));
            }
            let mut map = DvMap::new();
            let mut prev_key: Option<String> = None;
            for _ in 0..len {
                let key_start = *offset;
                let key_head = get_u8(bytes, offset)?;
                if key_head >> 5 != MAJOR_TEXT {
                    return Err(DvError::at(DvErrorKind::UnsupportedCbor, key_start));
                }
                let key_len = get_arg(
                    bytes,
                    offset,
                    key_head & 0x1f,
                    key_start,
                    DvErrorKind::NonCanonicalLength,
                )?;
                let key = decode_text_payload(bytes, offset, key_len, key_start, limits)?;

                if let Some(prev) = &prev_key {
                    match canonical_key_cmp(prev, &key) {
                        Ordering::Less => {}
                        Ordering::Equal => {
                            return Err(DvError::at(DvErrorKind::DuplicateKey, key_start))
                        }
                        Ordering::Greater => {
                            return Err(DvError::at(DvErrorKind::KeyOrder, key_start))
                        }
                    }
                }

                let value = decode_value(bytes, offset, depth + 1, limits)?;
                prev_key = Some(key.clone());
                map.push_decoded(key, value);
            }
            Ok(DvValue::Map(map))
        }
        MAJOR_BYTES | MAJOR_TAG => Err(DvError::at(DvErrorKind::UnsupportedCbor, item_start)),
        MAJOR_SIMPLE => match ai {
            SIMPLE_FALSE => Ok(DvValue::Bool(false)),
            SIMPLE_TRUE => Ok(DvValue::Bool(true)),
            SIMPLE_NULL => Ok(DvValue::Null),
            AI_FLOAT16 | AI_FLOAT32 => Err(DvError::at(DvErrorKind::NonCanonicalFloat, item_start)),
            AI_FLOAT64 => {
                let raw = get_exact::<8>(bytes, offset)?;
                let f = f64::from_bits(u64::from_be_bytes(raw));
                if !f.is_finite() {
                    return Err(DvError::at(DvErrorKind::NanOrInf, item_start));
                }
                if f.fract() == 0.0
                    && f >= MIN_SAFE_INTEGER as f64
                    && f <= MAX_SAFE_INTEGER as f64
                {
                    // Integral values (including -0) must use the integer form.
                    return Err(DvError::at(DvErrorKind::NonCanonicalFloat, item_start));
                }
                Ok(DvValue::Float(f))
            }
            _ => Err(DvError::at(DvErrorKind::UnsupportedCbor, item_start)),
        },
        _ => unreachable!("major is a 3-bit field"),
    }
}

fn decode_text_payload(
    bytes: &[u8],
    offset: &mut usize,
    len: u64,
    item_start: usize,
    limits: &DvLimits,
) -> Result<String, DvError> {
    if len > limits.max_string_bytes as u64 {
        return Err(DvError::at(DvErrorKind::StringTooLong, item_start));
    }
    let payload_start = *offset;
    let raw = get_slice(bytes, offset, len as usize)?;
    match core::str::from_utf8(raw) {
        Ok(s) => Ok(String::from(s)),
        Err(_) => Err(DvError::at(DvErrorKind::InvalidUtf8, payload_start)),
    }
}

/// Reads the head argument, enforcing shortest-form widths. Indefinite
/// lengths and reserved additional-info values are outside the subset.
fn get_arg(
    bytes: &[u8],
    offset: &mut usize,
    ai: u8,
    item_start: usize,
    non_canonical: DvErrorKind,
) -> Result<u64, DvError> {
    match ai {
        0..=23 => Ok(ai as u64),
        24 => {
            let v = get_u8(bytes, offset)? as u64;
            if v < 24 {
                return Err(DvError::at(non_canonical, item_start));
            }
            Ok(v)
        }
        25 => {
            let v = u16::from_be_bytes(get_exact::<2>(bytes, offset)?) as u64;
            if v <= 0xff {
                return Err(DvError::at(non_canonical, item_start));
            }
            Ok(v)
        }
        26 => {
            let v = u32::from_be_bytes(get_exact::<4>(bytes, offset)?) as u64;
            if v <= 0xffff {
                return Err(DvError::at(non_canonical, item_start));
            }
            Ok(v)
        }
        27 => {
            let v = u64::from_be_bytes(get_exact::<8>(bytes, offset)?);
            if v <= 0xffff_ffff {
                return Err(DvError::at(non_canonical, item_start));
            }
            Ok(v)
        }
        _ => Err(DvError::at(DvErrorKind::UnsupportedCbor, item_start)),
    }
}

fn get_u8(bytes: &[u8], offset: &mut usize) -> Result<u8, DvError> {
    if *offset >= bytes.len() {
        return Err(DvError::at(DvErrorKind::Truncated, *offset));
    }
    let b = bytes[*offset];
    *offset += 1;
    Ok(b)
}

fn get_exact<const N: usize>(bytes: &[u8], offset: &mut usize) -> Result<[u8; N], DvError> {
    let end = offset
        .checked_add(N)
        .ok_or(DvError::at(DvErrorKind::Truncated, *offset))?;
    if end > bytes.len() {
        return Err(DvError::at(DvErrorKind::Truncated, *offset));
    }
    let out: [u8; N] = bytes[*offset..end]
        .try_into()
        .map_err(|_| DvError::at(DvErrorKind::Truncated, *offset))?;
    *offset = end;
    Ok(out)
}

fn get_slice<'a>(bytes: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], DvError> {
    let end = offset
        .checked_add(len)
        .ok_or(DvError::at(DvErrorKind::Truncated, *offset))?;
    if end > bytes.len() {
        return Err(DvError::at(DvErrorKind::Truncated, *offset));
    }
    let slice = &bytes[*offset..end];
    *offset = end;
    Ok(slice)
}

// ============================================================================
// Tests
// ============================================================================
