//! Byte encodings for the store.
//!
//! Generations are zigzag LEB128 varints (the encoding shared by every
//! process that has ever written one of these databases), biases are raw
//! 8-byte little-endian IEEE-754 doubles, and item keys live under the
//! `"s:"` namespace with properties under `"p:"`.

/// Namespace prefix for item keys.
pub(crate) const ITEM_PREFIX: &[u8] = b"s:";
/// Property key holding the persisted minimum-generation watermark.
pub(crate) const PROP_MIN_GEN: &[u8] = b"p:mingen";
/// Property key holding the persisted bias.
pub(crate) const PROP_BIAS: &[u8] = b"p:bias";

/// Longest encoded varint for a 64-bit value.
const MAX_VARINT_LEN: usize = 10;

/// Encodes a signed generation as a zigzag LEB128 varint.
pub(crate) fn encode_varint(value: i64) -> Vec<u8> {
    let mut zigzag = (value as u64) << 1;
    if value < 0 {
        zigzag = !zigzag;
    }

    let mut out = Vec::with_capacity(MAX_VARINT_LEN);
    while zigzag >= 0x80 {
        out.push((zigzag as u8) | 0x80);
        zigzag >>= 7;
    }
    out.push(zigzag as u8);
    out
}

/// Decodes a zigzag LEB128 varint, ignoring any trailing bytes.
///
/// Returns `None` for truncated or overlong input; callers treat that as a
/// missing value and rewrite it on the next store write.
pub(crate) fn decode_varint(buf: &[u8]) -> Option<i64> {
    let mut zigzag: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return None;
        }
        if byte < 0x80 {
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return None;
            }
            zigzag |= u64::from(byte) << shift;
            let value = (zigzag >> 1) as i64;
            return Some(if zigzag & 1 != 0 { !value } else { value });
        }
        zigzag |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }
    None
}

/// Encodes a bias as its little-endian bit pattern.
pub(crate) fn encode_bias(bias: f64) -> [u8; 8] {
    bias.to_le_bytes()
}

/// Decodes a bias; anything but exactly eight bytes is ignored.
pub(crate) fn decode_bias(buf: &[u8]) -> Option<f64> {
    let bytes: [u8; 8] = buf.try_into().ok()?;
    Some(f64::from_le_bytes(bytes))
}

/// The store key for an item.
pub(crate) fn item_key(key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(ITEM_PREFIX.len() + key.len());
    out.extend_from_slice(ITEM_PREFIX);
    out.extend_from_slice(key.as_bytes());
    out
}

/// Recovers the item key from a store key by stripping the literal `"s:"`
/// prefix. The prefix must already have been checked by the caller.
pub(crate) fn item_key_to_string(raw: &[u8]) -> String {
    String::from_utf8_lossy(&raw[ITEM_PREFIX.len()..]).into_owned()
}
