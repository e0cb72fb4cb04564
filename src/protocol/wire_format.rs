//! Wire format encoding and decoding.
//!
//! Every message is built from one primitive, the pair:
//! ```text
//! ┌──────────┬────────────┬──────────┬─────────────┐
//! │ Name len │ Name bytes │ Value len│ Value bytes │
//! │ 8 bytes  │ name len   │ 8 bytes  │ value len   │
//! │ u64 NE   │            │ u64 NE   │             │
//! └──────────┴────────────┴──────────┴─────────────┘
//! ```
//!
//! Length prefixes use native byte order and width; node and host are
//! expected to run on the same machine. Lengths count raw bytes, there is
//! no terminator on the wire.
//!
//! A numeric pair carries the decimal ASCII text of an integer as its value.

use bytes::{BufMut, BytesMut};

/// Size of a length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 8;

/// Default maximum size of a single name or value (64 MB).
pub const DEFAULT_MAX_FIELD_SIZE: usize = 64 * 1024 * 1024;

/// Completion value meaning "finished".
///
/// Normal progress is a fraction in `0.0..=1.0`; hosts treat anything
/// above that range as the end of the request.
pub const PROGRESS_DONE: f64 = 10.0;

/// Number of items following an attribute header in a snapshot.
pub const ATTR_ITEM_COUNT: i64 = 5;

/// Number of items following a progress header.
pub const PROGRESS_ITEM_COUNT: i64 = 3;

/// Message kind tags (the name of a message's leading pair).
pub mod kinds {
    /// Node identity, first pair of the handshake.
    pub const UID: &str = "uid";
    /// Attribute snapshot or update.
    pub const ATTRS: &str = "attrs";
    /// Progress record.
    pub const PROGRESS: &str = "progress";
}

/// Item names inside a progress record.
pub mod progress_fields {
    /// Completion fraction (or [`PROGRESS_DONE`](super::PROGRESS_DONE)).
    pub const PROC: &str = "proc";
    /// Human-readable description of the current step.
    pub const DESC: &str = "desc";
    /// Error text; empty for none.
    pub const ERROR: &str = "error";
}

/// Encode a length prefix.
#[inline]
pub fn encode_length(len: usize) -> [u8; LENGTH_PREFIX_SIZE] {
    (len as u64).to_ne_bytes()
}

/// Decode a length prefix.
///
/// Returns `None` if the buffer is shorter than [`LENGTH_PREFIX_SIZE`].
#[inline]
pub fn decode_length(buf: &[u8]) -> Option<u64> {
    let bytes: [u8; LENGTH_PREFIX_SIZE] = buf.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    Some(u64::from_ne_bytes(bytes))
}

/// Append one pair to `buf`.
///
/// Each length prefix is taken from its own payload.
pub fn encode_pair(buf: &mut BytesMut, name: &[u8], value: &[u8]) {
    buf.reserve(2 * LENGTH_PREFIX_SIZE + name.len() + value.len());
    buf.put_slice(&encode_length(name.len()));
    buf.put_slice(name);
    buf.put_slice(&encode_length(value.len()));
    buf.put_slice(value);
}

/// Append a pair whose value is the decimal text of `value`.
pub fn encode_number_pair(buf: &mut BytesMut, name: &[u8], value: i64) {
    encode_pair(buf, name, value.to_string().as_bytes());
}

/// Permissive decimal parse.
///
/// Skips leading ASCII whitespace, accepts one optional sign, then reads
/// digits up to the first non-digit. Input with no leading digits yields 0.
/// Overflow saturates.
pub fn parse_number(text: &[u8]) -> i64 {
    let mut bytes = text
        .iter()
        .copied()
        .skip_while(|b| b.is_ascii_whitespace())
        .peekable();

    let negative = match bytes.peek() {
        Some(b'-') => {
            bytes.next();
            true
        }
        Some(b'+') => {
            bytes.next();
            false
        }
        _ => false,
    };

    let magnitude = bytes
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |acc, b| {
            acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
        });

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Decimal text of a completion fraction (`0.5`, `10`).
pub fn format_fraction(fraction: f64) -> String {
    fraction.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_prefix_is_eight_native_bytes() {
        assert_eq!(LENGTH_PREFIX_SIZE, 8);
        assert_eq!(encode_length(5), 5u64.to_ne_bytes());
        assert_eq!(decode_length(&encode_length(123_456)), Some(123_456));
    }

    #[test]
    fn test_decode_length_too_short() {
        assert_eq!(decode_length(&[0u8; 7]), None);
    }

    #[test]
    fn test_encode_pair_layout() {
        let mut buf = BytesMut::new();
        encode_pair(&mut buf, b"uid", b"node-42");

        assert_eq!(buf.len(), 8 + 3 + 8 + 7);
        assert_eq!(decode_length(&buf[..8]), Some(3));
        assert_eq!(&buf[8..11], b"uid");
        assert_eq!(decode_length(&buf[11..19]), Some(7));
        assert_eq!(&buf[19..], b"node-42");
    }

    #[test]
    fn test_value_length_independent_of_name_length() {
        let mut buf = BytesMut::new();
        encode_pair(&mut buf, b"value", b"a much longer value than the name");

        let value_len = decode_length(&buf[8 + 5..]).unwrap();
        assert_eq!(value_len, 33);
    }

    #[test]
    fn test_encode_empty_pair() {
        let mut buf = BytesMut::new();
        encode_pair(&mut buf, b"error", b"");

        assert_eq!(buf.len(), 8 + 5 + 8);
        assert_eq!(decode_length(&buf[13..]), Some(0));
    }

    #[test]
    fn test_encode_number_pair() {
        let mut buf = BytesMut::new();
        encode_number_pair(&mut buf, b"attrs", 5);

        assert_eq!(decode_length(&buf[13..21]), Some(1));
        assert_eq!(&buf[21..], b"5");
    }

    #[test]
    fn test_parse_number_plain() {
        assert_eq!(parse_number(b"0"), 0);
        assert_eq!(parse_number(b"5"), 5);
        assert_eq!(parse_number(b"1234"), 1234);
        assert_eq!(parse_number(b"-3"), -3);
        assert_eq!(parse_number(b"+8"), 8);
    }

    #[test]
    fn test_parse_number_permissive() {
        assert_eq!(parse_number(b""), 0);
        assert_eq!(parse_number(b"abc"), 0);
        assert_eq!(parse_number(b"  42"), 42);
        assert_eq!(parse_number(b"12abc"), 12);
        assert_eq!(parse_number(b"3.9"), 3);
        assert_eq!(parse_number(b"-"), 0);
        assert_eq!(parse_number(b"99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_format_fraction() {
        assert_eq!(format_fraction(0.5), "0.5");
        assert_eq!(format_fraction(PROGRESS_DONE), "10");
        assert_eq!(format_fraction(0.0), "0");
    }
}
