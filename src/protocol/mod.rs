//! Protocol module - wire format, pair frames, and messages.
//!
//! This module implements the attribute exchange protocol:
//! - 8-byte native length prefixes and the name/value pair frame
//! - permissive decimal numeric pairs
//! - handshake, attrs and progress message encoding
//! - decoding of inbound messages off a [`Connection`](crate::transport::Connection)

mod message;
mod pair;
mod wire_format;

pub use message::{
    encode_attr_entries, encode_attrs, encode_handshake, encode_progress, read_message, AttrEntry,
    FieldItem, Message, ProgressRecord,
};
pub use pair::{read_number_pair, read_pair, Pair};
pub use wire_format::{
    decode_length, encode_length, encode_number_pair, encode_pair, format_fraction, kinds,
    parse_number, progress_fields, ATTR_ITEM_COUNT, DEFAULT_MAX_FIELD_SIZE, LENGTH_PREFIX_SIZE,
    PROGRESS_DONE, PROGRESS_ITEM_COUNT,
};
