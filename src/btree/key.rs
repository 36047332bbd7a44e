//! Index key encoding and ordering (spec §4.3): raw bytes of the
//! indexed column, tagged with a type for comparator choice. Grounded
//! in `original_source/src/observer/storage/common/bplus_tree_index.h`.
//!
//! TEXT columns are never indexed (spec §4.3 only lists `INT`, `FLOAT`,
//! `CHARS`, `DATES` as key types), so key decoding never needs the
//! buffer pool the way `filter::value::decode_value` does for TEXT.

use std::cmp::Ordering;

use crate::catalog::field::FieldType;
use crate::filter::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Int,
    Float,
    Chars,
    Dates,
}

impl KeyType {
    pub fn from_field_type(ft: FieldType) -> Option<Self> {
        match ft {
            FieldType::Int => Some(KeyType::Int),
            FieldType::Float => Some(KeyType::Float),
            FieldType::Chars => Some(KeyType::Chars),
            FieldType::Dates => Some(KeyType::Dates),
            FieldType::Texts => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            KeyType::Int => 0,
            KeyType::Float => 1,
            KeyType::Chars => 2,
            KeyType::Dates => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => KeyType::Int,
            1 => KeyType::Float,
            2 => KeyType::Chars,
            _ => KeyType::Dates,
        }
    }
}

/// Decode raw key bytes into a comparable `Value`, mirroring
/// `filter::value::decode_value` for the subset of types a B+Tree can
/// index.
pub fn decode_key(key_type: KeyType, bytes: &[u8]) -> Value {
    match key_type {
        KeyType::Int => Value::Int(i32::from_le_bytes(bytes[0..4].try_into().unwrap())),
        KeyType::Float => Value::Float(f32::from_le_bytes(bytes[0..4].try_into().unwrap())),
        KeyType::Chars => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Value::Chars(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        KeyType::Dates => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Value::Dates(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
    }
}

pub fn compare_keys(key_type: KeyType, a: &[u8], b: &[u8]) -> Ordering {
    crate::filter::value::compare(&decode_key(key_type, a), &decode_key(key_type, b))
        .unwrap_or(Ordering::Equal)
}
