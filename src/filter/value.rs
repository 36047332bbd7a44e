//! Typed column values: encode/decode to the on-disk column bytes, and
//! the per-type comparator used by every predicate family (spec §4.5),
//! grounded in `original_source/src/observer/sql/executor/value.h`
//! (`IntValue`/`FloatValue`/... `compare`).

use std::cmp::Ordering;

use crate::buffer::pool::BufferPool;
use crate::catalog::field::{FieldMeta, FieldType};
use crate::error::{DbError, DbResult};
use crate::record::overflow;
use crate::types::FileId;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Chars(String),
    Dates(String),
    Texts(String),
    Null,
}

impl Value {
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Int(_) => Some(FieldType::Int),
            Value::Float(_) => Some(FieldType::Float),
            Value::Chars(_) => Some(FieldType::Chars),
            Value::Dates(_) => Some(FieldType::Dates),
            Value::Texts(_) => Some(FieldType::Texts),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Write `value`'s bytes into a buffer of exactly `field.len` bytes,
/// allocating a TEXT overflow page through `pool` if needed. Does not
/// touch the NULL bitmap; callers set that bit themselves for NULLs.
pub fn encode_value(pool: &BufferPool, file_id: FileId, field: &FieldMeta, value: &Value) -> DbResult<Vec<u8>> {
    let mut buf = vec![0u8; field.len];
    match (field.field_type, value) {
        (FieldType::Int, Value::Int(v)) => buf.copy_from_slice(&v.to_le_bytes()),
        (FieldType::Float, Value::Float(v)) => buf.copy_from_slice(&v.to_le_bytes()),
        (FieldType::Chars, Value::Chars(s)) => {
            let bytes = s.as_bytes();
            if bytes.len() >= field.len {
                return Err(DbError::FieldTypeMismatch(field.name.clone()));
            }
            buf[..bytes.len()].copy_from_slice(bytes);
        }
        (FieldType::Dates, Value::Dates(s)) => {
            let bytes = s.as_bytes();
            if bytes.len() > field.len {
                return Err(DbError::FieldTypeMismatch(field.name.clone()));
            }
            buf[..bytes.len()].copy_from_slice(bytes);
        }
        (FieldType::Texts, Value::Texts(s)) => {
            let inline = overflow::encode_text(pool, file_id, s.as_bytes())?;
            buf.copy_from_slice(&inline);
        }
        _ => return Err(DbError::FieldTypeMismatch(field.name.clone())),
    }
    Ok(buf)
}

/// Read `field`'s bytes back into a typed `Value`. Callers are
/// responsible for checking the NULL bitmap first and returning
/// `Value::Null` without calling this.
pub fn decode_value(pool: &BufferPool, file_id: FileId, field: &FieldMeta, bytes: &[u8]) -> DbResult<Value> {
    Ok(match field.field_type {
        FieldType::Int => Value::Int(i32::from_le_bytes(bytes[0..4].try_into().unwrap())),
        FieldType::Float => Value::Float(f32::from_le_bytes(bytes[0..4].try_into().unwrap())),
        FieldType::Chars => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Value::Chars(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        FieldType::Dates => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Value::Dates(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        FieldType::Texts => {
            let raw = overflow::decode_text(pool, file_id, bytes)?;
            Value::Texts(String::from_utf8_lossy(&raw).into_owned())
        }
    })
}

/// Per-type comparator (spec §4.5): `CHARS` uses C-string compare,
/// `INT` subtraction, `FLOAT` epsilon-tolerant compare
/// (`|a-b| < 1e-6` ⇒ equal), `DATES` string compare on the canonical
/// format. Returns `None` if either side is NULL or the types don't
/// match — callers treat `None` as "condition is false" per spec's
/// NULL semantics, except for `IS [NOT] NULL` which never calls this.
fn float_compare(x: f32, y: f32) -> Option<Ordering> {
    let diff = x - y;
    if diff.abs() < 1e-6 {
        Some(Ordering::Equal)
    } else {
        diff.partial_cmp(&0.0)
    }
}

pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => float_compare(*x, *y),
        (Value::Int(x), Value::Float(y)) => float_compare(*x as f32, *y),
        (Value::Float(x), Value::Int(y)) => float_compare(*x, *y as f32),
        (Value::Chars(x), Value::Chars(y)) => Some(x.cmp(y)),
        (Value::Dates(x), Value::Dates(y)) => Some(x.cmp(y)),
        (Value::Texts(x), Value::Texts(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
