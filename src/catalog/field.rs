//! Column metadata (spec §3, §6), grounded in
//! `original_source/src/observer/storage/common/field_meta.h`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Int,
    Float,
    Chars,
    Dates,
    Texts,
}

impl FieldType {
    /// Fixed on-disk width of a column of this type, per spec §3.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            FieldType::Int => Some(4),
            FieldType::Float => Some(4),
            FieldType::Dates => Some(12),
            FieldType::Texts => Some(crate::record::overflow::TEXT_INLINE_LEN),
            FieldType::Chars => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub offset: usize,
    pub len: usize,
    pub visible: bool,
    pub nullable: bool,
}

impl FieldMeta {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
