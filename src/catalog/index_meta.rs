//! Index metadata (spec §3), grounded in
//! `original_source/src/observer/storage/common/index_meta.h`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub field_names: Vec<String>,
    pub unique: bool,
}

impl IndexMeta {
    pub fn new(name: impl Into<String>, field_names: Vec<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            field_names,
            unique,
        }
    }

    pub fn covers_single_field(&self, field_name: &str) -> bool {
        self.field_names.len() == 1 && self.field_names[0] == field_name
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
