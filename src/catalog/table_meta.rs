//! Table metadata: field layout, record size, index list, JSON
//! persistence (spec §3, §4.4, §6), grounded in
//! `original_source/src/observer/storage/common/table_meta.h`.

use serde::{Deserialize, Serialize};

use crate::catalog::field::{FieldMeta, FieldType};
use crate::catalog::index_meta::IndexMeta;
use crate::error::{DbError, DbResult};
use crate::util::bytes_for_bits;

/// Name of the single leading system field every table carries (spec
/// §3: "the transaction's per-row column").
pub const TRX_FIELD_NAME: &str = "trx";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub table_name: String,
    /// System fields first (currently just `trx`), then user fields, in
    /// declaration order, matching `table_meta.h`'s `sys_fields_` +
    /// `fields_` split (spec: "SUPPLEMENTED FEATURES" — sys_field_num).
    pub fields: Vec<FieldMeta>,
    pub indexes: Vec<IndexMeta>,
    pub record_size: usize,
}

pub struct UserFieldSpec {
    pub name: String,
    pub field_type: FieldType,
    /// Required for `Chars`; ignored (and derived) for fixed-width types.
    pub len: Option<usize>,
    pub nullable: bool,
}

impl TableMeta {
    pub fn new(table_name: impl Into<String>, user_fields: Vec<UserFieldSpec>) -> DbResult<Self> {
        if user_fields.is_empty() {
            return Err(DbError::FieldMissing);
        }
        let bitmap_bytes = bytes_for_bits(user_fields.len());
        let trx = FieldMeta {
            name: TRX_FIELD_NAME.to_string(),
            field_type: FieldType::Int,
            offset: bitmap_bytes,
            len: 4,
            visible: false,
            nullable: false,
        };
        let mut offset = trx.offset + trx.len;
        let mut fields = vec![trx];
        for spec in user_fields {
            let len = match spec.field_type.fixed_len() {
                Some(fixed) => fixed,
                None => spec
                    .len
                    .ok_or_else(|| DbError::InvalidArgument(format!("field `{}` needs an explicit length", spec.name)))?,
            };
            fields.push(FieldMeta {
                name: spec.name,
                field_type: spec.field_type,
                offset,
                len,
                visible: true,
                nullable: spec.nullable,
            });
            offset += len;
        }
        let record_size = offset;
        Ok(Self {
            table_name: table_name.into(),
            fields,
            indexes: Vec::new(),
            record_size,
        })
    }

    /// Count of leading invisible system fields (spec: "SUPPLEMENTED
    /// FEATURES" — `sys_field_num`).
    pub fn sys_field_num(&self) -> usize {
        self.fields.iter().take_while(|f| !f.visible).count()
    }

    pub fn user_fields(&self) -> &[FieldMeta] {
        &self.fields[self.sys_field_num()..]
    }

    pub fn null_bitmap_bytes(&self) -> usize {
        bytes_for_bits(self.user_fields().len())
    }

    pub fn find_field_by_name(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn find_field_by_offset(&self, offset: usize) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.offset == offset)
    }

    /// Bit position of `field_name` in the leading NULL bitmap, if it is
    /// a user field (sys fields are never nullable).
    pub fn null_bit_index(&self, field_name: &str) -> Option<usize> {
        self.user_fields().iter().position(|f| f.name == field_name)
    }

    pub fn find_index(&self, index_name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.name == index_name)
    }

    /// Multi-column lookup kept as a catalog capability (spec:
    /// "SUPPLEMENTED FEATURES" — `find_index_by_fields`), even though
    /// the executor currently only drives single-column selection.
    pub fn find_index_by_fields(&self, field_names: &[String]) -> Option<&IndexMeta> {
        self.indexes
            .iter()
            .find(|i| i.field_names.as_slice() == field_names)
    }

    pub fn indexes_on_field(&self, field_name: &str) -> Vec<&IndexMeta> {
        self.indexes
            .iter()
            .filter(|i| i.field_names.iter().any(|f| f == field_name))
            .collect()
    }

    pub fn add_index(&mut self, index: IndexMeta) -> DbResult<()> {
        if self.find_index(&index.name).is_some() {
            return Err(DbError::IndexExists(index.name));
        }
        for name in &index.field_names {
            if self.find_field_by_name(name).is_none() {
                return Err(DbError::FieldNotExist(name.clone()));
            }
        }
        self.indexes.push(index);
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TableMeta {
        TableMeta::new(
            "t",
            vec![
                UserFieldSpec {
                    name: "id".into(),
                    field_type: FieldType::Int,
                    len: None,
                    nullable: false,
                },
                UserFieldSpec {
                    name: "s".into(),
                    field_type: FieldType::Chars,
                    len: Some(4),
                    nullable: true,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn layout_places_trx_first() {
        let meta = sample();
        assert_eq!(meta.sys_field_num(), 1);
        assert_eq!(meta.fields[0].name, TRX_FIELD_NAME);
        assert_eq!(meta.fields[0].offset, 1); // bytes_for_bits(2) == 1
        assert_eq!(meta.fields[1].name, "id");
        assert_eq!(meta.fields[1].offset, 5);
        assert_eq!(meta.fields[2].name, "s");
        assert_eq!(meta.fields[2].offset, 9);
        assert_eq!(meta.record_size, 13);
    }

    #[test]
    fn null_bit_index_skips_sys_fields() {
        let meta = sample();
        assert_eq!(meta.null_bit_index("id"), Some(0));
        assert_eq!(meta.null_bit_index("s"), Some(1));
        assert_eq!(meta.null_bit_index(TRX_FIELD_NAME), None);
    }

    #[test]
    fn json_round_trip_preserves_layout() {
        let meta = sample();
        let json = meta.to_json().unwrap();
        let back = TableMeta::from_json(&json).unwrap();
        assert_eq!(back.record_size, meta.record_size);
        assert_eq!(back.fields.len(), meta.fields.len());
    }

    #[test]
    fn add_index_rejects_unknown_field() {
        let mut meta = sample();
        let err = meta.add_index(IndexMeta::new("bad", vec!["nope".into()], false));
        assert!(err.is_err());
    }
}
