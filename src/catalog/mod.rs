//! JSON-persisted table/index/field metadata (spec §3, §6).

pub mod field;
pub mod index_meta;
pub mod table_meta;

pub use field::{FieldMeta, FieldType};
pub use index_meta::IndexMeta;
pub use table_meta::{TableMeta, UserFieldSpec, TRX_FIELD_NAME};
