//! Row-level predicates bound to one table's field layout (spec §4.5,
//! `Filter`/`CompositeFilter`), grounded in `condition_filter.h`'s
//! `DefaultConditionFilter`/`CompositeConditionFilter`.

use crate::buffer::pool::BufferPool;
use crate::catalog::table_meta::TableMeta;
use crate::error::{DbError, DbResult};
use crate::filter::value::{self, Value};
use crate::filter::CompOp;
use crate::types::FileId;

#[derive(Debug, Clone)]
pub enum RowOperand {
    Field(String),
    Const(Value),
}

#[derive(Debug, Clone)]
pub struct RowCondition {
    pub left: RowOperand,
    pub op: CompOp,
    pub right: RowOperand,
}

/// A single `(LHS, op, RHS)` predicate bound to a table, the unit the
/// original calls `Filter` (spec §4.5).
pub struct Filter<'a> {
    table_meta: &'a TableMeta,
    condition: RowCondition,
}

impl<'a> Filter<'a> {
    pub fn bind_table(table_meta: &'a TableMeta, condition: RowCondition) -> DbResult<Self> {
        for operand in [&condition.left, &condition.right] {
            if let RowOperand::Field(name) = operand {
                if table_meta.find_field_by_name(name).is_none() {
                    return Err(DbError::FieldNotExist(name.clone()));
                }
            }
        }
        Ok(Self { table_meta, condition })
    }

    fn resolve(&self, operand: &RowOperand, pool: &BufferPool, file_id: FileId, record: &[u8]) -> DbResult<Value> {
        match operand {
            RowOperand::Const(v) => Ok(v.clone()),
            RowOperand::Field(name) => {
                let field = self.table_meta.find_field_by_name(name).unwrap();
                if let Some(bit) = self.table_meta.null_bit_index(name) {
                    let bitmap_bytes = self.table_meta.null_bitmap_bytes();
                    let byte = bit / 8;
                    let mask = 1u8 << (bit % 8);
                    if byte < bitmap_bytes && record[byte] & mask != 0 {
                        return Ok(Value::Null);
                    }
                }
                value::decode_value(pool, file_id, field, &record[field.offset..field.offset + field.len])
            }
        }
    }

    /// Evaluate this predicate against one raw record. NULL semantics
    /// per spec §4.5: `NULL op anything` is false except `IS [NOT]
    /// NULL`.
    pub fn evaluate(&self, pool: &BufferPool, file_id: FileId, record: &[u8]) -> DbResult<bool> {
        let left = self.resolve(&self.condition.left, pool, file_id, record)?;
        let right = self.resolve(&self.condition.right, pool, file_id, record)?;

        match self.condition.op {
            CompOp::Is => Ok(left.is_null() == right.is_null() && (left.is_null() || right.is_null())),
            CompOp::IsNot => Ok(left.is_null() != right.is_null()),
            op => {
                if left.is_null() || right.is_null() {
                    return Ok(false);
                }
                Ok(op.apply(value::compare(&left, &right)))
            }
        }
    }

    /// This predicate's single-column, index-eligible shape if it has
    /// one (spec §4.4: `attr op const`, `op` not `Is`/`IsNot`, neither
    /// side NULL).
    pub fn index_eligible(&self) -> Option<(&str, CompOp, &Value)> {
        match (&self.condition.left, self.condition.op, &self.condition.right) {
            (RowOperand::Field(name), op, RowOperand::Const(v))
                if !matches!(op, CompOp::Is | CompOp::IsNot) && !v.is_null() =>
            {
                Some((name, op, v))
            }
            (RowOperand::Const(v), op, RowOperand::Field(name))
                if !matches!(op, CompOp::Is | CompOp::IsNot) && !v.is_null() =>
            {
                Some((name, flip(op), v))
            }
            _ => None,
        }
    }
}

fn flip(op: CompOp) -> CompOp {
    match op {
        CompOp::Lt => CompOp::Gt,
        CompOp::Le => CompOp::Ge,
        CompOp::Gt => CompOp::Lt,
        CompOp::Ge => CompOp::Le,
        other => other,
    }
}

/// Outcome of folding a batch of conditions at build time (spec §4.5:
/// "Build-time constant folding").
pub enum Compiled<'a> {
    /// At least one condition was constant-false: the whole scan
    /// produces zero rows (spec's "ban-all condition").
    BanAll,
    Conjunction(CompositeFilter<'a>),
}

/// An implicit-AND list of row-level filters (spec §4.5,
/// `CompositeFilter`), grounded in `condition_filter.h`'s
/// `CompositeConditionFilter`.
pub struct CompositeFilter<'a> {
    filters: Vec<Filter<'a>>,
}

impl<'a> CompositeFilter<'a> {
    /// Fold constant-only conditions immediately: drop tautologies,
    /// short-circuit to `BanAll` on a constant-false condition.
    pub fn compile(table_meta: &'a TableMeta, conditions: Vec<RowCondition>) -> DbResult<Compiled<'a>> {
        let mut filters = Vec::new();
        for condition in conditions {
            if let (RowOperand::Const(l), RowOperand::Const(r)) = (&condition.left, &condition.right) {
                let holds = match condition.op {
                    CompOp::Is => l.is_null() && r.is_null(),
                    CompOp::IsNot => l.is_null() != r.is_null(),
                    op if l.is_null() || r.is_null() => {
                        let _ = op;
                        false
                    }
                    op => op.apply(value::compare(l, r)),
                };
                if holds {
                    continue; // tautology: drop the predicate
                }
                return Ok(Compiled::BanAll);
            }
            filters.push(Filter::bind_table(table_meta, condition)?);
        }
        Ok(Compiled::Conjunction(CompositeFilter { filters }))
    }

    pub fn evaluate(&self, pool: &BufferPool, file_id: FileId, record: &[u8]) -> DbResult<bool> {
        for filter in &self.filters {
            if !filter.evaluate(pool, file_id, record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The single index-eligible condition in this conjunction, if
    /// there is exactly one condition and it qualifies (spec §4.4).
    pub fn index_eligible(&self) -> Option<(&str, CompOp, &Value)> {
        if self.filters.len() == 1 {
            self.filters[0].index_eligible()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::field::FieldType;
    use crate::catalog::table_meta::UserFieldSpec;

    fn meta() -> TableMeta {
        TableMeta::new(
            "t",
            vec![UserFieldSpec {
                name: "id".into(),
                field_type: FieldType::Int,
                len: None,
                nullable: false,
            }],
        )
        .unwrap()
    }

    fn pool() -> BufferPool {
        BufferPool::new(4, 64, 4)
    }

    #[test]
    fn eq_condition_matches_record() {
        let meta = meta();
        let pool = pool();
        let field = meta.find_field_by_name("id").unwrap();
        let mut record = vec![0u8; meta.record_size];
        record[field.offset..field.offset + 4].copy_from_slice(&5i32.to_le_bytes());

        let filter = Filter::bind_table(
            &meta,
            RowCondition {
                left: RowOperand::Field("id".into()),
                op: CompOp::Eq,
                right: RowOperand::Const(Value::Int(5)),
            },
        )
        .unwrap();
        assert!(filter.evaluate(&pool, 0, &record).unwrap());
    }

    #[test]
    fn null_field_never_matches_comparison() {
        let meta = meta();
        let pool = pool();
        let bitmap_byte_mask = 1u8;
        let mut record = vec![0u8; meta.record_size];
        record[0] = bitmap_byte_mask; // mark "id" NULL

        let filter = Filter::bind_table(
            &meta,
            RowCondition {
                left: RowOperand::Field("id".into()),
                op: CompOp::Eq,
                right: RowOperand::Const(Value::Int(5)),
            },
        )
        .unwrap();
        assert!(!filter.evaluate(&pool, 0, &record).unwrap());

        let is_null_filter = Filter::bind_table(
            &meta,
            RowCondition {
                left: RowOperand::Field("id".into()),
                op: CompOp::Is,
                right: RowOperand::Const(Value::Null),
            },
        )
        .unwrap();
        assert!(is_null_filter.evaluate(&pool, 0, &record).unwrap());
    }

    #[test]
    fn constant_false_condition_bans_all() {
        let meta = meta();
        let conditions = vec![RowCondition {
            left: RowOperand::Const(Value::Int(1)),
            op: CompOp::Eq,
            right: RowOperand::Const(Value::Int(2)),
        }];
        match CompositeFilter::compile(&meta, conditions).unwrap() {
            Compiled::BanAll => {}
            Compiled::Conjunction(_) => panic!("expected ban-all"),
        }
    }

    #[test]
    fn constant_true_condition_is_dropped() {
        let meta = meta();
        let conditions = vec![RowCondition {
            left: RowOperand::Const(Value::Int(1)),
            op: CompOp::Eq,
            right: RowOperand::Const(Value::Int(1)),
        }];
        match CompositeFilter::compile(&meta, conditions).unwrap() {
            Compiled::Conjunction(f) => assert!(f.is_empty()),
            Compiled::BanAll => panic!("tautology should not ban all"),
        }
    }
}
