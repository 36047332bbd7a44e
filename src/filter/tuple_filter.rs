//! Tuple-level predicates evaluated after a join, over the combined
//! tuple schema (spec §4.5, `CartesianFilter`), grounded in
//! `condition_filter.h`'s `CartesianConditionFilter`/
//! `CompositeCartesianConditionFilter`.

use crate::error::{DbError, DbResult};
use crate::executor::tuple::{Tuple, TupleSchema};
use crate::filter::value::{self, Value};
use crate::filter::CompOp;

#[derive(Debug, Clone)]
pub enum TupleOperand {
    Column { table: String, field: String },
    Const(Value),
}

#[derive(Debug, Clone)]
pub struct TupleCondition {
    pub left: TupleOperand,
    pub op: CompOp,
    pub right: TupleOperand,
}

/// One predicate indexing into a joined tuple by column position (spec
/// §4.5: "indexes into the combined tuple schema for both sides").
pub struct CartesianFilter {
    left: ResolvedOperand,
    op: CompOp,
    right: ResolvedOperand,
}

enum ResolvedOperand {
    Position(usize),
    Const(Value),
}

impl CartesianFilter {
    pub fn bind_schema(schema: &TupleSchema, condition: TupleCondition) -> DbResult<Self> {
        let resolve = |operand: TupleOperand| -> DbResult<ResolvedOperand> {
            match operand {
                TupleOperand::Const(v) => Ok(ResolvedOperand::Const(v)),
                TupleOperand::Column { table, field } => schema
                    .position(&table, &field)
                    .map(ResolvedOperand::Position)
                    .ok_or_else(|| DbError::FieldNotExist(format!("{}.{}", table, field))),
            }
        };
        Ok(Self {
            left: resolve(condition.left)?,
            op: condition.op,
            right: resolve(condition.right)?,
        })
    }

    fn value_of<'a>(&self, operand: &'a ResolvedOperand, tuple: &'a Tuple) -> &'a Value {
        match operand {
            ResolvedOperand::Const(v) => v,
            ResolvedOperand::Position(i) => tuple.get(*i).unwrap_or(&Value::Null),
        }
    }

    pub fn evaluate(&self, tuple: &Tuple) -> bool {
        let left = self.value_of(&self.left, tuple);
        let right = self.value_of(&self.right, tuple);
        match self.op {
            CompOp::Is => left.is_null() && right.is_null(),
            CompOp::IsNot => left.is_null() != right.is_null(),
            op => {
                if left.is_null() || right.is_null() {
                    false
                } else {
                    op.apply(value::compare(left, right))
                }
            }
        }
    }
}

/// An implicit-AND conjunction of `CartesianFilter`s (spec §4.5,
/// `CompositeCartesianFilter`).
pub struct CompositeCartesianFilter {
    filters: Vec<CartesianFilter>,
}

impl CompositeCartesianFilter {
    pub fn new(filters: Vec<CartesianFilter>) -> Self {
        Self { filters }
    }

    pub fn evaluate(&self, tuple: &Tuple) -> bool {
        self.filters.iter().all(|f| f.evaluate(tuple))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tuple::TupleField;

    #[test]
    fn evaluates_equi_join_condition() {
        let schema = TupleSchema::new(vec![
            TupleField::new("t1", "k"),
            TupleField::new("t2", "k"),
        ]);
        let filter = CartesianFilter::bind_schema(
            &schema,
            TupleCondition {
                left: TupleOperand::Column {
                    table: "t1".into(),
                    field: "k".into(),
                },
                op: CompOp::Eq,
                right: TupleOperand::Column {
                    table: "t2".into(),
                    field: "k".into(),
                },
            },
        )
        .unwrap();

        let matching = Tuple::new(vec![Value::Int(3), Value::Int(3)]);
        let mismatching = Tuple::new(vec![Value::Int(3), Value::Int(4)]);
        assert!(filter.evaluate(&matching));
        assert!(!filter.evaluate(&mismatching));
    }
}
