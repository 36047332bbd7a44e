//! Sub-query operator: executes the right-hand child once, materializes
//! its tuples, then for each left row evaluates a correlated predicate
//! (`=`, `<`, `>`, `IN`, `NOT IN`) against the materialized set, plus
//! any multi-table conditions referencing the outer row (spec §4.6
//! "Sub-query"). Grounded in the same `execution_node.cpp` correlated-
//! predicate loop `join.rs` draws on; the teacher leaves its own
//! sub-query executor unimplemented, so this is built fresh against
//! spec §4.6.
//!
//! A sub-query is a row filter, not a join: it emits the left tuple
//! unchanged when the predicate holds, it never appends the right
//! side's columns.

use crate::error::DbResult;
use crate::executor::operator::Operator;
use crate::executor::tuple::{Tuple, TupleSchema};
use crate::filter::tuple_filter::CompositeCartesianFilter;
use crate::filter::value;
use crate::filter::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryOp {
    Eq,
    Lt,
    Gt,
    In,
    NotIn,
}

/// Binds the outer (left) column and the sub-query's projected column
/// by position in their respective schemas.
pub struct SubqueryPredicate {
    pub left_position: usize,
    pub right_position: usize,
    pub op: SubqueryOp,
    /// Additional conditions referencing both the outer row and the
    /// sub-query's row, evaluated against their joined tuple before a
    /// candidate counts toward the membership test.
    pub extra: Option<CompositeCartesianFilter>,
}

pub struct SubqueryOperator<'a> {
    left: Box<dyn Operator + 'a>,
    right: Box<dyn Operator + 'a>,
    predicate: SubqueryPredicate,
    schema: TupleSchema,
    right_buffer: Vec<Tuple>,
}

impl<'a> SubqueryOperator<'a> {
    pub fn new(left: Box<dyn Operator + 'a>, right: Box<dyn Operator + 'a>, predicate: SubqueryPredicate) -> Self {
        let schema = left.schema().clone();
        Self {
            left,
            right,
            predicate,
            schema,
            right_buffer: Vec::new(),
        }
    }

    fn holds(&self, left_tuple: &Tuple) -> bool {
        let left_value = left_tuple.get(self.predicate.left_position).cloned().unwrap_or(Value::Null);
        if left_value.is_null() {
            return false;
        }
        let mut any_equal = false;
        let mut any_less = false;
        let mut any_greater = false;
        for right_tuple in &self.right_buffer {
            if let Some(extra) = &self.predicate.extra {
                if !extra.evaluate(&left_tuple.join(right_tuple)) {
                    continue;
                }
            }
            let right_value = match right_tuple.get(self.predicate.right_position) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            match value::compare(&left_value, right_value) {
                Some(std::cmp::Ordering::Equal) => any_equal = true,
                Some(std::cmp::Ordering::Less) => any_less = true,
                Some(std::cmp::Ordering::Greater) => any_greater = true,
                None => {}
            }
        }
        match self.predicate.op {
            SubqueryOp::Eq | SubqueryOp::In => any_equal,
            SubqueryOp::NotIn => !any_equal && !self.right_buffer.is_empty(),
            SubqueryOp::Lt => any_less,
            SubqueryOp::Gt => any_greater,
        }
    }
}

impl<'a> Operator for SubqueryOperator<'a> {
    fn open(&mut self) -> DbResult<()> {
        self.left.open()?;
        self.right.open()?;
        self.right_buffer.clear();
        while let Some(t) = self.right.next()? {
            self.right_buffer.push(t);
        }
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        while let Some(left_tuple) = self.left.next()? {
            if self.holds(&left_tuple) {
                return Ok(Some(left_tuple));
            }
        }
        Ok(None)
    }

    fn schema(&self) -> &TupleSchema {
        &self.schema
    }

    fn close(&mut self) -> DbResult<()> {
        self.left.close()?;
        self.right.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tuple::TupleField;

    struct VecOperator {
        schema: TupleSchema,
        rows: Vec<Vec<Value>>,
        cursor: usize,
    }

    impl Operator for VecOperator {
        fn open(&mut self) -> DbResult<()> {
            self.cursor = 0;
            Ok(())
        }
        fn next(&mut self) -> DbResult<Option<Tuple>> {
            if self.cursor >= self.rows.len() {
                return Ok(None);
            }
            let t = Tuple::new(self.rows[self.cursor].clone());
            self.cursor += 1;
            Ok(Some(t))
        }
        fn schema(&self) -> &TupleSchema {
            &self.schema
        }
    }

    #[test]
    fn in_subquery_keeps_only_matching_left_rows() {
        let left = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t1", "x")]),
            rows: vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]],
            cursor: 0,
        };
        let right = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t2", "y")]),
            rows: vec![vec![Value::Int(2)], vec![Value::Int(3)]],
            cursor: 0,
        };
        let predicate = SubqueryPredicate {
            left_position: 0,
            right_position: 0,
            op: SubqueryOp::In,
            extra: None,
        };
        let mut op = SubqueryOperator::new(Box::new(left), Box::new(right), predicate);
        op.open().unwrap();
        let mut kept = Vec::new();
        while let Some(t) = op.next().unwrap() {
            kept.push(t.values[0].clone());
        }
        assert_eq!(kept, vec![Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn not_in_subquery_excludes_matching_left_rows() {
        let left = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t1", "x")]),
            rows: vec![vec![Value::Int(1)], vec![Value::Int(2)]],
            cursor: 0,
        };
        let right = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t2", "y")]),
            rows: vec![vec![Value::Int(2)]],
            cursor: 0,
        };
        let predicate = SubqueryPredicate {
            left_position: 0,
            right_position: 0,
            op: SubqueryOp::NotIn,
            extra: None,
        };
        let mut op = SubqueryOperator::new(Box::new(left), Box::new(right), predicate);
        op.open().unwrap();
        let mut kept = Vec::new();
        while let Some(t) = op.next().unwrap() {
            kept.push(t.values[0].clone());
        }
        assert_eq!(kept, vec![Value::Int(1)]);
    }
}
