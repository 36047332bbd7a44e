//! Nested-loop join: for each left tuple, replay the (materialized)
//! right side, combine, apply the joined predicate, emit (spec §4.6
//! "Nested-loop join"). Grounded in the teacher's `from.rs`/`join.rs`
//! executor stubs and `original_source`'s `execution_node.cpp` join
//! loop, rebuilt against spec §4.6 since the teacher leaves its join
//! executor unimplemented.

use crate::error::DbResult;
use crate::executor::operator::Operator;
use crate::executor::tuple::{Tuple, TupleSchema};
use crate::filter::tuple_filter::CompositeCartesianFilter;

/// Joins `left` and `right`, materializing `right` into a buffer the
/// first time `open` runs so it can be replayed once per left tuple
/// (spec §4.6: "Right-side re-open is done by materializing the right
/// child into a buffer on first call").
pub struct JoinOperator<'a> {
    left: Box<dyn Operator + 'a>,
    right: Box<dyn Operator + 'a>,
    filter: CompositeCartesianFilter,
    schema: TupleSchema,
    right_buffer: Vec<Tuple>,
    current_left: Option<Tuple>,
    right_cursor: usize,
}

impl<'a> JoinOperator<'a> {
    pub fn new(left: Box<dyn Operator + 'a>, right: Box<dyn Operator + 'a>, filter: CompositeCartesianFilter) -> Self {
        let schema = TupleSchema::join(left.schema(), right.schema());
        Self {
            left,
            right,
            filter,
            schema,
            right_buffer: Vec::new(),
            current_left: None,
            right_cursor: 0,
        }
    }
}

impl<'a> Operator for JoinOperator<'a> {
    fn open(&mut self) -> DbResult<()> {
        self.left.open()?;
        self.right.open()?;
        self.right_buffer.clear();
        while let Some(t) = self.right.next()? {
            self.right_buffer.push(t);
        }
        self.current_left = self.left.next()?;
        self.right_cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        loop {
            let left_tuple = match &self.current_left {
                Some(t) => t,
                None => return Ok(None),
            };
            if self.right_cursor >= self.right_buffer.len() {
                self.current_left = self.left.next()?;
                self.right_cursor = 0;
                if self.current_left.is_none() {
                    return Ok(None);
                }
                continue;
            }
            let right_tuple = &self.right_buffer[self.right_cursor];
            self.right_cursor += 1;
            let joined = left_tuple.join(right_tuple);
            if self.filter.evaluate(&joined) {
                return Ok(Some(joined));
            }
        }
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
    use crate::filter::tuple_filter::{CartesianFilter, TupleCondition, TupleOperand};
    use crate::filter::{CompOp, Value};

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
    fn equi_join_emits_matching_pairs_only() {
        let left = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t1", "k")]),
            rows: vec![vec![Value::Int(1)], vec![Value::Int(2)], vec![Value::Int(3)]],
            cursor: 0,
        };
        let right = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t2", "k")]),
            rows: vec![vec![Value::Int(2)], vec![Value::Int(3)], vec![Value::Int(9)]],
            cursor: 0,
        };
        let joined_schema = TupleSchema::join(&left.schema, &right.schema);
        let filter = CompositeCartesianFilter::new(vec![CartesianFilter::bind_schema(
            &joined_schema,
            TupleCondition {
                left: TupleOperand::Column { table: "t1".into(), field: "k".into() },
                op: CompOp::Eq,
                right: TupleOperand::Column { table: "t2".into(), field: "k".into() },
            },
        )
        .unwrap()]);

        let mut join = JoinOperator::new(Box::new(left), Box::new(right), filter);
        join.open().unwrap();
        let mut rows = Vec::new();
        while let Some(t) = join.next().unwrap() {
            rows.push(t);
        }
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values, vec![Value::Int(2), Value::Int(2)]);
        assert_eq!(rows[1].values, vec![Value::Int(3), Value::Int(3)]);
    }
}
