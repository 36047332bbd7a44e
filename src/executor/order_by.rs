//! Order-by operator: materialize then stable-sort by a composite
//! comparator over listed `(column, asc/desc)` pairs (spec §4.6
//! "Order-by"). Built fresh against spec §4.6; NULLs sort first,
//! matching the record manager's convention of a zeroed, NULL-bitmap-
//! flagged column sorting ahead of any real value.

use crate::error::DbResult;
use crate::executor::operator::Operator;
use crate::executor::tuple::{Tuple, TupleSchema};
use crate::filter::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

pub struct SortKey {
    pub position: usize,
    pub direction: SortDirection,
}

pub struct OrderByOperator<'a> {
    child: Box<dyn Operator + 'a>,
    keys: Vec<SortKey>,
    schema: TupleSchema,
    rows: std::vec::IntoIter<Tuple>,
}

impl<'a> OrderByOperator<'a> {
    pub fn new(child: Box<dyn Operator + 'a>, keys: Vec<SortKey>) -> Self {
        let schema = child.schema().clone();
        Self {
            child,
            keys,
            schema,
            rows: Vec::new().into_iter(),
        }
    }

    fn compare(&self, a: &Tuple, b: &Tuple) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        for key in &self.keys {
            let va = a.get(key.position);
            let vb = b.get(key.position);
            let ord = match (va.map(|v| v.is_null()).unwrap_or(true), vb.map(|v| v.is_null()).unwrap_or(true)) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => value::compare(va.unwrap(), vb.unwrap()).unwrap_or(Ordering::Equal),
            };
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl<'a> Operator for OrderByOperator<'a> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        let mut buffered = Vec::new();
        while let Some(t) = self.child.next()? {
            buffered.push(t);
        }
        buffered.sort_by(|a, b| self.compare(a, b));
        self.rows = buffered.into_iter();
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        Ok(self.rows.next())
    }

    fn schema(&self) -> &TupleSchema {
        &self.schema
    }

    fn close(&mut self) -> DbResult<()> {
        self.child.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tuple::TupleField;
    use crate::filter::Value;

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
    fn sorts_stably_by_composite_key() {
        let child = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t", "a"), TupleField::new("t", "b")]),
            rows: vec![
                vec![Value::Int(1), Value::Int(9)],
                vec![Value::Int(2), Value::Int(1)],
                vec![Value::Int(1), Value::Int(3)],
            ],
            cursor: 0,
        };
        let mut op = OrderByOperator::new(
            Box::new(child),
            vec![
                SortKey { position: 0, direction: SortDirection::Asc },
                SortKey { position: 1, direction: SortDirection::Asc },
            ],
        );
        op.open().unwrap();
        let mut rows = Vec::new();
        while let Some(t) = op.next().unwrap() {
            rows.push(t.values);
        }
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::Int(3)],
                vec![Value::Int(1), Value::Int(9)],
                vec![Value::Int(2), Value::Int(1)],
            ]
        );
    }

    #[test]
    fn nulls_sort_first() {
        let child = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t", "a")]),
            rows: vec![vec![Value::Int(1)], vec![Value::Null], vec![Value::Int(0)]],
            cursor: 0,
        };
        let mut op = OrderByOperator::new(Box::new(child), vec![SortKey { position: 0, direction: SortDirection::Asc }]);
        op.open().unwrap();
        let mut rows = Vec::new();
        while let Some(t) = op.next().unwrap() {
            rows.push(t.values[0].clone());
        }
        assert_eq!(rows, vec![Value::Null, Value::Int(0), Value::Int(1)]);
    }
}
