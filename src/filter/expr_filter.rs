//! Arithmetic expression trees evaluated over a tuple, then compared
//! (spec §4.5, `ExpressionFilter`). Built fresh against spec §4.5 rather
//! than adapted from any one teacher file — the teacher's own
//! `src/predicate.rs` has no expression trees to generalize.

use crate::executor::tuple::{Tuple, TupleSchema};
use crate::filter::value::{self, Value};
use crate::filter::CompOp;

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Column { table: String, field: String },
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f as f64),
        _ => None,
    }
}

/// Numeric result of a binary op over two possibly-NULL operands: any
/// NULL operand yields NULL (spec §4.5: "Any arithmetic over a NULL
/// operand yields a NULL result").
fn numeric_binop(l: &Value, r: &Value, f: impl FnOnce(f64, f64) -> f64) -> Value {
    match (as_f64(l), as_f64(r)) {
        (Some(a), Some(b)) => Value::Float(f(a, b) as f32),
        _ => Value::Null,
    }
}

impl Expr {
    pub fn eval(&self, schema: &TupleSchema, tuple: &Tuple) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Column { table, field } => schema
                .position(table, field)
                .and_then(|i| tuple.get(i))
                .cloned()
                .unwrap_or(Value::Null),
            Expr::Neg(inner) => match as_f64(&inner.eval(schema, tuple)) {
                Some(v) => Value::Float(-v as f32),
                None => Value::Null,
            },
            Expr::Add(l, r) => numeric_binop(&l.eval(schema, tuple), &r.eval(schema, tuple), |a, b| a + b),
            Expr::Sub(l, r) => numeric_binop(&l.eval(schema, tuple), &r.eval(schema, tuple), |a, b| a - b),
            Expr::Mul(l, r) => numeric_binop(&l.eval(schema, tuple), &r.eval(schema, tuple), |a, b| a * b),
            Expr::Div(l, r) => {
                let right = r.eval(schema, tuple);
                match (as_f64(&l.eval(schema, tuple)), as_f64(&right)) {
                    (Some(_), Some(b)) if b == 0.0 => Value::Null,
                    (Some(a), Some(b)) => Value::Float((a / b) as f32),
                    _ => Value::Null,
                }
            }
        }
    }
}

/// Compares two expression trees' evaluated results (spec §4.5,
/// `ExpressionFilter`).
pub struct ExpressionFilter {
    pub left: Expr,
    pub op: CompOp,
    pub right: Expr,
}

impl ExpressionFilter {
    pub fn evaluate(&self, schema: &TupleSchema, tuple: &Tuple) -> bool {
        let left = self.left.eval(schema, tuple);
        let right = self.right.eval(schema, tuple);
        match self.op {
            CompOp::Is => left.is_null() && right.is_null(),
            CompOp::IsNot => left.is_null() != right.is_null(),
            op => {
                if left.is_null() || right.is_null() {
                    false
                } else {
                    op.apply(value::compare(&left, &right))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_over_null_is_null() {
        let schema = TupleSchema::default();
        let tuple = Tuple::default();
        let expr = Expr::Add(Box::new(Expr::Literal(Value::Null)), Box::new(Expr::Literal(Value::Int(1))));
        assert_eq!(expr.eval(&schema, &tuple), Value::Null);
    }

    #[test]
    fn comparison_of_arithmetic_result() {
        let schema = TupleSchema::default();
        let tuple = Tuple::default();
        let expr = ExpressionFilter {
            left: Expr::Add(Box::new(Expr::Literal(Value::Int(2))), Box::new(Expr::Literal(Value::Int(3)))),
            op: CompOp::Eq,
            right: Expr::Literal(Value::Float(5.0)),
        };
        assert!(expr.evaluate(&schema, &tuple));
    }
}
