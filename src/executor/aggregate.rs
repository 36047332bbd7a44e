//! Aggregation operator: MIN/MAX/AVG/SUM/COUNT, with or without
//! GROUP BY (spec §4.6 "Aggregation", scenario S6). Built fresh against
//! spec §4.6 — the teacher has no aggregation executor to generalize,
//! and `original_source`'s `execution_node.cpp` folds aggregation into
//! its SQL-specific plan nodes rather than a standalone operator.

use crate::error::DbResult;
use crate::executor::operator::Operator;
use crate::executor::tuple::{Tuple, TupleField, TupleSchema};
use crate::filter::value;
use crate::filter::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Min,
    Max,
    Avg,
    Sum,
    Count,
}

/// One `SELECT`-list aggregate expression. `column = None` is only
/// valid for `Count` (`COUNT(*)`, which counts rows without skipping
/// anything).
pub struct AggSpec {
    pub func: AggFunc,
    pub column: Option<usize>,
    pub label: String,
}

enum Accumulator {
    MinMax(Option<Value>, AggFunc),
    SumAvg { sum: f64, count: u64, func: AggFunc },
    Count(u64),
}

impl Accumulator {
    fn new(func: AggFunc) -> Self {
        match func {
            AggFunc::Min | AggFunc::Max => Accumulator::MinMax(None, func),
            AggFunc::Sum | AggFunc::Avg => Accumulator::SumAvg { sum: 0.0, count: 0, func },
            AggFunc::Count => Accumulator::Count(0),
        }
    }

    /// `v = None` means `COUNT(*)`'s unconditional row tick; every
    /// other accumulator skips NULLs (spec §4.6: "COUNT(col) and the
    /// others skip NULLs").
    fn feed(&mut self, v: Option<&Value>) {
        match self {
            Accumulator::Count(n) => {
                if v.is_none() || !v.unwrap().is_null() {
                    *n += 1;
                }
            }
            Accumulator::MinMax(slot, func) => {
                let Some(v) = v else { return };
                if v.is_null() {
                    return;
                }
                match slot {
                    None => *slot = Some(v.clone()),
                    Some(current) => {
                        let better = match (func, value::compare(v, current)) {
                            (AggFunc::Min, Some(std::cmp::Ordering::Less)) => true,
                            (AggFunc::Max, Some(std::cmp::Ordering::Greater)) => true,
                            _ => false,
                        };
                        if better {
                            *slot = Some(v.clone());
                        }
                    }
                }
            }
            Accumulator::SumAvg { sum, count, .. } => {
                let Some(v) = v else { return };
                let numeric = match v {
                    Value::Int(i) => Some(*i as f64),
                    Value::Float(f) => Some(*f as f64),
                    _ => None,
                };
                if let Some(n) = numeric {
                    *sum += n;
                    *count += 1;
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Int(n as i32),
            Accumulator::MinMax(slot, _) => slot.unwrap_or(Value::Null),
            Accumulator::SumAvg { sum, count, func } => {
                if count == 0 {
                    Value::Null
                } else if func == AggFunc::Sum {
                    Value::Float(sum as f32)
                } else {
                    Value::Float((sum / count as f64) as f32)
                }
            }
        }
    }
}

/// Rows sharing the same values at `group_positions` share one
/// accumulator set; `Vec`-backed rather than hashed since `Value`
/// doesn't implement `Hash` (its float variant can't) and grouping
/// cardinality here is small.
struct Group {
    key: Vec<Value>,
    accumulators: Vec<Accumulator>,
}

fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| match (x.is_null(), y.is_null()) {
            (true, true) => true,
            (true, false) | (false, true) => false,
            _ => value::compare(x, y) == Some(std::cmp::Ordering::Equal),
        })
}

pub struct AggregateOperator<'a> {
    child: Box<dyn Operator + 'a>,
    group_positions: Vec<usize>,
    specs: Vec<AggSpec>,
    schema: TupleSchema,
    output: std::vec::IntoIter<Tuple>,
}

impl<'a> AggregateOperator<'a> {
    pub fn new(child: Box<dyn Operator + 'a>, group_by: Vec<TupleField>, specs: Vec<AggSpec>) -> Self {
        let group_positions = group_by
            .iter()
            .map(|f| child.schema().position(&f.table, &f.field).expect("GROUP BY column resolved at build time"))
            .collect();
        let mut fields: Vec<TupleField> = group_by;
        fields.extend(specs.iter().map(|s| TupleField::new("", s.label.clone())));
        let schema = TupleSchema::new(fields);
        Self {
            child,
            group_positions,
            specs,
            schema,
            output: Vec::new().into_iter(),
        }
    }
}

impl<'a> Operator for AggregateOperator<'a> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        let mut groups: Vec<Group> = Vec::new();
        while let Some(tuple) = self.child.next()? {
            let key: Vec<Value> = self.group_positions.iter().map(|&i| tuple.get(i).cloned().unwrap_or(Value::Null)).collect();
            let group = match groups.iter_mut().find(|g| keys_equal(&g.key, &key)) {
                Some(g) => g,
                None => {
                    groups.push(Group {
                        key: key.clone(),
                        accumulators: self.specs.iter().map(|s| Accumulator::new(s.func)).collect(),
                    });
                    groups.last_mut().unwrap()
                }
            };
            for (acc, spec) in group.accumulators.iter_mut().zip(&self.specs) {
                let v = spec.column.map(|i| tuple.get(i).cloned().unwrap_or(Value::Null));
                acc.feed(v.as_ref());
            }
        }

        // With no GROUP BY, aggregation always emits exactly one row
        // (spec §4.6), even over zero input rows (e.g. COUNT(*) = 0).
        if groups.is_empty() && self.group_positions.is_empty() {
            groups.push(Group {
                key: Vec::new(),
                accumulators: self.specs.iter().map(|s| Accumulator::new(s.func)).collect(),
            });
        }

        let rows = groups
            .into_iter()
            .map(|g| {
                let mut values = g.key;
                values.extend(g.accumulators.into_iter().map(Accumulator::finish));
                Tuple::new(values)
            })
            .collect::<Vec<_>>();
        self.output = rows.into_iter();
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        Ok(self.output.next())
    }

    fn schema(&self) -> &TupleSchema {
        &self.schema
    }

    fn close(&mut self) -> DbResult<()> {
        self.child.close()
    }
}
