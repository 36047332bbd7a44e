//! Output operator: projects the requested schema — including `*`
//! expansion in declaration order — and renders the session's textual
//! result set, a header line of column names joined by `" | "` then one
//! line per row (spec §4.6 "Output", §6 "Wire protocol").

use crate::error::DbResult;
use crate::executor::operator::Operator;
use crate::executor::tuple::{Tuple, TupleField, TupleSchema};
use crate::filter::Value;

/// One requested output column; `Star` expands to every column of the
/// child's schema, in the order the child declares them (spec §4.6:
/// "`*` expansion in declaration order").
pub enum OutputColumn {
    Star,
    Column { table: String, field: String },
}

pub struct OutputOperator<'a> {
    child: Box<dyn Operator + 'a>,
    positions: Vec<usize>,
    schema: TupleSchema,
}

impl<'a> OutputOperator<'a> {
    pub fn new(child: Box<dyn Operator + 'a>, columns: Vec<OutputColumn>) -> crate::error::DbResult<Self> {
        use crate::error::DbError;
        let child_schema = child.schema().clone();
        let mut positions = Vec::new();
        let mut fields: Vec<TupleField> = Vec::new();
        for column in columns {
            match column {
                OutputColumn::Star => {
                    for (i, f) in child_schema.fields.iter().enumerate() {
                        positions.push(i);
                        fields.push(f.clone());
                    }
                }
                OutputColumn::Column { table, field } => {
                    let pos = child_schema
                        .position(&table, &field)
                        .ok_or_else(|| DbError::FieldNotExist(format!("{}.{}", table, field)))?;
                    positions.push(pos);
                    fields.push(child_schema.fields[pos].clone());
                }
            }
        }
        Ok(Self {
            child,
            positions,
            schema: TupleSchema::new(fields),
        })
    }
}

impl<'a> Operator for OutputOperator<'a> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        match self.child.next()? {
            Some(tuple) => {
                let values = self.positions.iter().map(|&i| tuple.get(i).cloned().unwrap_or(Value::Null)).collect();
                Ok(Some(Tuple::new(values)))
            }
            None => Ok(None),
        }
    }

    fn schema(&self) -> &TupleSchema {
        &self.schema
    }

    fn close(&mut self) -> DbResult<()> {
        self.child.close()
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{:.2}", f),
        Value::Chars(s) | Value::Dates(s) | Value::Texts(s) => s.clone(),
        Value::Null => "NULL".to_string(),
    }
}

/// Drains `op` to completion and renders spec §6's textual result set:
/// a header line of column names, one `" | "`-joined line per row, and
/// a trailing `.` marker line.
pub fn render_result_set(op: &mut dyn Operator) -> DbResult<String> {
    let header = op.schema().fields.iter().map(|f| f.field.as_str()).collect::<Vec<_>>().join(" | ");
    let mut out = String::new();
    out.push_str(&header);
    out.push('\n');
    while let Some(tuple) = op.next()? {
        let line = tuple.values.iter().map(format_value).collect::<Vec<_>>().join(" | ");
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(".\n");
    Ok(out)
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
    fn star_expands_in_declaration_order() {
        let child = VecOperator {
            schema: TupleSchema::new(vec![TupleField::new("t", "id"), TupleField::new("t", "s")]),
            rows: vec![vec![Value::Int(2), Value::Chars("cd".into())]],
            cursor: 0,
        };
        let mut op = OutputOperator::new(Box::new(child), vec![OutputColumn::Star]).unwrap();
        op.open().unwrap();
        let text = render_result_set(&mut op).unwrap();
        assert_eq!(text, "id | s\n2 | cd\n.\n");
    }
}
