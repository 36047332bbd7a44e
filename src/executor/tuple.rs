//! Materialized rows that flow between executor operators (spec §4.6),
//! grounded in `original_source/src/observer/sql/executor/tuple.h`
//! (`Tuple`/`TupleSchema`/`TupleSet`).

use crate::filter::Value;

/// One `(table, field)` column reference in a tuple's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleField {
    pub table: String,
    pub field: String,
}

impl TupleField {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }
}

/// The ordered list of columns a `Tuple` carries, shared by every tuple
/// produced by one operator.
#[derive(Debug, Clone, Default)]
pub struct TupleSchema {
    pub fields: Vec<TupleField>,
}

impl TupleSchema {
    pub fn new(fields: Vec<TupleField>) -> Self {
        Self { fields }
    }

    pub fn position(&self, table: &str, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.table == table && f.field == field)
    }

    /// Concatenate two schemas, the shape a join's output takes (spec
    /// §4.6: "combine").
    pub fn join(left: &TupleSchema, right: &TupleSchema) -> TupleSchema {
        let mut fields = left.fields.clone();
        fields.extend(right.fields.iter().cloned());
        TupleSchema { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One materialized row: parallel to its owning operator's
/// `TupleSchema`.
#[derive(Debug, Clone, Default)]
pub struct Tuple {
    pub values: Vec<Value>,
}

impl Tuple {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Concatenate this (left) tuple with `other` (right), matching
    /// `TupleSchema::join`'s column order.
    pub fn join(&self, other: &Tuple) -> Tuple {
        let mut values = self.values.clone();
        values.extend(other.values.iter().cloned());
        Tuple { values }
    }
}

/// A materialized, schema-carrying set of rows passed between operators
/// (spec §4.6, §GLOSSARY: "TupleSet").
#[derive(Debug, Clone, Default)]
pub struct TupleSet {
    pub schema: TupleSchema,
    pub tuples: Vec<Tuple>,
}

impl TupleSet {
    pub fn new(schema: TupleSchema) -> Self {
        Self {
            schema,
            tuples: Vec::new(),
        }
    }

    pub fn push(&mut self, tuple: Tuple) {
        self.tuples.push(tuple);
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}
