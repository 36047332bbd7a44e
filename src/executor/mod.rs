//! Operator-tree query executor (spec §4.6), grounded in
//! `original_source/src/observer/sql/executor/` and the teacher's
//! (unimplemented) `src/sql/executor/` stubs.

pub mod aggregate;
pub mod builder;
pub mod join;
pub mod operator;
pub mod order_by;
pub mod output;
pub mod scan;
pub mod subquery;
pub mod tuple;
