//! The operator tree's narrow contract (spec §4.6, §9 "Virtual dispatch
//! / operator tree"), grounded in the teacher's `Stream` trait
//! (`src/sql/executor/stream/stream.rs`) and `original_source`'s
//! `init()`/`next()` execution-node protocol
//! (`sql/executor/execution_node.h`). Composition over inheritance: a
//! `JoinOperator` owns two `Box<dyn Operator>` children rather than
//! subclassing a shared base.

use crate::error::DbResult;
use crate::executor::tuple::{Tuple, TupleSchema};

/// One node in the executor's operator tree. `open` performs whatever
/// setup a pull-based `next()` needs (e.g. materializing a child);
/// `next` pulls one tuple at a time until exhausted.
pub trait Operator {
    fn open(&mut self) -> DbResult<()>;

    fn next(&mut self) -> DbResult<Option<Tuple>>;

    fn schema(&self) -> &TupleSchema;

    fn close(&mut self) -> DbResult<()> {
        Ok(())
    }
}
