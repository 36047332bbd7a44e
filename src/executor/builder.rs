//! Two-phase query plan builder (spec §4.6 "Two-phase planning"): since
//! the SQL front-end is out of scope, callers hand the builder an
//! already-resolved `QueryPlan` instead of SQL text — the builder's job
//! is purely operator composition, grounded in `original_source`'s
//! `executor_builder.cpp` (`create_selection_executor`).
//!
//! Composition order: scans bottom-up over `plan.tables` in reverse-
//! declaration order, joins wrapped around them so the final
//! (outermost) join sees every table's columns and carries the cross-
//! table join predicate; then sub-queries; then aggregation or
//! straight projection.

use std::sync::Arc;

use crate::error::{DbError, DbResult};
use crate::executor::aggregate::{AggFunc, AggSpec, AggregateOperator};
use crate::executor::join::JoinOperator;
use crate::executor::operator::Operator;
use crate::executor::order_by::{OrderByOperator, SortDirection, SortKey};
use crate::executor::output::{OutputColumn, OutputOperator};
use crate::executor::scan::ScanOperator;
use crate::executor::subquery::{SubqueryOp, SubqueryOperator, SubqueryPredicate};
use crate::executor::tuple::{TupleField, TupleSchema};
use crate::filter::row_filter::RowCondition;
use crate::filter::tuple_filter::{CartesianFilter, CompositeCartesianFilter, TupleCondition};
use crate::table::Table;
use crate::transaction::Transaction;

pub struct TableRef {
    pub name: String,
    pub conditions: Vec<RowCondition>,
}

pub struct SubqueryRef {
    pub table: TableRef,
    pub outer_column: (String, String),
    pub inner_column: (String, String),
    pub op: SubqueryOp,
    pub extra: Vec<TupleCondition>,
}

pub struct AggSpecPlan {
    pub func: AggFunc,
    pub column: Option<(String, String)>,
    pub label: String,
}

pub struct OrderKey {
    pub column: (String, String),
    pub direction: SortDirection,
}

pub struct QueryPlan {
    pub tables: Vec<TableRef>,
    pub join_conditions: Vec<TupleCondition>,
    pub subqueries: Vec<SubqueryRef>,
    pub group_by: Vec<(String, String)>,
    pub aggregates: Vec<AggSpecPlan>,
    pub order_by: Vec<OrderKey>,
    pub projection: Vec<OutputColumn>,
}

fn resolve(schema: &TupleSchema, table: &str, field: &str) -> DbResult<usize> {
    schema.position(table, field).ok_or_else(|| DbError::FieldNotExist(format!("{}.{}", table, field)))
}

/// Folds `tables` into a left-deep join tree, innermost-out (reverse
/// declaration order): the rightmost table scans first, each earlier
/// table is joined in front of it. `join_conditions` only need to be
/// bound once the tree holds every table, so they're attached to the
/// final (leftmost) join, where the combined schema already spans the
/// whole FROM list.
fn build_joins<'a>(
    lookup: &dyn Fn(&str) -> DbResult<Arc<Table>>,
    tables: &[TableRef],
    join_conditions: &[TupleCondition],
    tx: Option<&'a Transaction>,
) -> DbResult<Box<dyn Operator + 'a>> {
    if tables.is_empty() {
        return Err(DbError::InvalidArgument("query must reference at least one table".into()));
    }

    let scan_at = |i: usize| -> DbResult<Box<dyn Operator + 'a>> {
        Ok(Box::new(ScanOperator::new(lookup(&tables[i].name)?, tables[i].conditions.clone(), tx)))
    };

    let mut op = scan_at(tables.len() - 1)?;
    for idx in (0..tables.len() - 1).rev() {
        let scan = scan_at(idx)?;
        let is_outermost = idx == 0;
        let filter = if is_outermost {
            let joined_schema = TupleSchema::join(scan.schema(), op.schema());
            let mut filters = Vec::with_capacity(join_conditions.len());
            for condition in join_conditions.iter().cloned() {
                filters.push(CartesianFilter::bind_schema(&joined_schema, condition)?);
            }
            CompositeCartesianFilter::new(filters)
        } else {
            CompositeCartesianFilter::new(Vec::new())
        };
        op = Box::new(JoinOperator::new(scan, op, filter));
    }
    Ok(op)
}

pub fn build<'a>(lookup: &dyn Fn(&str) -> DbResult<Arc<Table>>, tx: Option<&'a Transaction>, plan: QueryPlan) -> DbResult<Box<dyn Operator + 'a>> {
    let mut op = build_joins(lookup, &plan.tables, &plan.join_conditions, tx)?;

    for subquery in plan.subqueries {
        let right = Box::new(ScanOperator::new(lookup(&subquery.table.name)?, subquery.table.conditions, tx));
        let joined_schema = TupleSchema::join(op.schema(), right.schema());
        let mut extra_filters = Vec::with_capacity(subquery.extra.len());
        for condition in subquery.extra {
            extra_filters.push(CartesianFilter::bind_schema(&joined_schema, condition)?);
        }
        let predicate = SubqueryPredicate {
            left_position: resolve(op.schema(), &subquery.outer_column.0, &subquery.outer_column.1)?,
            right_position: resolve(right.schema(), &subquery.inner_column.0, &subquery.inner_column.1)?,
            op: subquery.op,
            extra: if extra_filters.is_empty() { None } else { Some(CompositeCartesianFilter::new(extra_filters)) },
        };
        op = Box::new(SubqueryOperator::new(op, right, predicate));
    }

    if !plan.aggregates.is_empty() || !plan.group_by.is_empty() {
        let group_fields: Vec<TupleField> = plan.group_by.iter().map(|(t, f)| TupleField::new(t.clone(), f.clone())).collect();
        let mut specs = Vec::with_capacity(plan.aggregates.len());
        for spec in plan.aggregates {
            let column = match spec.column {
                Some((t, f)) => Some(resolve(op.schema(), &t, &f)?),
                None => None,
            };
            specs.push(AggSpec { func: spec.func, column, label: spec.label });
        }
        op = Box::new(AggregateOperator::new(op, group_fields, specs));
    }

    if !plan.order_by.is_empty() {
        let mut keys = Vec::with_capacity(plan.order_by.len());
        for key in plan.order_by {
            keys.push(SortKey { position: resolve(op.schema(), &key.column.0, &key.column.1)?, direction: key.direction });
        }
        op = Box::new(OrderByOperator::new(op, keys));
    }

    Ok(Box::new(OutputOperator::new(op, plan.projection)?))
}
