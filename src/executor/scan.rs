//! Leaf operator: reads one table through `Table::scan`, which itself
//! picks between a full scan and an `IndexScanner` per the index-
//! eligibility rule (spec §4.4, §4.6 "Scan"), grounded in the teacher's
//! `TableStream` (`src/sql/executor/stream/table_stream.rs`).

use std::sync::Arc;

use crate::error::DbResult;
use crate::executor::operator::Operator;
use crate::executor::tuple::{Tuple, TupleField, TupleSchema};
use crate::filter::row_filter::RowCondition;
use crate::table::Table;
use crate::transaction::Transaction;

pub struct ScanOperator<'a> {
    table: Arc<Table>,
    table_alias: String,
    conditions: Vec<RowCondition>,
    tx: Option<&'a Transaction>,
    schema: TupleSchema,
    rows: std::vec::IntoIter<crate::filter::Value>,
    buffered_rows: Vec<Vec<crate::filter::Value>>,
}

impl<'a> ScanOperator<'a> {
    pub fn new(table: Arc<Table>, conditions: Vec<RowCondition>, tx: Option<&'a Transaction>) -> Self {
        let table_alias = table.name().to_string();
        let schema = TupleSchema::new(
            table
                .meta()
                .user_fields()
                .iter()
                .map(|f| TupleField::new(table_alias.clone(), f.name.clone()))
                .collect(),
        );
        Self {
            table,
            table_alias,
            conditions,
            tx,
            schema,
            rows: Vec::new().into_iter(),
            buffered_rows: Vec::new(),
        }
    }

    pub fn table_alias(&self) -> &str {
        &self.table_alias
    }
}

impl<'a> Operator for ScanOperator<'a> {
    fn open(&mut self) -> DbResult<()> {
        let matched = self.table.scan(self.tx, self.conditions.clone())?;
        self.buffered_rows = matched.into_iter().map(|(_, values)| values).collect();
        self.rows = std::mem::take(&mut self.buffered_rows).into_iter();
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        Ok(self.rows.next().map(Tuple::new))
    }

    fn schema(&self) -> &TupleSchema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::pool::BufferPool;
    use crate::catalog::field::FieldType;
    use crate::catalog::table_meta::UserFieldSpec;
    use crate::config::EngineConfig;
    use crate::filter::Value;
    use tempfile::tempdir;

    #[test]
    fn scans_every_row_with_no_conditions() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path()).with_page_size(4096).with_buffer_pool_frames(32);
        let pool = Arc::new(BufferPool::new(config.buffer_pool_frames, config.page_size, 16));
        let fields = vec![UserFieldSpec {
            name: "id".into(),
            field_type: FieldType::Int,
            len: None,
            nullable: false,
        }];
        let table = Arc::new(Table::create(pool, &config, "t", fields).unwrap());
        table.insert(None, &[Value::Int(1)]).unwrap();
        table.insert(None, &[Value::Int(2)]).unwrap();

        let mut op = ScanOperator::new(table, vec![], None);
        op.open().unwrap();
        let mut count = 0;
        while op.next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
