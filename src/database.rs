//! Process-wide engine handle (spec §6, §9 "Global mutable state"),
//! grounded in the teacher's `Unique` facade (`src/utils/unique.rs`)
//! and `src/database.rs`'s `Database::global()` — adapted so the
//! singleton is built from an explicit `EngineConfig` rather than a
//! baked-in default (spec §9's resolution, also recorded in
//! `config.rs`): a base directory's tables *are* its catalog (spec §6:
//! "the catalog is the set of subdirectories directly under it").

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;

use crate::buffer::pool::BufferPool;
use crate::catalog::table_meta::UserFieldSpec;
use crate::config::{EngineConfig, MAX_OPEN_FILES};
use crate::error::{DbError, DbResult};
use crate::table::Table;
use crate::transaction::{Transaction, TxOp};
use crate::util::HandyRwLock;

static DB: OnceCell<Database> = OnceCell::new();

pub struct Database {
    config: EngineConfig,
    pool: Arc<BufferPool>,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl Database {
    /// Opens every `<name>.table` file already present under
    /// `config.base_dir`, then hands back a `Database` ready to serve
    /// requests. Does not install it as the process singleton — call
    /// `install` for that.
    pub fn new(config: EngineConfig) -> DbResult<Self> {
        std::fs::create_dir_all(&config.base_dir)?;
        let pool = Arc::new(BufferPool::new(config.buffer_pool_frames, config.page_size, MAX_OPEN_FILES));
        let db = Self {
            config,
            pool,
            tables: RwLock::new(HashMap::new()),
        };
        db.open_existing_tables()?;
        Ok(db)
    }

    fn open_existing_tables(&self) -> DbResult<()> {
        for entry in std::fs::read_dir(&self.config.base_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("table") {
                continue;
            }
            let name = path.file_stem().unwrap().to_string_lossy().into_owned();
            let table = Table::open(self.pool.clone(), &self.config, &name)?;
            self.tables.wl().insert(name, Arc::new(table));
        }
        Ok(())
    }

    /// Installs `self` as the process-wide singleton. Only ever meant
    /// to run once, from whatever out-of-scope CLI/server collaborator
    /// constructs the engine; a second call is rejected rather than
    /// silently replacing live table handles underneath in-flight
    /// readers.
    pub fn install(self) -> DbResult<()> {
        DB.set(self).map_err(|_| DbError::Generic("database already installed".into()))
    }

    pub fn global() -> &'static Database {
        DB.get().expect("Database::install must run before Database::global is reached")
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub fn create_table(&self, name: impl Into<String>, fields: Vec<UserFieldSpec>) -> DbResult<Arc<Table>> {
        let name = name.into();
        let mut tables = self.tables.wl();
        if tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }
        let table = Arc::new(Table::create(self.pool.clone(), &self.config, &name, fields)?);
        tables.insert(name.clone(), table.clone());
        Ok(table)
    }

    pub fn table(&self, name: &str) -> DbResult<Arc<Table>> {
        self.tables.rl().get(name).cloned().ok_or_else(|| DbError::TableNotExist(name.to_string()))
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.rl().keys().cloned().collect()
    }

    /// Drops a table, provided no other handle is still holding it open
    /// (spec §4.4 "Drop"): a shared `Arc<Table>` outliving the catalog
    /// entry would let a concurrent reader touch files this call is
    /// about to delete.
    pub fn drop_table(&self, name: &str) -> DbResult<()> {
        let table = self.tables.wl().remove(name).ok_or_else(|| DbError::TableNotExist(name.to_string()))?;
        let table = Arc::try_unwrap(table).map_err(|_| DbError::Generic(format!("table `{}` still has open handles", name)))?;
        table.drop_table(&self.config)
    }

    /// Begin a multi-statement transaction (spec §4.7).
    pub fn begin(&self) -> Transaction {
        Transaction::begin()
    }

    /// Commit: insertions are no-ops at the data level; deletions
    /// become real slot-clear + index-purge + TEXT-page reset (spec
    /// §4.7).
    pub fn commit(&self, tx: &Transaction) -> DbResult<()> {
        for entry in tx.drain() {
            if entry.op == TxOp::Delete {
                self.table(&entry.table)?.apply_commit_delete(entry.rid)?;
            }
        }
        Ok(())
    }

    /// Rollback: insertions are physically deleted; deletions are
    /// restored by clearing the sign bit (spec §4.7).
    pub fn rollback(&self, tx: &Transaction) -> DbResult<()> {
        for entry in tx.drain() {
            let table = self.table(&entry.table)?;
            match entry.op {
                TxOp::Insert => table.apply_rollback_insert(entry.rid)?,
                TxOp::Delete => table.apply_rollback_delete(entry.rid)?,
            }
        }
        Ok(())
    }

    pub fn sync_all(&self) -> DbResult<()> {
        for table in self.tables.rl().values() {
            table.sync()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::field::FieldType;
    use crate::filter::row_filter::{RowCondition, RowOperand};
    use crate::filter::{CompOp, Value};
    use tempfile::tempdir;

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempdir().unwrap();
        let config = EngineConfig::new(dir.path()).with_page_size(4096).with_buffer_pool_frames(32);
        let db = Database::new(config).unwrap();
        (dir, db)
    }

    #[test]
    fn create_table_then_reopen_sees_existing_rows() {
        let (dir, db) = test_db();
        let fields = vec![UserFieldSpec { name: "id".into(), field_type: FieldType::Int, len: None, nullable: false }];
        let table = db.create_table("t", fields).unwrap();
        table.insert(None, &[Value::Int(1)]).unwrap();
        db.sync_all().unwrap();

        let config2 = EngineConfig::new(dir.path()).with_page_size(4096).with_buffer_pool_frames(32);
        let db2 = Database::new(config2).unwrap();
        let reopened = db2.table("t").unwrap();
        assert_eq!(reopened.scan(None, vec![]).unwrap().len(), 1);
    }

    #[test]
    fn commit_physically_removes_a_pending_delete() {
        let (_dir, db) = test_db();
        let fields = vec![UserFieldSpec { name: "id".into(), field_type: FieldType::Int, len: None, nullable: false }];
        let table = db.create_table("t", fields).unwrap();
        table.insert(None, &[Value::Int(1)]).unwrap();

        let tx = db.begin();
        table
            .delete(
                Some(&tx),
                vec![RowCondition { left: RowOperand::Field("id".into()), op: CompOp::Eq, right: RowOperand::Const(Value::Int(1)) }],
            )
            .unwrap();
        db.commit(&tx).unwrap();

        assert_eq!(table.scan(None, vec![]).unwrap().len(), 0);
    }

    #[test]
    fn drop_table_rejects_while_a_handle_is_still_held() {
        let (_dir, db) = test_db();
        let fields = vec![UserFieldSpec { name: "id".into(), field_type: FieldType::Int, len: None, nullable: false }];
        let _table = db.create_table("t", fields).unwrap();
        assert!(db.drop_table("t").is_err());
    }
}
