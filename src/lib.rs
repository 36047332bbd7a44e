//! `reldb`: a small disk-backed relational storage and execution
//! engine — buffer pool, slotted-page record manager, B+Tree secondary
//! indexes, a JSON-backed catalog, a table layer with per-row
//! transaction hooks, a condition-filter subsystem, and a tree-of-
//! operators executor. Grounded throughout in `small-db-small-db`'s
//! idioms: `Arc<RwLock<T>>` ("Pod") shared state, the `HandyRwLock`
//! `.rl()`/`.wl()` extension trait, a `once_cell`-backed `Database`
//! singleton, and `thiserror`-flavored errors in place of panics
//! outside tests.

pub mod btree;
pub mod buffer;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod executor;
pub mod filter;
pub mod log;
pub mod record;
pub mod table;
pub mod transaction;
pub mod types;
pub mod util;

pub use database::Database;
pub use error::{DbError, DbResult};
