//! Small shared type aliases, in the teacher's style
//! (`small-db-small-db/src/types.rs`): a thin `Pod<T>` wrapper around
//! `Arc<RwLock<T>>` so call sites read as "a handle to a shared,
//! mutable T" rather than spelling out the lock type everywhere.

use std::sync::{Arc, RwLock};

/// A shared, lock-guarded handle to a value of type `T`.
pub type Pod<T> = Arc<RwLock<T>>;

pub fn pod<T>(value: T) -> Pod<T> {
    Arc::new(RwLock::new(value))
}

/// A page number within one paged file. Page numbers are 1-based; page 1
/// is always that file's header page (spec §3).
pub type PageNum = u32;

/// A slot index within one slotted data page.
pub type SlotNum = u32;

/// A small integer handle identifying an open paged file within the
/// buffer pool (spec §4.1).
pub type FileId = u32;

/// A transaction identifier (spec §4.7). Signed so that a record's `trx`
/// column can carry the sign-bit-as-deleted-flag encoding.
pub type TxId = i32;
