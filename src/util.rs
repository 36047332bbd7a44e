//! Small ergonomic helpers, copied in spirit from
//! `small-db-small-db/src/util.rs`.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shortcut to replace the `RwLock` `.read().unwrap()` / `.write().unwrap()`
/// pattern with `.rl()` / `.wl()`.
///
/// (original source of the idiom:
/// <https://github.com/tikv/tikv/blob/b15ea3b1cd766375cb52019e35c195ed797124df/components/tikv_util/src/lib.rs#L171-L186>)
pub trait HandyRwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T>;
    fn rl(&self) -> RwLockReadGuard<'_, T>;
}

impl<T> HandyRwLock<T> for RwLock<T> {
    fn wl(&self) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap()
    }

    fn rl(&self) -> RwLockReadGuard<'_, T> {
        self.read().unwrap()
    }
}

/// `ceil(bits / 8)`, used throughout the page formats for NULL bitmaps
/// and slot-occupancy bitmaps (spec §3).
pub fn bytes_for_bits(bits: usize) -> usize {
    (bits + 7) / 8
}

/// Round `size` up to the next multiple of 8, used when aligning record
/// slots (spec §3: `record_size_aligned`).
pub fn align8(size: usize) -> usize {
    (size + 7) & !7
}
