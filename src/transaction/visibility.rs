//! Per-row visibility check over the `trx` system column (spec §4.7).
//!
//! The distilled spec gives a boolean formula — `|trx_col| == T OR
//! (trx_col > 0 AND trx_col != T)` — immediately followed by prose that
//! contradicts it for the delete case ("deletions flip the sign in
//! place so **other** transactions still see the pre-image"): the
//! literal formula makes a negative `trx_col` visible only to the
//! *deleting* transaction, the opposite of what the prose asks for.
//! `original_source/` keeps its transaction log (`storage/trx/trx.h`)
//! out of the retrieved file set, so there is no original bit pattern
//! to defer to either. Per spec §9's guidance for this class of
//! ambiguity ("re-derive a total order deliberately" rather than copy
//! a contradiction), this module implements the prose: a pending
//! delete stays visible to everyone except the transaction that issued
//! it; a positive column (an uncommitted insert, or — since the engine
//! is single-writer, spec §1 — any already-committed row) is visible
//! to everyone. See `DESIGN.md` for the full writeup.

use crate::types::TxId;

/// `trx_col` as physically stored; `viewer` is the id of the
/// transaction doing the read, or `0` for an autocommit / no-transaction
/// read (transaction ids are assigned starting at 1, so `0` never
/// collides with a real one).
pub fn is_visible(trx_col: i32, viewer: TxId) -> bool {
    if trx_col >= 0 {
        true
    } else {
        trx_col.unsigned_abs() as TxId != viewer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_or_own_insert_is_always_visible() {
        assert!(is_visible(5, 5));
        assert!(is_visible(5, 9));
        assert!(is_visible(0, 0));
    }

    #[test]
    fn pending_delete_hidden_from_its_own_deleter_only() {
        assert!(!is_visible(-7, 7));
        assert!(is_visible(-7, 1));
        assert!(is_visible(-7, 0));
    }
}
