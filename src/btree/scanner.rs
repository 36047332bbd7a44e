//! Index scan over a B+Tree for one comparison operator (spec §4.3,
//! "Scanning"). `IS` / `IS NOT` never reach here — a table with a NULL
//! in an indexed column has no leaf entry for that row at all, so those
//! operators always fall back to a full table scan at the caller.

use std::cmp::Ordering;

use crate::btree::key::compare_keys;
use crate::btree::node::NodePage;
use crate::btree::tree::BTree;
use crate::error::{DbError, DbResult};
use crate::filter::CompOp;
use crate::record::file_handle::Rid;

pub struct IndexScanner<'a> {
    tree: &'a BTree,
    op: CompOp,
    value: Vec<u8>,
    leaf: Option<NodePage>,
    idx: usize,
    done: bool,
}

impl<'a> IndexScanner<'a> {
    pub fn new(tree: &'a BTree, op: CompOp, value: Vec<u8>) -> DbResult<Self> {
        let (leaf, idx) = match op {
            CompOp::Eq | CompOp::Ge | CompOp::Gt => tree.start_leaf_for(&value)?,
            CompOp::Lt | CompOp::Le | CompOp::Ne => (tree.leftmost()?, 0),
            CompOp::Is | CompOp::IsNot => {
                return Err(DbError::InvalidArgument(
                    "IS / IS NOT never drive an index scan".to_string(),
                ))
            }
        };
        Ok(Self {
            tree,
            op,
            value,
            leaf: Some(leaf),
            idx,
            done: false,
        })
    }

    pub fn next(&mut self) -> DbResult<Option<Rid>> {
        loop {
            if self.done {
                return Ok(None);
            }

            let needs_next_leaf = match &self.leaf {
                Some(leaf) => self.idx >= leaf.key_count(),
                None => true,
            };
            if needs_next_leaf {
                let next_page = match &self.leaf {
                    Some(leaf) => leaf.next_leaf(),
                    None => 0,
                };
                if let Some(leaf) = self.leaf.take() {
                    self.tree.unpin(leaf)?;
                }
                if next_page == 0 {
                    self.done = true;
                    return Ok(None);
                }
                self.leaf = Some(self.tree.load_page(next_page)?);
                self.idx = 0;
                continue;
            }

            let leaf = self.leaf.as_ref().unwrap();
            let key = leaf.leaf_key(self.idx);
            let ord = compare_keys(self.tree.key_type(), &key, &self.value);

            let (emit, keep_going) = match self.op {
                CompOp::Eq => (ord == Ordering::Equal, ord != Ordering::Greater),
                CompOp::Ge => (ord != Ordering::Less, true),
                CompOp::Gt => (ord == Ordering::Greater, true),
                CompOp::Le => (ord != Ordering::Greater, ord != Ordering::Greater),
                CompOp::Lt => (ord == Ordering::Less, ord == Ordering::Less),
                CompOp::Ne => (ord != Ordering::Equal, true),
                CompOp::Is | CompOp::IsNot => unreachable!("filtered out in new()"),
            };

            let rid = leaf.leaf_rid(self.idx);
            self.idx += 1;
            if !keep_going {
                self.done = true;
            }
            if emit {
                return Ok(Some(rid));
            }
            // entry excluded; loop again (top-of-loop `done` check exits
            // immediately if `keep_going` was false above).
        }
    }
}

impl Drop for IndexScanner<'_> {
    fn drop(&mut self) {
        if let Some(leaf) = self.leaf.take() {
            let _ = self.tree.unpin(leaf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::key::KeyType;
    use crate::buffer::pool::BufferPool;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn tree_with(values: &[i32]) -> (tempfile::TempDir, BTree) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.data");
        let pool = Arc::new(BufferPool::new(16, 256, 8));
        let tree = BTree::create(pool, &path, KeyType::Int, 4, false).unwrap();
        for (i, v) in values.iter().enumerate() {
            tree.insert_entry(&v.to_le_bytes(), Rid::new(2, i as u32)).unwrap();
        }
        (dir, tree)
    }

    fn collect(tree: &BTree, op: CompOp, value: i32) -> Vec<u32> {
        let mut scanner = IndexScanner::new(tree, op, value.to_le_bytes().to_vec()).unwrap();
        let mut out = Vec::new();
        while let Some(rid) = scanner.next().unwrap() {
            out.push(rid.slot_num);
        }
        out.sort_unstable();
        out
    }

    #[test]
    fn eq_scan_finds_only_matching_entries() {
        let (_dir, tree) = tree_with(&[1, 2, 2, 3]);
        assert_eq!(collect(&tree, CompOp::Eq, 2), vec![1, 2]);
    }

    #[test]
    fn range_scans_bound_correctly() {
        let (_dir, tree) = tree_with(&(0..50).collect::<Vec<_>>());
        assert_eq!(collect(&tree, CompOp::Lt, 5), vec![0, 1, 2, 3, 4]);
        assert_eq!(collect(&tree, CompOp::Ge, 47), vec![47, 48, 49]);
    }

    #[test]
    fn ne_scan_skips_the_value() {
        let (_dir, tree) = tree_with(&[1, 2, 3]);
        assert_eq!(collect(&tree, CompOp::Ne, 2), vec![0, 2]);
    }

    /// A run of duplicate keys long enough to span several leaves used to
    /// make `Eq` scans miss the entries an earlier split had pushed left
    /// of the leaf `find_leaf` lands on.
    #[test]
    fn eq_scan_crosses_split_leaves_of_a_duplicate_run() {
        let mut values = vec![5i32; 120];
        values.extend([1, 2, 9]);
        let (_dir, tree) = tree_with(&values);
        let expected: Vec<u32> = (0..120).collect();
        assert_eq!(collect(&tree, CompOp::Eq, 5), expected);
    }
}
