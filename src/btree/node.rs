//! On-disk B+Tree node layout: leaf nodes hold `(key, RID)` entries,
//! internal nodes hold separator keys and child page numbers (spec
//! §4.3), grounded in the teacher's `src/btree/page/{internal_page,
//! leaf_page}.rs` node shape, adapted to index RIDs produced by the
//! record manager instead of holding table rows itself.

use std::cmp::Ordering;

use crate::buffer::pool::FrameHandle;
use crate::btree::key::{compare_keys, KeyType};
use crate::record::file_handle::Rid;
use crate::types::PageNum;

const HEADER_SIZE: usize = 17;
const NODE_TYPE_LEAF: u8 = 0;
const NODE_TYPE_INTERNAL: u8 = 1;

pub struct NodePage {
    frame: FrameHandle,
    key_len: usize,
}

impl NodePage {
    pub fn from_pinned(frame: FrameHandle, key_len: usize) -> Self {
        Self { frame, key_len }
    }

    pub fn into_frame(self) -> FrameHandle {
        self.frame
    }

    pub fn page_num(&self) -> PageNum {
        self.frame.page_num()
    }

    pub fn is_leaf(&self) -> bool {
        self.frame.read(|d| d[0]) == NODE_TYPE_LEAF
    }

    pub fn key_count(&self) -> usize {
        self.frame.read(|d| u32::from_le_bytes(d[1..5].try_into().unwrap())) as usize
    }

    fn set_key_count(&self, n: usize) {
        self.frame.write(|d| d[1..5].copy_from_slice(&(n as u32).to_le_bytes()));
    }

    pub fn leaf_capacity(page_size: usize, key_len: usize) -> usize {
        (page_size - HEADER_SIZE) / (key_len + 8)
    }

    pub fn internal_capacity(page_size: usize, key_len: usize) -> usize {
        (page_size - HEADER_SIZE) / (key_len + 4)
    }

    pub fn init_leaf(frame: FrameHandle, key_len: usize, next_leaf: PageNum) -> Self {
        frame.write(|d| {
            d[0] = NODE_TYPE_LEAF;
            d[1..5].copy_from_slice(&0u32.to_le_bytes());
            d[5..9].copy_from_slice(&next_leaf.to_le_bytes());
            d[9..13].copy_from_slice(&(key_len as u32).to_le_bytes());
            d[13..17].copy_from_slice(&0u32.to_le_bytes());
        });
        Self { frame, key_len }
    }

    pub fn init_internal(frame: FrameHandle, key_len: usize, first_child: PageNum) -> Self {
        frame.write(|d| {
            d[0] = NODE_TYPE_INTERNAL;
            d[1..5].copy_from_slice(&0u32.to_le_bytes());
            d[5..9].copy_from_slice(&0u32.to_le_bytes());
            d[9..13].copy_from_slice(&(key_len as u32).to_le_bytes());
            d[13..17].copy_from_slice(&0u32.to_le_bytes());
        });
        let node = Self { frame, key_len };
        node.set_internal_child(0, first_child);
        node
    }

    pub fn next_leaf(&self) -> PageNum {
        self.frame.read(|d| u32::from_le_bytes(d[5..9].try_into().unwrap()))
    }

    pub fn set_next_leaf(&self, page: PageNum) {
        self.frame.write(|d| d[5..9].copy_from_slice(&page.to_le_bytes()));
    }

    /// Previous leaf in key order, or `0` if this is the leftmost leaf.
    /// Lets a lookup that landed on the wrong leaf of a duplicate-key run
    /// (see `BTree::delete_entry`, `BTree::start_leaf_for`) walk back to
    /// the entries an earlier split left behind.
    pub fn prev_leaf(&self) -> PageNum {
        self.frame.read(|d| u32::from_le_bytes(d[13..17].try_into().unwrap()))
    }

    pub fn set_prev_leaf(&self, page: PageNum) {
        self.frame.write(|d| d[13..17].copy_from_slice(&page.to_le_bytes()));
    }

    // --- leaf entries: key_len bytes key, 4 bytes page_num, 4 bytes slot_num ---

    fn leaf_entry_size(&self) -> usize {
        self.key_len + 8
    }

    fn leaf_entry_offset(&self, i: usize) -> usize {
        HEADER_SIZE + i * self.leaf_entry_size()
    }

    pub fn leaf_key(&self, i: usize) -> Vec<u8> {
        let off = self.leaf_entry_offset(i);
        let len = self.key_len;
        self.frame.read(|d| d[off..off + len].to_vec())
    }

    pub fn leaf_rid(&self, i: usize) -> Rid {
        let off = self.leaf_entry_offset(i) + self.key_len;
        self.frame.read(|d| {
            let page_num = u32::from_le_bytes(d[off..off + 4].try_into().unwrap());
            let slot_num = u32::from_le_bytes(d[off + 4..off + 8].try_into().unwrap());
            Rid::new(page_num, slot_num)
        })
    }

    /// Binary search for `key`: `Ok(i)` if an equal key is at `i`,
    /// `Err(i)` for the insertion point that keeps keys sorted.
    pub fn leaf_search(&self, key_type: KeyType, key: &[u8]) -> Result<usize, usize> {
        let count = self.key_count();
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            match compare_keys(key_type, &self.leaf_key(mid), key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    /// Half-open range of indices in this leaf whose key compares equal
    /// to `key` (entries within a leaf are kept sorted, so the matches
    /// are contiguous). Used to walk a run of duplicate keys that a
    /// unique-leaf lookup can't see past (spec §4.3 non-unique indexes).
    pub fn leaf_equal_range(&self, key_type: KeyType, key: &[u8]) -> (usize, usize) {
        let count = self.key_count();
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if compare_keys(key_type, &self.leaf_key(mid), key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let start = lo;
        let mut hi = count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if compare_keys(key_type, &self.leaf_key(mid), key) == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        (start, lo)
    }

    pub fn leaf_insert_at(&self, i: usize, key: &[u8], rid: Rid) {
        let count = self.key_count();
        let size = self.leaf_entry_size();
        let key_len = self.key_len;
        self.frame.write(|d| {
            let start = HEADER_SIZE + i * size;
            let tail_start = HEADER_SIZE + count * size;
            d.copy_within(start..tail_start, start + size);
            d[start..start + key_len].copy_from_slice(key);
            d[start + key_len..start + key_len + 4].copy_from_slice(&rid.page_num.to_le_bytes());
            d[start + key_len + 4..start + key_len + 8].copy_from_slice(&rid.slot_num.to_le_bytes());
        });
        self.set_key_count(count + 1);
    }

    pub fn leaf_remove_at(&self, i: usize) {
        let count = self.key_count();
        let size = self.leaf_entry_size();
        self.frame.write(|d| {
            let start = HEADER_SIZE + i * size;
            let tail_start = HEADER_SIZE + (i + 1) * size;
            let tail_end = HEADER_SIZE + count * size;
            d.copy_within(tail_start..tail_end, start);
        });
        self.set_key_count(count - 1);
    }

    /// Split this full leaf in half, moving the upper half into
    /// `new_page` (already initialized as a leaf). Returns the
    /// separator key (the first key moved).
    pub fn split_leaf_into(&self, new_page: &NodePage) -> Vec<u8> {
        let count = self.key_count();
        let mid = count / 2;
        for i in mid..count {
            let key = self.leaf_key(i);
            let rid = self.leaf_rid(i);
            new_page.leaf_insert_at(new_page.key_count(), &key, rid);
        }
        for _ in mid..count {
            self.leaf_remove_at(mid);
        }
        new_page.leaf_key(0)
    }

    // --- internal entries: child[0], then (key, child) pairs ---

    fn internal_entry_size(&self) -> usize {
        self.key_len + 4
    }

    pub fn internal_child(&self, i: usize) -> PageNum {
        if i == 0 {
            return self.frame.read(|d| u32::from_le_bytes(d[9..13].try_into().unwrap()));
        }
        let off = HEADER_SIZE + (i - 1) * self.internal_entry_size() + self.key_len;
        self.frame.read(|d| u32::from_le_bytes(d[off..off + 4].try_into().unwrap()))
    }

    fn set_internal_child(&self, i: usize, child: PageNum) {
        if i == 0 {
            self.frame.write(|d| d[9..13].copy_from_slice(&child.to_le_bytes()));
            return;
        }
        let off = HEADER_SIZE + (i - 1) * self.internal_entry_size() + self.key_len;
        self.frame.write(|d| d[off..off + 4].copy_from_slice(&child.to_le_bytes()));
    }

    pub fn internal_key(&self, i: usize) -> Vec<u8> {
        let off = HEADER_SIZE + i * self.internal_entry_size();
        let len = self.key_len;
        self.frame.read(|d| d[off..off + len].to_vec())
    }

    /// Index of the child to descend into for `key`: the last child
    /// whose separator key is `<= key`.
    pub fn internal_child_for(&self, key_type: KeyType, key: &[u8]) -> PageNum {
        let count = self.key_count();
        let mut child_idx = 0usize;
        for i in 0..count {
            if compare_keys(key_type, &self.internal_key(i), key) != Ordering::Greater {
                child_idx = i + 1;
            } else {
                break;
            }
        }
        self.internal_child(child_idx)
    }

    pub fn internal_insert_at(&self, i: usize, key: &[u8], child: PageNum) {
        let count = self.key_count();
        let size = self.internal_entry_size();
        let key_len = self.key_len;
        self.frame.write(|d| {
            let start = HEADER_SIZE + i * size;
            let tail_start = HEADER_SIZE + count * size;
            d.copy_within(start..tail_start, start + size);
            d[start..start + key_len].copy_from_slice(key);
            d[start + key_len..start + key_len + 4].copy_from_slice(&child.to_le_bytes());
        });
        self.set_key_count(count + 1);
    }

    /// Split this full internal node. The middle key is promoted (not
    /// copied) to the parent; returns `(promoted_key, new_page)`'s key.
    pub fn split_internal_into(&self, new_page: &NodePage) -> Vec<u8> {
        let count = self.key_count();
        let mid = count / 2;
        let promoted = self.internal_key(mid);

        new_page.set_internal_child(0, self.internal_child(mid + 1));
        for i in (mid + 1)..count {
            let key = self.internal_key(i);
            let child = self.internal_child(i + 1);
            new_page.internal_insert_at(new_page.key_count(), &key, child);
        }
        // entries beyond `mid` now live in `new_page`; just truncate.
        self.set_key_count(mid);
        promoted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::pool::BufferPool;
    use tempfile::tempdir;

    fn fresh_leaf(key_len: usize) -> (tempfile::TempDir, BufferPool, NodePage) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("idx.data");
        let pool = BufferPool::new(8, 4096, 8);
        pool.create_file(&path).unwrap();
        let fid = pool.open_file(&path).unwrap();
        let frame = pool.allocate_page(fid).unwrap();
        let node = NodePage::init_leaf(frame, key_len, 0);
        (dir, pool, node)
    }

    #[test]
    fn leaf_insert_keeps_sorted_order() {
        let (_dir, _pool, node) = fresh_leaf(4);
        node.leaf_insert_at(0, &3i32.to_le_bytes(), Rid::new(2, 0));
        node.leaf_insert_at(0, &1i32.to_le_bytes(), Rid::new(2, 1));
        node.leaf_insert_at(1, &2i32.to_le_bytes(), Rid::new(2, 2));

        assert_eq!(node.key_count(), 3);
        assert_eq!(i32::from_le_bytes(node.leaf_key(0).try_into().unwrap()), 1);
        assert_eq!(i32::from_le_bytes(node.leaf_key(1).try_into().unwrap()), 2);
        assert_eq!(i32::from_le_bytes(node.leaf_key(2).try_into().unwrap()), 3);
    }

    #[test]
    fn leaf_search_finds_insertion_point() {
        let (_dir, _pool, node) = fresh_leaf(4);
        node.leaf_insert_at(0, &1i32.to_le_bytes(), Rid::new(2, 0));
        node.leaf_insert_at(1, &3i32.to_le_bytes(), Rid::new(2, 1));

        assert_eq!(node.leaf_search(KeyType::Int, &1i32.to_le_bytes()), Ok(0));
        assert_eq!(node.leaf_search(KeyType::Int, &2i32.to_le_bytes()), Err(1));
        assert_eq!(node.leaf_search(KeyType::Int, &4i32.to_le_bytes()), Err(2));
    }

    #[test]
    fn leaf_remove_shifts_tail() {
        let (_dir, _pool, node) = fresh_leaf(4);
        node.leaf_insert_at(0, &1i32.to_le_bytes(), Rid::new(2, 0));
        node.leaf_insert_at(1, &2i32.to_le_bytes(), Rid::new(2, 1));
        node.leaf_remove_at(0);
        assert_eq!(node.key_count(), 1);
        assert_eq!(i32::from_le_bytes(node.leaf_key(0).try_into().unwrap()), 2);
    }

    #[test]
    fn leaf_equal_range_finds_contiguous_duplicates() {
        let (_dir, _pool, node) = fresh_leaf(4);
        node.leaf_insert_at(0, &1i32.to_le_bytes(), Rid::new(2, 0));
        node.leaf_insert_at(1, &2i32.to_le_bytes(), Rid::new(2, 1));
        node.leaf_insert_at(2, &2i32.to_le_bytes(), Rid::new(2, 2));
        node.leaf_insert_at(3, &2i32.to_le_bytes(), Rid::new(2, 3));
        node.leaf_insert_at(4, &3i32.to_le_bytes(), Rid::new(2, 4));

        assert_eq!(node.leaf_equal_range(KeyType::Int, &2i32.to_le_bytes()), (1, 4));
        assert_eq!(node.leaf_equal_range(KeyType::Int, &1i32.to_le_bytes()), (0, 1));
        assert_eq!(node.leaf_equal_range(KeyType::Int, &9i32.to_le_bytes()), (5, 5));
    }

    #[test]
    fn prev_leaf_defaults_to_zero_and_is_settable() {
        let (_dir, _pool, node) = fresh_leaf(4);
        assert_eq!(node.prev_leaf(), 0);
        node.set_prev_leaf(42);
        assert_eq!(node.prev_leaf(), 42);
    }
}
