//! Disk-resident B+Tree secondary index (spec §4.3), grounded in
//! `original_source/src/observer/storage/common/bplus_tree_index.h`.
//! Single-writer, no latch coupling (spec §4.3, "Concurrency").

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use crate::buffer::file::FIRST_DATA_PAGE;
use crate::buffer::pool::BufferPool;
use crate::btree::key::{compare_keys, KeyType};
use crate::btree::node::NodePage;
use crate::error::{DbError, DbResult};
use crate::record::file_handle::Rid;
use crate::types::{FileId, PageNum};

/// Root-pointer page: a dedicated page (spec's `root_pointer_page`
/// concept, kept from the teacher's `src/btree/page/root_pointer_page.rs`)
/// holding only the current root node's page number, so root splits
/// don't change the file's well-known entry point.
const ROOT_POINTER_PAGE: PageNum = FIRST_DATA_PAGE;

pub struct BTree {
    pool: Arc<BufferPool>,
    file_id: FileId,
    key_type: KeyType,
    key_len: usize,
    pub unique: bool,
}

impl BTree {
    pub fn create(
        pool: Arc<BufferPool>,
        path: &Path,
        key_type: KeyType,
        key_len: usize,
        unique: bool,
    ) -> DbResult<Self> {
        pool.create_file(path)?;
        let file_id = pool.open_file(path)?;

        let root_ptr_frame = pool.allocate_page(file_id)?;
        debug_assert_eq!(root_ptr_frame.page_num(), ROOT_POINTER_PAGE);

        let root_frame = pool.allocate_page(file_id)?;
        let root_page_num = root_frame.page_num();
        let root = NodePage::init_leaf(root_frame, key_len, 0);
        pool.unpin_page(root.into_frame())?;

        root_ptr_frame.write(|d| d[0..4].copy_from_slice(&root_page_num.to_le_bytes()));
        pool.unpin_page(root_ptr_frame)?;

        Ok(Self {
            pool,
            file_id,
            key_type,
            key_len,
            unique,
        })
    }

    pub fn open(pool: Arc<BufferPool>, path: &Path, key_type: KeyType, key_len: usize, unique: bool) -> DbResult<Self> {
        let file_id = pool.open_file(path)?;
        Ok(Self {
            pool,
            file_id,
            key_type,
            key_len,
            unique,
        })
    }

    pub fn close(&self) -> DbResult<()> {
        self.pool.close_file(self.file_id)
    }

    pub fn sync(&self) -> DbResult<()> {
        self.pool.flush_all_pages(self.file_id)
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    fn root_page_num(&self) -> DbResult<PageNum> {
        let frame = self.pool.get_this_page(self.file_id, ROOT_POINTER_PAGE)?;
        let n = frame.read(|d| u32::from_le_bytes(d[0..4].try_into().unwrap()));
        self.pool.unpin_page(frame)?;
        Ok(n)
    }

    fn set_root_page_num(&self, page_num: PageNum) -> DbResult<()> {
        let frame = self.pool.get_this_page(self.file_id, ROOT_POINTER_PAGE)?;
        frame.write(|d| d[0..4].copy_from_slice(&page_num.to_le_bytes()));
        self.pool.unpin_page(frame)?;
        Ok(())
    }

    fn load(&self, page_num: PageNum) -> DbResult<NodePage> {
        let frame = self.pool.get_this_page(self.file_id, page_num)?;
        Ok(NodePage::from_pinned(frame, self.key_len))
    }

    fn release(&self, node: NodePage) -> DbResult<()> {
        self.pool.unpin_page(node.into_frame())
    }

    /// Descend to the leaf that would contain `key`.
    fn find_leaf(&self, key: &[u8]) -> DbResult<NodePage> {
        let mut page_num = self.root_page_num()?;
        loop {
            let node = self.load(page_num)?;
            if node.is_leaf() {
                return Ok(node);
            }
            let next = node.internal_child_for(self.key_type, key);
            self.release(node)?;
            page_num = next;
        }
    }

    /// Leftmost leaf in the tree, the starting point for an unbounded
    /// ascending scan.
    fn leftmost_leaf(&self) -> DbResult<NodePage> {
        let mut page_num = self.root_page_num()?;
        loop {
            let node = self.load(page_num)?;
            if node.is_leaf() {
                return Ok(node);
            }
            let next = node.internal_child(0);
            self.release(node)?;
            page_num = next;
        }
    }

    pub fn contains_key(&self, key: &[u8]) -> DbResult<bool> {
        let node = self.find_leaf(key)?;
        let found = node.leaf_search(self.key_type, key).is_ok();
        self.release(node)?;
        Ok(found)
    }

    /// Insert `(key, rid)`. Rejects a duplicate key outright on a
    /// unique index (spec §4.3: "probe equality first; on hit return
    /// `RECORD_DUPLICATE_KEY`").
    pub fn insert_entry(&self, key: &[u8], rid: Rid) -> DbResult<()> {
        if self.unique && self.contains_key(key)? {
            return Err(DbError::DuplicateKey);
        }
        let root = self.root_page_num()?;
        if let Some((sep_key, new_child)) = self.insert_into(root, key, rid)? {
            let new_root_frame = self.pool.allocate_page(self.file_id)?;
            let new_root_num = new_root_frame.page_num();
            let new_root = NodePage::init_internal(new_root_frame, self.key_len, root);
            new_root.internal_insert_at(0, &sep_key, new_child);
            self.release(new_root)?;
            self.set_root_page_num(new_root_num)?;
        }
        Ok(())
    }

    fn insert_into(&self, page_num: PageNum, key: &[u8], rid: Rid) -> DbResult<Option<(Vec<u8>, PageNum)>> {
        let node = self.load(page_num)?;
        let page_size = self.pool.page_size();

        if node.is_leaf() {
            let pos = match node.leaf_search(self.key_type, key) {
                Ok(i) | Err(i) => i,
            };
            node.leaf_insert_at(pos, key, rid);

            if node.key_count() > NodePage::leaf_capacity(page_size, self.key_len) {
                let old_next = node.next_leaf();
                let new_frame = self.pool.allocate_page(self.file_id)?;
                let new_page = NodePage::init_leaf(new_frame, self.key_len, old_next);
                new_page.set_prev_leaf(node.page_num());
                let sep = node.split_leaf_into(&new_page);
                node.set_next_leaf(new_page.page_num());
                let new_page_num = new_page.page_num();
                if old_next != 0 {
                    let old_next_node = self.load(old_next)?;
                    old_next_node.set_prev_leaf(new_page_num);
                    self.release(old_next_node)?;
                }
                self.release(new_page)?;
                self.release(node)?;
                return Ok(Some((sep, new_page_num)));
            }
            self.release(node)?;
            return Ok(None);
        }

        let child = node.internal_child_for(self.key_type, key);
        let split = self.insert_into(child, key, rid)?;
        match split {
            None => {
                self.release(node)?;
                Ok(None)
            }
            Some((sep_key, new_child)) => {
                let count = node.key_count();
                let mut pos = count;
                for i in 0..count {
                    if compare_keys(self.key_type, &node.internal_key(i), &sep_key) == Ordering::Greater {
                        pos = i;
                        break;
                    }
                }
                node.internal_insert_at(pos, &sep_key, new_child);

                if node.key_count() > NodePage::internal_capacity(page_size, self.key_len) {
                    let new_frame = self.pool.allocate_page(self.file_id)?;
                    let new_internal = NodePage::init_internal(new_frame, self.key_len, 0);
                    let promoted = node.split_internal_into(&new_internal);
                    let new_page_num = new_internal.page_num();
                    self.release(new_internal)?;
                    self.release(node)?;
                    return Ok(Some((promoted, new_page_num)));
                }
                self.release(node)?;
                Ok(None)
            }
        }
    }

    /// Remove the `(key, rid)` entry. No merge/rebalance on delete — an
    /// accepted simplification for this port (the original also never
    /// frees emptied internal capacity back to a shared pool).
    ///
    /// A run of duplicate keys long enough to force repeated leaf splits
    /// always has its separator equal the duplicated key, and
    /// `internal_child_for` routes `sep <= key` to the right child — so
    /// `find_leaf` always lands on the right-most leaf of the run, never
    /// an earlier one a previous split left behind. Duplicates aren't
    /// just adjacent within one leaf; they can span several. Once the
    /// landing leaf's own matches are exhausted, walk left via
    /// `prev_leaf` through every leaf still inside the run.
    pub fn delete_entry(&self, key: &[u8], rid: Rid) -> DbResult<()> {
        let mut node = self.find_leaf(key)?;
        loop {
            let (lo, hi) = node.leaf_equal_range(self.key_type, key);
            for i in lo..hi {
                if node.leaf_rid(i) == rid {
                    node.leaf_remove_at(i);
                    self.release(node)?;
                    return Ok(());
                }
            }
            if lo != 0 || hi == 0 {
                self.release(node)?;
                return Err(DbError::InvalidKey);
            }
            let prev = node.prev_leaf();
            self.release(node)?;
            if prev == 0 {
                return Err(DbError::InvalidKey);
            }
            node = self.load(prev)?;
        }
    }

    pub(crate) fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    pub(crate) fn file_id(&self) -> FileId {
        self.file_id
    }

    pub(crate) fn key_len(&self) -> usize {
        self.key_len
    }

    /// Leaf/position an `Eq`/`Ge`/`Gt` scan should start from. `find_leaf`
    /// always lands on the right-most leaf of a duplicate-key run (see
    /// `delete_entry`), which would make an index scan skip every
    /// matching entry an earlier split left in a leaf to the left. Walk
    /// back through `prev_leaf` while the run of equal keys still
    /// reaches this leaf's first slot, so the scan starts at the true
    /// beginning of the run instead.
    pub(crate) fn start_leaf_for(&self, key: &[u8]) -> DbResult<(NodePage, usize)> {
        let mut node = self.find_leaf(key)?;
        let mut pos = match node.leaf_search(self.key_type, key) {
            Ok(i) | Err(i) => i,
        };
        loop {
            if pos != 0 || node.key_count() == 0 {
                break;
            }
            if compare_keys(self.key_type, &node.leaf_key(0), key) != Ordering::Equal {
                break;
            }
            let prev = node.prev_leaf();
            if prev == 0 {
                break;
            }
            let prev_node = self.load(prev)?;
            let continues = prev_node.key_count() > 0
                && compare_keys(self.key_type, &prev_node.leaf_key(prev_node.key_count() - 1), key) == Ordering::Equal;
            if !continues {
                self.release(prev_node)?;
                break;
            }
            self.release(node)?;
            node = prev_node;
            pos = match node.leaf_search(self.key_type, key) {
                Ok(i) | Err(i) => i,
            };
        }
        Ok((node, pos))
    }

    pub(crate) fn leftmost(&self) -> DbResult<NodePage> {
        self.leftmost_leaf()
    }

    pub(crate) fn load_page(&self, page_num: PageNum) -> DbResult<NodePage> {
        self.load(page_num)
    }

    pub(crate) fn unpin(&self, node: NodePage) -> DbResult<()> {
        self.release(node)
    }
}
