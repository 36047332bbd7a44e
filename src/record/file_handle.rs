//! Per-table record file: owns one paged file through the shared buffer
//! pool and places/finds/removes fixed-size records in it (spec §4.2),
//! grounded in `original_source/src/observer/storage/common/record_manager.h`'s
//! `RecordFileHandler`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::buffer::file::FIRST_DATA_PAGE;
use crate::buffer::pool::BufferPool;
use crate::error::{DbError, DbResult};
use crate::record::page::RecordPageHandle;
use crate::types::{FileId, PageNum, SlotNum};

/// A record's physical location: a page number and a slot within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_num: PageNum,
    pub slot_num: SlotNum,
}

impl Rid {
    pub fn new(page_num: PageNum, slot_num: SlotNum) -> Self {
        Self { page_num, slot_num }
    }
}

pub struct RecordFileHandler {
    pool: Arc<BufferPool>,
    file_id: FileId,
    record_size: usize,
    /// Last page known to have free slots, to avoid rescanning from the
    /// front of the file on every insert.
    insert_hint: Mutex<PageNum>,
}

impl RecordFileHandler {
    pub fn create(pool: Arc<BufferPool>, path: &Path, record_size: usize) -> DbResult<Self> {
        pool.create_file(path)?;
        Self::open(pool, path, record_size)
    }

    pub fn open(pool: Arc<BufferPool>, path: &Path, record_size: usize) -> DbResult<Self> {
        let file_id = pool.open_file(path)?;
        Ok(Self {
            pool,
            file_id,
            record_size,
            insert_hint: Mutex::new(FIRST_DATA_PAGE),
        })
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    pub fn close(&self) -> DbResult<()> {
        self.pool.close_file(self.file_id)
    }

    fn load_page(&self, page_num: PageNum) -> DbResult<RecordPageHandle> {
        let frame = self.pool.get_this_page(self.file_id, page_num)?;
        Ok(RecordPageHandle::from_pinned(frame))
    }

    fn release(&self, page: RecordPageHandle) -> DbResult<()> {
        self.pool.unpin_page(page.into_frame())
    }

    /// Insert `data` into the first page with a free slot, allocating a
    /// fresh page if every existing page is full.
    pub fn insert_record(&self, data: &[u8]) -> DbResult<Rid> {
        if data.len() != self.record_size {
            return Err(DbError::InvalidArgument(format!(
                "record is {} bytes, expected {}",
                data.len(),
                self.record_size
            )));
        }

        let hint = *self.insert_hint.lock().unwrap();
        let page_count = self.pool.get_page_count(self.file_id)?;

        let mut candidate = hint.max(FIRST_DATA_PAGE);
        while candidate <= page_count {
            // A disposed page number is simply absent from the file until
            // reallocated; skip over it rather than treat it as an error.
            let page = match self.load_page(candidate) {
                Ok(page) => page,
                Err(DbError::InvalidPageNum(_)) => {
                    candidate += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !page.is_full() {
                let slot = page.insert(data)?;
                *self.insert_hint.lock().unwrap() = candidate;
                self.release(page)?;
                return Ok(Rid::new(candidate, slot));
            }
            self.release(page)?;
            candidate += 1;
        }

        let frame = self.pool.allocate_page(self.file_id)?;
        let page_num = frame.page_num();
        let page_size = self.pool.page_size();
        let page = RecordPageHandle::init_empty(frame, self.record_size, page_size);
        let slot = page.insert(data)?;
        *self.insert_hint.lock().unwrap() = page_num;
        self.release(page)?;
        Ok(Rid::new(page_num, slot))
    }

    pub fn get_record(&self, rid: Rid) -> DbResult<Vec<u8>> {
        let page = self.load_page(rid.page_num)?;
        let result = page.get(rid.slot_num);
        self.release(page)?;
        result
    }

    pub fn update_record(&self, rid: Rid, data: &[u8]) -> DbResult<()> {
        if data.len() != self.record_size {
            return Err(DbError::InvalidArgument(format!(
                "record is {} bytes, expected {}",
                data.len(),
                self.record_size
            )));
        }
        let page = self.load_page(rid.page_num)?;
        let result = page.update(rid.slot_num, data);
        self.release(page)?;
        result
    }

    pub fn update_record_in_place(&self, rid: Rid, updater: impl FnOnce(&mut [u8])) -> DbResult<()> {
        let page = self.load_page(rid.page_num)?;
        let result = page.update_in_place(rid.slot_num, updater);
        self.release(page)?;
        result
    }

    /// Delete the record at `rid`. A page left empty by the deletion is
    /// disposed outright, matching this port's "free cleanly" choice for
    /// reclaiming dead space (the original leaves emptied pages in place).
    pub fn delete_record(&self, rid: Rid) -> DbResult<()> {
        let page = self.load_page(rid.page_num)?;
        let became_empty = page.delete(rid.slot_num)?;
        self.release(page)?;
        if became_empty {
            self.pool.dispose_page(self.file_id, rid.page_num)?;
            let mut hint = self.insert_hint.lock().unwrap();
            if *hint == rid.page_num {
                *hint = FIRST_DATA_PAGE;
            }
        }
        Ok(())
    }

    pub fn with_record_page<R>(
        &self,
        page_num: PageNum,
        f: impl FnOnce(&RecordPageHandle) -> DbResult<R>,
    ) -> DbResult<R> {
        let page = self.load_page(page_num)?;
        let result = f(&page);
        self.release(page)?;
        result
    }

    pub fn page_count(&self) -> DbResult<PageNum> {
        self.pool.get_page_count(self.file_id)
    }
}
