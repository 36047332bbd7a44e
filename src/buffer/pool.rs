//! The buffer pool: a fixed number of frames over up to `MAX_OPEN_FILES`
//! paged files (spec §4.1), grounded in
//! `original_source/src/observer/storage/default/disk_buffer_pool.h`'s
//! `DiskBufferPool` / `BPManager`.
//!
//! The teacher's own buffer-pool modules (`small-db-small-db/src/bufferpool.rs`,
//! `src/btree/buffer_pool.rs`, `src/btree/page_cache.rs`) cache every
//! page forever in an unbounded `HashMap` — there is no fixed frame
//! count and no eviction. This module keeps the teacher's "guarded by
//! one mutex on the frame table" shape (spec §5) but gives that mutex
//! real bookkeeping to protect: a fixed frame array, a free list, and
//! an LRU replacer over unpinned frames.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use crate::buffer::file::PagedFile;
use crate::buffer::frame::Frame;
use crate::buffer::replacer::LruReplacer;
use crate::error::{DbError, DbResult};
use crate::types::{FileId, PageNum};
use crate::util::HandyRwLock;

/// A pinned handle to one cached page. Holding a `FrameHandle` keeps the
/// frame pinned against eviction; `BufferPool::unpin_page` must be
/// called exactly once per successful `get_this_page` / `allocate_page`.
#[derive(Clone)]
pub struct FrameHandle {
    pub(crate) frame: Arc<RwLock<Frame>>,
}

impl FrameHandle {
    pub fn file_id(&self) -> FileId {
        self.frame.rl().file_id
    }

    pub fn page_num(&self) -> PageNum {
        self.frame.rl().page_num
    }

    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.frame.rl().data)
    }

    /// Mutate the page's bytes and mark the frame dirty in one step.
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.frame.wl();
        let r = f(&mut guard.data);
        guard.dirty = true;
        r
    }
}

struct OpenFile {
    paged_file: PagedFile,
    path: PathBuf,
}

struct Inner {
    page_size: usize,
    frames: Vec<Arc<RwLock<Frame>>>,
    free_list: Vec<usize>,
    page_table: HashMap<(FileId, PageNum), usize>,
    replacer: LruReplacer,
    open_files: HashMap<FileId, OpenFile>,
    path_to_id: HashMap<PathBuf, FileId>,
    free_file_ids: Vec<FileId>,
}

pub struct BufferPool {
    inner: Mutex<Inner>,
}

impl BufferPool {
    pub fn new(num_frames: usize, page_size: usize, max_open_files: usize) -> Self {
        let frames = (0..num_frames)
            .map(|i| Arc::new(RwLock::new(Frame::new(i, page_size))))
            .collect::<Vec<_>>();
        let free_list = (0..num_frames).collect();
        let free_file_ids = (0..max_open_files as FileId).collect();

        Self {
            inner: Mutex::new(Inner {
                page_size,
                frames,
                free_list,
                page_table: HashMap::new(),
                replacer: LruReplacer::new(num_frames),
                open_files: HashMap::new(),
                path_to_id: HashMap::new(),
                free_file_ids,
            }),
        }
    }

    pub fn create_file(&self, path: &Path) -> DbResult<()> {
        PagedFile::create(path, self.page_size())?;
        Ok(())
    }

    pub fn page_size(&self) -> usize {
        self.inner.lock().unwrap().page_size
    }

    pub fn open_file(&self, path: &Path) -> DbResult<FileId> {
        let mut inner = self.inner.lock().unwrap();
        let canon = path.to_path_buf();
        if let Some(&id) = inner.path_to_id.get(&canon) {
            return Ok(id);
        }
        let file_id = inner
            .free_file_ids
            .pop()
            .ok_or_else(|| DbError::InvalidArgument("too many open files".to_string()))?;
        let page_size = inner.page_size;
        let paged_file = match PagedFile::open(path, page_size) {
            Ok(pf) => pf,
            Err(e) => {
                inner.free_file_ids.push(file_id);
                return Err(e);
            }
        };
        inner.open_files.insert(
            file_id,
            OpenFile {
                paged_file,
                path: canon.clone(),
            },
        );
        inner.path_to_id.insert(canon, file_id);
        Ok(file_id)
    }

    pub fn close_file(&self, file_id: FileId) -> DbResult<()> {
        self.flush_all_pages(file_id)?;
        let mut inner = self.inner.lock().unwrap();
        let keys: Vec<(FileId, PageNum)> = inner
            .page_table
            .keys()
            .filter(|(f, _)| *f == file_id)
            .cloned()
            .collect();
        for key in keys {
            let idx = inner.page_table.remove(&key).unwrap();
            inner.replacer.pin(idx);
            inner.free_list.push(idx);
        }
        if let Some(of) = inner.open_files.remove(&file_id) {
            inner.path_to_id.remove(&of.path);
        }
        inner.free_file_ids.push(file_id);
        Ok(())
    }

    pub fn drop_file(&self, path: &Path) -> DbResult<()> {
        let existing_id = {
            let inner = self.inner.lock().unwrap();
            inner.path_to_id.get(path).copied()
        };
        if let Some(id) = existing_id {
            self.close_file(id)?;
        }
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn with_open_file<R>(
        &self,
        inner: &mut Inner,
        file_id: FileId,
        f: impl FnOnce(&mut PagedFile) -> DbResult<R>,
    ) -> DbResult<R> {
        let of = inner
            .open_files
            .get_mut(&file_id)
            .ok_or(DbError::BufferPoolClosed)?;
        f(&mut of.paged_file)
    }

    /// Find a victim frame index: prefer a free slot, otherwise ask the
    /// replacer for the LRU unpinned frame and flush it if dirty.
    fn acquire_victim(&self, inner: &mut Inner) -> DbResult<usize> {
        if let Some(idx) = inner.free_list.pop() {
            return Ok(idx);
        }
        let idx = inner.replacer.victim().ok_or(DbError::FrameNoMem)?;
        let (old_key, dirty) = {
            let frame = inner.frames[idx].rl();
            ((frame.file_id, frame.page_num), frame.dirty)
        };
        if dirty {
            let (file_id, page_num) = old_key;
            let data = inner.frames[idx].rl().data.clone();
            self.with_open_file(inner, file_id, |pf| pf.write_page(page_num, &data))?;
        }
        inner.page_table.remove(&old_key);
        Ok(idx)
    }

    pub fn get_this_page(&self, file_id: FileId, page_num: PageNum) -> DbResult<FrameHandle> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&idx) = inner.page_table.get(&(file_id, page_num)) {
            let frame = inner.frames[idx].clone();
            {
                let mut f = frame.wl();
                if f.pin_count == 0 {
                    inner.replacer.pin(idx);
                }
                f.pin_count += 1;
            }
            return Ok(FrameHandle { frame });
        }

        let idx = self.acquire_victim(&mut inner)?;
        let data = self.with_open_file(&mut inner, file_id, |pf| pf.read_page(page_num))?;

        {
            let mut f = inner.frames[idx].wl();
            f.reset(file_id, page_num, data);
            f.pin_count = 1;
        }
        inner.page_table.insert((file_id, page_num), idx);
        debug!("loaded page ({}, {}) into frame {}", file_id, page_num, idx);
        Ok(FrameHandle {
            frame: inner.frames[idx].clone(),
        })
    }

    pub fn allocate_page(&self, file_id: FileId) -> DbResult<FrameHandle> {
        let mut inner = self.inner.lock().unwrap();
        let idx = self.acquire_victim(&mut inner)?;
        let page_num = match self.with_open_file(&mut inner, file_id, |pf| pf.allocate_page()) {
            Ok(n) => n,
            Err(e) => {
                inner.free_list.push(idx);
                return Err(e);
            }
        };
        let page_size = inner.page_size;
        {
            let mut f = inner.frames[idx].wl();
            f.reset(file_id, page_num, vec![0u8; page_size]);
            f.pin_count = 1;
        }
        inner.page_table.insert((file_id, page_num), idx);
        Ok(FrameHandle {
            frame: inner.frames[idx].clone(),
        })
    }

    pub fn dispose_page(&self, file_id: FileId, page_num: PageNum) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(idx) = inner.page_table.remove(&(file_id, page_num)) {
            inner.replacer.pin(idx);
            inner.free_list.push(idx);
        }
        self.with_open_file(&mut inner, file_id, |pf| pf.dispose_page(page_num))
    }

    pub fn mark_dirty(&self, handle: &FrameHandle) {
        handle.frame.wl().dirty = true;
    }

    pub fn unpin_page(&self, handle: FrameHandle) -> DbResult<()> {
        let idx = {
            let mut f = handle.frame.wl();
            if f.pin_count == 0 {
                return Err(DbError::InvalidArgument(
                    "unpin of a frame with zero pin count".to_string(),
                ));
            }
            f.pin_count -= 1;
            f.idx
        };
        if handle.frame.rl().pin_count == 0 {
            let mut inner = self.inner.lock().unwrap();
            inner.replacer.unpin(idx);
        }
        Ok(())
    }

    pub fn flush_all_pages(&self, file_id: FileId) -> DbResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let entries: Vec<(PageNum, usize)> = inner
            .page_table
            .iter()
            .filter(|((f, _), _)| *f == file_id)
            .map(|((_, p), &idx)| (*p, idx))
            .collect();

        for (page_num, idx) in entries {
            let (dirty, data) = {
                let mut f = inner.frames[idx].wl();
                let dirty = f.dirty;
                let data = f.data.clone();
                f.dirty = false;
                (dirty, data)
            };
            if dirty {
                self.with_open_file(&mut inner, file_id, |pf| pf.write_page(page_num, &data))?;
            }
        }
        self.with_open_file(&mut inner, file_id, |pf| pf.sync())
    }

    pub fn get_page_count(&self, file_id: FileId) -> DbResult<u32> {
        let mut inner = self.inner.lock().unwrap();
        self.with_open_file(&mut inner, file_id, |pf| Ok(pf.page_count()))
    }
}

/// Test-only read/write accessors used by property tests that need to
/// peek at frame pin counts directly.
#[cfg(test)]
impl BufferPool {
    pub(crate) fn frame_pin_count(&self, handle: &FrameHandle) -> u32 {
        handle.frame.rl().pin_count
    }

    pub(crate) fn evictable_count(&self) -> usize {
        self.inner.lock().unwrap().replacer.size()
    }
}
