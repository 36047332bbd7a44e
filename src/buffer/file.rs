//! Raw paged-file I/O: a fixed-size header page (bitmap + counters)
//! followed by fixed-size data pages, exactly as spec §4.1 / §6
//! describe, grounded in `original_source/src/observer/storage/default/disk_buffer_pool.h`'s
//! `BPFileHandle` / `BPFileSubHeader`.
//!
//! Page numbers are 1-based: page 1 is always the header page (spec §3,
//! "Page 1 is the file's header page").

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bit_vec::BitVec;
use log::debug;

use crate::error::{DbError, DbResult};
use crate::types::PageNum;

/// First data page number; page 1 is reserved for the header.
pub const FIRST_DATA_PAGE: PageNum = 2;

pub struct PagedFile {
    path: PathBuf,
    file: File,
    page_size: usize,
    page_count: u32,
    allocated_pages: u32,
    bitmap: BitVec,
}

impl PagedFile {
    /// `page_count` here counts the header page, so a freshly created
    /// file has `page_count == 1`.
    pub fn create(path: &Path, page_size: usize) -> DbResult<Self> {
        if path.exists() {
            return Err(DbError::InvalidArgument(format!(
                "file already exists: {}",
                path.display()
            )));
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let max_pages = Self::bitmap_capacity(page_size);
        let mut bitmap = BitVec::from_elem(max_pages, false);
        bitmap.set(0, true); // the header page itself is "page 1" (index 0)

        let mut pf = Self {
            path: path.to_path_buf(),
            file,
            page_size,
            page_count: 1,
            allocated_pages: 1,
            bitmap,
        };
        pf.flush_header()?;
        debug!("created paged file {}", pf.path.display());
        Ok(pf)
    }

    pub fn open(path: &Path, page_size: usize) -> DbResult<Self> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;
        let mut header_buf = vec![0u8; page_size];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut header_buf)?;

        let page_count = u32::from_le_bytes(header_buf[0..4].try_into().unwrap());
        let allocated_pages = u32::from_le_bytes(header_buf[4..8].try_into().unwrap());
        let max_pages = Self::bitmap_capacity(page_size);
        let bitmap = BitVec::from_bytes(&header_buf[8..8 + crate::util::bytes_for_bits(max_pages)]);

        Ok(Self {
            path: path.to_path_buf(),
            file,
            page_size,
            page_count,
            allocated_pages,
            bitmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Max pages a single header page's bitmap can represent.
    fn bitmap_capacity(page_size: usize) -> usize {
        (page_size - 8) * 8
    }

    fn flush_header(&mut self) -> DbResult<()> {
        let mut buf = vec![0u8; self.page_size];
        buf[0..4].copy_from_slice(&self.page_count.to_le_bytes());
        buf[4..8].copy_from_slice(&self.allocated_pages.to_le_bytes());
        let bitmap_bytes = self.bitmap.to_bytes();
        buf[8..8 + bitmap_bytes.len()].copy_from_slice(&bitmap_bytes);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&buf)?;
        self.file.flush()?;
        Ok(())
    }

    fn bit_index(page_num: PageNum) -> usize {
        (page_num - 1) as usize
    }

    pub fn is_allocated(&self, page_num: PageNum) -> bool {
        let idx = Self::bit_index(page_num);
        idx < self.bitmap.len() && self.bitmap[idx]
    }

    fn check_page_num(&self, page_num: PageNum) -> DbResult<()> {
        if page_num == 0 || page_num > self.page_count || !self.is_allocated(page_num) {
            return Err(DbError::InvalidPageNum(page_num));
        }
        Ok(())
    }

    pub fn read_page(&mut self, page_num: PageNum) -> DbResult<Vec<u8>> {
        if page_num == 1 {
            let mut buf = vec![0u8; self.page_size];
            self.file.seek(SeekFrom::Start(0))?;
            self.file.read_exact(&mut buf)?;
            return Ok(buf);
        }
        self.check_page_num(page_num)?;
        let mut buf = vec![0u8; self.page_size];
        let offset = (page_num - 1) as u64 * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn write_page(&mut self, page_num: PageNum, data: &[u8]) -> DbResult<()> {
        debug_assert_eq!(data.len(), self.page_size);
        if page_num == 1 {
            self.file.seek(SeekFrom::Start(0))?;
            self.file.write_all(data)?;
            self.file.flush()?;
            return Ok(());
        }
        self.check_page_num(page_num)?;
        let offset = (page_num - 1) as u64 * self.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }

    /// Find the first unallocated page, set its bit, bump counters, and
    /// extend the backing file. Returns the new page's number.
    pub fn allocate_page(&mut self) -> DbResult<PageNum> {
        let free_idx = (0..self.bitmap.len()).find(|&i| !self.bitmap[i]);
        let idx = match free_idx {
            Some(i) => i,
            None => return Err(DbError::FrameNoMem),
        };
        self.bitmap.set(idx, true);
        self.allocated_pages += 1;
        let page_num = (idx + 1) as PageNum;
        if page_num > self.page_count {
            self.page_count = page_num;
        }

        let zeros = vec![0u8; self.page_size];
        self.write_page(page_num, &zeros)?;
        self.flush_header()?;
        debug!("allocated page {} in {}", page_num, self.path.display());
        Ok(page_num)
    }

    pub fn dispose_page(&mut self, page_num: PageNum) -> DbResult<()> {
        self.check_page_num(page_num)?;
        let idx = Self::bit_index(page_num);
        self.bitmap.set(idx, false);
        self.allocated_pages -= 1;
        self.flush_header()?;
        Ok(())
    }

    pub fn sync(&mut self) -> DbResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_and_allocate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.data");
        let mut pf = PagedFile::create(&path, 4096).unwrap();
        assert_eq!(pf.page_count(), 1);

        let p2 = pf.allocate_page().unwrap();
        assert_eq!(p2, 2);
        let p3 = pf.allocate_page().unwrap();
        assert_eq!(p3, 3);

        pf.write_page(p2, &vec![7u8; 4096]).unwrap();
        let read_back = pf.read_page(p2).unwrap();
        assert_eq!(read_back, vec![7u8; 4096]);

        pf.dispose_page(p2).unwrap();
        assert!(pf.read_page(p2).is_err());

        let p4 = pf.allocate_page().unwrap();
        assert_eq!(p4, 2, "disposed page number should be reused");
    }

    #[test]
    fn reopen_preserves_bitmap() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.data");
        {
            let mut pf = PagedFile::create(&path, 4096).unwrap();
            pf.allocate_page().unwrap();
            pf.allocate_page().unwrap();
        }
        let mut pf = PagedFile::open(&path, 4096).unwrap();
        assert_eq!(pf.page_count(), 3);
        assert!(pf.is_allocated(2));
        assert!(pf.is_allocated(3));
        assert!(pf.read_page(2).is_ok());
    }
}
