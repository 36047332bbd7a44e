//! Slotted data page layout (spec §3, §4.2), grounded in
//! `original_source/src/observer/storage/common/record_manager.cpp`'s
//! `PageHeader` / `Bitmap` handling.
//!
//! Header layout (little-endian): `record_count`, `record_capacity`,
//! `record_real_size`, `record_size_aligned`, `first_record_offset`,
//! each a `u32`, followed by a per-slot occupancy bitmap, then the
//! aligned slot array.

use bit_vec::BitVec;

use crate::buffer::pool::FrameHandle;
use crate::error::{DbError, DbResult};
use crate::types::SlotNum;
use crate::util::align8;

pub const HEADER_FIXED_SIZE: usize = 20;

#[derive(Clone, Copy, Debug)]
pub struct RecordPageHeader {
    pub record_count: u32,
    pub record_capacity: u32,
    pub record_real_size: u32,
    pub record_size_aligned: u32,
    pub first_record_offset: u32,
}

impl RecordPageHeader {
    fn read(buf: &[u8]) -> Self {
        Self {
            record_count: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            record_capacity: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            record_real_size: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            record_size_aligned: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            first_record_offset: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
        }
    }

    fn write(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.record_count.to_le_bytes());
        buf[4..8].copy_from_slice(&self.record_capacity.to_le_bytes());
        buf[8..12].copy_from_slice(&self.record_real_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.record_size_aligned.to_le_bytes());
        buf[16..20].copy_from_slice(&self.first_record_offset.to_le_bytes());
    }
}

/// Number of records of `record_size_aligned` bytes that fit in one page
/// alongside the fixed header and a bit per slot (spec §3: "Slot count
/// is derived so that header + bitmap + capacity × slot_size ≤
/// page_size").
pub fn record_capacity_for(page_size: usize, record_size_aligned: usize) -> usize {
    let mut cap = 0usize;
    loop {
        let bitmap_bytes = crate::util::bytes_for_bits(cap + 1);
        let used = align8(HEADER_FIXED_SIZE + bitmap_bytes) + (cap + 1) * record_size_aligned;
        if used > page_size {
            break;
        }
        cap += 1;
    }
    cap
}

fn first_record_offset(record_capacity: usize) -> usize {
    align8(HEADER_FIXED_SIZE + crate::util::bytes_for_bits(record_capacity))
}

/// A handle over one pinned slotted data page.
pub struct RecordPageHandle {
    frame: FrameHandle,
}

impl RecordPageHandle {
    pub fn from_pinned(frame: FrameHandle) -> Self {
        Self { frame }
    }

    pub fn into_frame(self) -> FrameHandle {
        self.frame
    }

    pub fn page_num(&self) -> u32 {
        self.frame.page_num()
    }

    /// Initialize a freshly allocated page as an empty slotted page for
    /// records of `record_real_size` bytes.
    pub fn init_empty(frame: FrameHandle, record_real_size: usize, page_size: usize) -> Self {
        let record_size_aligned = align8(record_real_size).max(8);
        let capacity = record_capacity_for(page_size, record_size_aligned);
        let header = RecordPageHeader {
            record_count: 0,
            record_capacity: capacity as u32,
            record_real_size: record_real_size as u32,
            record_size_aligned: record_size_aligned as u32,
            first_record_offset: first_record_offset(capacity) as u32,
        };
        frame.write(|data| header.write(&mut data[0..HEADER_FIXED_SIZE]));
        Self { frame }
    }

    fn header(&self) -> RecordPageHeader {
        self.frame.read(|data| RecordPageHeader::read(&data[0..HEADER_FIXED_SIZE]))
    }

    fn bitmap(&self) -> (RecordPageHeader, BitVec) {
        let header = self.header();
        let bitmap_bytes = crate::util::bytes_for_bits(header.record_capacity as usize);
        let bytes = self
            .frame
            .read(|data| data[HEADER_FIXED_SIZE..HEADER_FIXED_SIZE + bitmap_bytes].to_vec());
        (header, BitVec::from_bytes(&bytes))
    }

    fn write_bitmap(&self, bitmap: &BitVec) {
        let bytes = bitmap.to_bytes();
        self.frame
            .write(|data| data[HEADER_FIXED_SIZE..HEADER_FIXED_SIZE + bytes.len()].copy_from_slice(&bytes));
    }

    fn slot_offset(header: &RecordPageHeader, slot: SlotNum) -> usize {
        header.first_record_offset as usize + slot as usize * header.record_size_aligned as usize
    }

    pub fn is_full(&self) -> bool {
        let header = self.header();
        header.record_count >= header.record_capacity
    }

    pub fn record_count(&self) -> u32 {
        self.header().record_count
    }

    pub fn capacity(&self) -> u32 {
        self.header().record_capacity
    }

    pub fn insert(&self, data: &[u8]) -> DbResult<SlotNum> {
        let (mut header, mut bitmap) = self.bitmap();
        if header.record_count >= header.record_capacity {
            return Err(DbError::RecordNoMem);
        }
        let slot = (0..bitmap.len())
            .find(|&i| !bitmap[i])
            .ok_or(DbError::RecordNoMem)? as SlotNum;
        bitmap.set(slot as usize, true);
        header.record_count += 1;

        let offset = Self::slot_offset(&header, slot);
        let real_size = header.record_real_size as usize;
        self.frame.write(|buf| {
            header.write(&mut buf[0..HEADER_FIXED_SIZE]);
            buf[offset..offset + real_size].copy_from_slice(data);
        });
        self.write_bitmap(&bitmap);
        Ok(slot)
    }

    pub fn update(&self, slot: SlotNum, data: &[u8]) -> DbResult<()> {
        let (header, bitmap) = self.bitmap();
        if slot >= header.record_capacity || !bitmap[slot as usize] {
            return Err(DbError::RecordNotExist);
        }
        let offset = Self::slot_offset(&header, slot);
        let real_size = header.record_real_size as usize;
        self.frame
            .write(|buf| buf[offset..offset + real_size].copy_from_slice(data));
        Ok(())
    }

    /// Apply `updater` to the record's bytes in place.
    pub fn update_in_place(&self, slot: SlotNum, updater: impl FnOnce(&mut [u8])) -> DbResult<()> {
        let (header, bitmap) = self.bitmap();
        if slot >= header.record_capacity || !bitmap[slot as usize] {
            return Err(DbError::RecordNotExist);
        }
        let offset = Self::slot_offset(&header, slot);
        let real_size = header.record_real_size as usize;
        self.frame
            .write(|buf| updater(&mut buf[offset..offset + real_size]));
        Ok(())
    }

    /// Clear the slot's bit. Returns `true` if the page is now empty.
    pub fn delete(&self, slot: SlotNum) -> DbResult<bool> {
        let (mut header, mut bitmap) = self.bitmap();
        if slot >= header.record_capacity || !bitmap[slot as usize] {
            return Err(DbError::RecordNotExist);
        }
        bitmap.set(slot as usize, false);
        header.record_count -= 1;
        self.frame
            .write(|buf| header.write(&mut buf[0..HEADER_FIXED_SIZE]));
        self.write_bitmap(&bitmap);
        Ok(header.record_count == 0)
    }

    pub fn get(&self, slot: SlotNum) -> DbResult<Vec<u8>> {
        let (header, bitmap) = self.bitmap();
        if slot >= header.record_capacity {
            return Err(DbError::InvalidRid);
        }
        if !bitmap[slot as usize] {
            return Err(DbError::RecordNotExist);
        }
        let offset = Self::slot_offset(&header, slot);
        let real_size = header.record_real_size as usize;
        Ok(self.frame.read(|buf| buf[offset..offset + real_size].to_vec()))
    }

    /// First occupied slot at or after `from`, scanning this page only.
    pub fn next_occupied(&self, from: SlotNum) -> Option<SlotNum> {
        let (header, bitmap) = self.bitmap();
        (from..header.record_capacity).find(|&i| bitmap[i as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::pool::BufferPool;
    use tempfile::tempdir;

    fn fresh_page(record_size: usize) -> (tempfile::TempDir, BufferPool, RecordPageHandle) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.data");
        let pool = BufferPool::new(8, 4096, 8);
        pool.create_file(&path).unwrap();
        let fid = pool.open_file(&path).unwrap();
        let frame = pool.allocate_page(fid).unwrap();
        let page = RecordPageHandle::init_empty(frame, record_size, 4096);
        (dir, pool, page)
    }

    #[test]
    fn insert_get_delete_roundtrip() {
        let (_dir, _pool, page) = fresh_page(16);
        let data = vec![9u8; 16];
        let slot = page.insert(&data).unwrap();
        assert_eq!(page.get(slot).unwrap(), data);
        assert_eq!(page.record_count(), 1);

        assert!(page.delete(slot).unwrap());
        assert!(page.get(slot).is_err());
    }

    #[test]
    fn capacity_respects_page_size() {
        let (_dir, _pool, page) = fresh_page(16);
        let cap = page.capacity();
        assert!(cap > 0);
        for i in 0..cap {
            page.insert(&vec![i as u8; 16]).unwrap();
        }
        assert!(page.is_full());
        assert!(page.insert(&[0u8; 16]).is_err());
    }

    #[test]
    fn next_occupied_skips_holes() {
        let (_dir, _pool, page) = fresh_page(8);
        let s0 = page.insert(&[1u8; 8]).unwrap();
        let s1 = page.insert(&[2u8; 8]).unwrap();
        let _s2 = page.insert(&[3u8; 8]).unwrap();
        page.delete(s1).unwrap();
        assert_eq!(page.next_occupied(0), Some(s0));
        assert_eq!(page.next_occupied(s0 + 1), Some(s0 + 2));
    }
}
