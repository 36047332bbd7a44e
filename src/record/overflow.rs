//! TEXT field inline/overflow encoding (spec §3, §9).
//!
//! Grounded in `original_source/src/observer/storage/common/record_manager.cpp`
//! (`get_text_data` / `update_text_data`, lines ~450-515) and
//! `table.cpp`'s insert path (lines ~1045-1053): a TEXT value stores its
//! first `INLINE_PREFIX_LEN` bytes inline next to a `u32` overflow page
//! number, with the remainder on a single dedicated overflow page.
//!
//! The original leaves a disposed overflow page's bytes in place and
//! re-zeroes in-line rather than truly freeing it (spec §9 calls this
//! out as a bug). This port resolves that Open Question by disposing
//! the overflow page outright on update/delete instead of replicating
//! the leak, per spec §9's stated preference ("dispose cleanly").

use crate::buffer::pool::BufferPool;
use crate::error::{DbError, DbResult};
use crate::types::FileId;

pub const INLINE_PREFIX_LEN: usize = 28;
pub const TEXT_INLINE_LEN: usize = 4 + INLINE_PREFIX_LEN;

fn max_text_len(page_size: usize) -> usize {
    INLINE_PREFIX_LEN + page_size
}

/// Encode `value` into a fresh `TEXT_INLINE_LEN`-byte inline region,
/// allocating an overflow page in `file_id` if the value doesn't fit in
/// the inline prefix.
pub fn encode_text(pool: &BufferPool, file_id: FileId, value: &[u8]) -> DbResult<[u8; TEXT_INLINE_LEN]> {
    let page_size = pool.page_size();
    if value.len() > max_text_len(page_size) {
        return Err(DbError::InvalidArgument(format!(
            "text value of {} bytes exceeds the {}-byte limit",
            value.len(),
            max_text_len(page_size)
        )));
    }

    let mut inline = [0u8; TEXT_INLINE_LEN];
    if value.len() <= INLINE_PREFIX_LEN {
        inline[4..4 + value.len()].copy_from_slice(value);
        return Ok(inline);
    }

    inline[4..4 + INLINE_PREFIX_LEN].copy_from_slice(&value[0..INLINE_PREFIX_LEN]);
    let tail = &value[INLINE_PREFIX_LEN..];
    let frame = pool.allocate_page(file_id)?;
    let page_num = frame.page_num();
    frame.write(|buf| buf[0..tail.len()].copy_from_slice(tail));
    pool.unpin_page(frame)?;

    inline[0..4].copy_from_slice(&page_num.to_le_bytes());
    Ok(inline)
}

/// Decode a previously encoded inline region back into the original bytes.
pub fn decode_text(pool: &BufferPool, file_id: FileId, inline: &[u8]) -> DbResult<Vec<u8>> {
    debug_assert_eq!(inline.len(), TEXT_INLINE_LEN);
    let page_num = u32::from_le_bytes(inline[0..4].try_into().unwrap());
    let prefix = &inline[4..4 + INLINE_PREFIX_LEN];

    if page_num == 0 {
        let end = prefix.iter().position(|&b| b == 0).unwrap_or(prefix.len());
        return Ok(prefix[..end].to_vec());
    }

    let frame = pool.get_this_page(file_id, page_num)?;
    let tail = frame.read(|buf| {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        buf[..end].to_vec()
    });
    pool.unpin_page(frame)?;

    let mut out = Vec::with_capacity(INLINE_PREFIX_LEN + tail.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(&tail);
    Ok(out)
}

/// Dispose of the overflow page referenced by `inline`, if any. Safe to
/// call on an inline region with no overflow page (a no-op).
pub fn dispose_text(pool: &BufferPool, file_id: FileId, inline: &[u8]) -> DbResult<()> {
    debug_assert_eq!(inline.len(), TEXT_INLINE_LEN);
    let page_num = u32::from_le_bytes(inline[0..4].try_into().unwrap());
    if page_num != 0 {
        pool.dispose_page(file_id, page_num)?;
    }
    Ok(())
}

/// Replace the value referenced by `old_inline` with `new_value`,
/// disposing the old overflow page (if any) before encoding the new one.
pub fn update_text(
    pool: &BufferPool,
    file_id: FileId,
    old_inline: &[u8],
    new_value: &[u8],
) -> DbResult<[u8; TEXT_INLINE_LEN]> {
    dispose_text(pool, file_id, old_inline)?;
    encode_text(pool, file_id, new_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pool_with_file() -> (tempfile::TempDir, BufferPool, FileId) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("text.data");
        let pool = BufferPool::new(8, 256, 8);
        pool.create_file(&path).unwrap();
        let fid = pool.open_file(&path).unwrap();
        (dir, pool, fid)
    }

    #[test]
    fn short_value_stays_inline() {
        let (_dir, pool, fid) = pool_with_file();
        let value = b"short text";
        let inline = encode_text(&pool, fid, value).unwrap();
        assert_eq!(&inline[0..4], &0u32.to_le_bytes());
        assert_eq!(decode_text(&pool, fid, &inline).unwrap(), value);
    }

    #[test]
    fn long_value_spills_to_overflow_page() {
        let (_dir, pool, fid) = pool_with_file();
        let value: Vec<u8> = (0..200u32).map(|i| (b'a' + (i % 26) as u8)).collect();
        let inline = encode_text(&pool, fid, &value).unwrap();
        let page_num = u32::from_le_bytes(inline[0..4].try_into().unwrap());
        assert_ne!(page_num, 0);
        assert_eq!(decode_text(&pool, fid, &inline).unwrap(), value);
    }

    #[test]
    fn update_disposes_previous_overflow_page() {
        let (_dir, pool, fid) = pool_with_file();
        let first: Vec<u8> = vec![b'x'; 150];
        let inline = encode_text(&pool, fid, &first).unwrap();
        let old_page = u32::from_le_bytes(inline[0..4].try_into().unwrap());
        assert_ne!(old_page, 0);

        let second = b"tiny now";
        let inline2 = update_text(&pool, fid, &inline, second).unwrap();
        assert_eq!(decode_text(&pool, fid, &inline2).unwrap(), second);
        assert!(pool.get_this_page(fid, old_page).is_err());
    }

    #[test]
    fn oversized_value_is_rejected() {
        let (_dir, pool, fid) = pool_with_file();
        let value = vec![0u8; 10_000];
        assert!(encode_text(&pool, fid, &value).is_err());
    }
}
