//! Sequential scan over every live record in a `RecordFileHandler`
//! (spec §4.2, "full scan"), grounded in
//! `original_source/src/observer/storage/common/record_manager.h`'s
//! `RecordFileScanner`.

use crate::buffer::file::FIRST_DATA_PAGE;
use crate::error::DbError;
use crate::error::DbResult;
use crate::record::file_handle::{Rid, RecordFileHandler};
use crate::types::PageNum;

pub struct RecordScanner<'a> {
    handler: &'a RecordFileHandler,
    page_count: PageNum,
    current_page: PageNum,
    current_slot: u32,
}

impl<'a> RecordScanner<'a> {
    pub fn new(handler: &'a RecordFileHandler) -> DbResult<Self> {
        let page_count = handler.page_count()?;
        Ok(Self {
            handler,
            page_count,
            current_page: FIRST_DATA_PAGE,
            current_slot: 0,
        })
    }

    /// Advance to and return the next live `(rid, record bytes)` pair, or
    /// `None` once every page has been visited.
    pub fn next(&mut self) -> DbResult<Option<(Rid, Vec<u8>)>> {
        while self.current_page <= self.page_count {
            let found = self.handler.with_record_page(self.current_page, |page| {
                Ok(page.next_occupied(self.current_slot))
            });
            let slot = match found {
                Ok(slot) => slot,
                Err(DbError::InvalidPageNum(_)) => {
                    self.current_page += 1;
                    self.current_slot = 0;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match slot {
                Some(slot) => {
                    let rid = Rid::new(self.current_page, slot);
                    let data = self.handler.get_record(rid)?;
                    self.current_slot = slot + 1;
                    return Ok(Some((rid, data)));
                }
                None => {
                    self.current_page += 1;
                    self.current_slot = 0;
                }
            }
        }
        Ok(None)
    }
}
