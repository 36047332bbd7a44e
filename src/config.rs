//! Explicit engine configuration (spec §6, §9 "Global mutable state").
//!
//! The original source reaches for a handful of process-wide singletons
//! (`theGlobalDiskBufferPool()`, a date validator, a metrics registry)
//! initialized from baked-in constants. We keep the convenience of a
//! singleton accessor (`Database::global`, in the teacher's style) but
//! require it to be constructed once from an explicit `EngineConfig`, so
//! tests never share state through a hidden default and every base
//! directory / frame count is a value, not a constant.

use std::path::PathBuf;

/// Default page size used throughout the engine unless a test overrides
/// it: 8 KiB (spec §3).
pub const DEFAULT_PAGE_SIZE: usize = 8192;

/// Default buffer pool frame count (spec §4.1).
pub const DEFAULT_BUFFER_FRAMES: usize = 50;

/// Maximum number of paged files the buffer pool may hold open at once
/// (spec §4.1).
pub const MAX_OPEN_FILES: usize = 32;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory under which every table's `.table` / `.data` /
    /// `.index` files live. The catalog is the set of tables registered
    /// under this directory (spec §6: "the catalog is the set of
    /// subdirectories directly under it" at the process level; within
    /// one database directory the catalog is the set of `.table` files).
    pub base_dir: PathBuf,
    pub page_size: usize,
    pub buffer_pool_frames: usize,
}

impl EngineConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_frames: DEFAULT_BUFFER_FRAMES,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_buffer_pool_frames(mut self, frames: usize) -> Self {
        self.buffer_pool_frames = frames;
        self
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.table", table_name))
    }

    pub fn data_path(&self, table_name: &str) -> PathBuf {
        self.base_dir.join(format!("{}.data", table_name))
    }

    pub fn index_path(&self, table_name: &str, index_name: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}-{}.index", table_name, index_name))
    }
}
