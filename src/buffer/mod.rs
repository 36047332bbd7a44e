//! Paged-file I/O and the frame-table buffer pool (spec §3, §4.1).

pub mod file;
pub mod frame;
pub mod pool;
pub mod replacer;

pub use file::PagedFile;
pub use pool::{BufferPool, FrameHandle};
