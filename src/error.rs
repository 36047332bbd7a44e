//! Uniform result codes for every public operation in the engine (spec §7).
//!
//! The original C++ source returns a sentinel `RC` integer from every
//! call. We keep the same "no panics for control flow" discipline but
//! express it as an exhaustive `thiserror` enum instead of a bag of
//! `#define`s, the way a Rust rewrite of that pattern should look.

use std::io;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("buffer pool: file is not open")]
    BufferPoolClosed,

    #[error("buffer pool: page {0} is out of the file's allocated range")]
    InvalidPageNum(u32),

    #[error("buffer pool: no free frame available")]
    FrameNoMem,

    #[error("record manager: file already open")]
    RecordOpened,

    #[error("record manager: out of memory")]
    RecordNoMem,

    #[error("record manager: record does not exist")]
    RecordNotExist,

    #[error("record manager: rid is invalid")]
    InvalidRid,

    #[error("record manager: end of file")]
    Eof,

    #[error("record manager: duplicate key")]
    DuplicateKey,

    #[error("record manager: invalid key")]
    InvalidKey,

    #[error("record manager: file is closed")]
    RecordClosed,

    #[error("schema: table `{0}` already exists")]
    TableExists(String),

    #[error("schema: table `{0}` does not exist")]
    TableNotExist(String),

    #[error("schema: a required field is missing")]
    FieldMissing,

    #[error("schema: field `{0}` does not exist")]
    FieldNotExist(String),

    #[error("schema: field `{0}` type mismatch")]
    FieldTypeMismatch(String),

    #[error("schema: index `{0}` already exists")]
    IndexExists(String),

    #[error("constraint: field `{0}` may not be null")]
    ConstraintNotNull(String),

    #[error("sql syntax error: {0}")]
    SqlSyntax(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("generic storage error: {0}")]
    Generic(String),
}

impl DbError {
    /// Capture a backtrace alongside the message, the way the teacher's
    /// `SimpleError::show_backtrace` surfaces context for fatal storage
    /// errors (spec §7: a `GENERIC_ERROR` is fatal for the table).
    pub fn generic_with_backtrace(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        let bt = backtrace::Backtrace::new();
        log::error!("generic storage error: {}\n{:?}", msg, bt);
        DbError::Generic(msg)
    }
}
