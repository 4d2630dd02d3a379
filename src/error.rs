//! Error types for the container format and the query engine.

use thiserror::Error;

/// Errors raised while reading or writing a grid index container.
///
/// Every variant is fatal for the file it was raised on: a reader that hits
/// one must treat the whole index as unusable.
#[derive(Error, Debug)]
pub enum GridError {
    /// Underlying file or mapping failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the expected format identifier.
    #[error("index file does not have the correct type or version (magic {found:#010x})")]
    BadMagic { found: u32 },

    /// The file ends before a required structure.
    #[error("index file truncated: need {needed} bytes, file has {len}")]
    Truncated { needed: usize, len: usize },

    /// An offset table entry points outside the file or out of order.
    #[error("{what} offset {offset} outside of file bounds ({len} bytes)")]
    OffsetOutOfBounds {
        what: &'static str,
        offset: usize,
        len: usize,
    },

    /// A varint did not terminate within the width of a 32-bit integer.
    #[error("variable length quantity at offset {offset} is too long for expected integer")]
    VarintOverflow { offset: usize },

    /// A row blob ended before its run lengths covered the requested column.
    #[error("row {row} is shorter than the raster width")]
    RowOverrun { row: usize },

    /// Metadata bytes are not valid UTF-8.
    #[error("invalid encoding in index for entry {code}")]
    InvalidUtf8 { code: usize },

    /// The writer produced a layout that disagrees with its own offset tables.
    #[error("file construction logic is inconsistent: {detail}")]
    Inconsistent { detail: String },
}

pub type Result<T> = std::result::Result<T, GridError>;
