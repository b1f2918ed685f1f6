//! Error types for the ICON record decoder.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for ICON decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when decoding or importing ICON card data.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred while opening or reading a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is too short to hold the fixed 512-byte header
    #[error("Short file: {len} bytes, header needs 512")]
    ShortFile { len: usize },

    /// Packed date/time words do not describe a real calendar instant
    #[error("Invalid timestamp: date word {date_word:#06x}, time word {time_word:#06x}")]
    InvalidTimestamp { date_word: u16, time_word: u16 },

    /// A newly imported device has sessions on days another device already covers
    #[error("Device {serial} overlaps existing records on {day}")]
    OverlappingDays { serial: String, day: NaiveDate },

    /// No FPHCARE/ICON directory at the given location
    #[error("Not found: {0}")]
    NotFound(String),

    /// Output format error (e.g., Parquet write error)
    #[error("Output error: {0}")]
    OutputError(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
