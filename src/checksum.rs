//! Header checksum shared by all three ICON file kinds.
//!
//! Every file starts with a 512-byte header. Its last byte is the low eight
//! bits of a running sum over the preceding 511 bytes. The sum starts at a
//! per-format seed: summary and flow files use `0xFF`, detail files use `0`.
//! A mismatch is reported but never stops decoding.

use crate::error::{Error, Result};
use log::warn;

/// Length of the fixed file header.
pub const HEADER_LEN: usize = 0x200;

/// Seed used by summary (`SUM*`) files.
pub const SUMMARY_SEED: u8 = 0xFF;

/// Seed used by detail (`DET*`) files.
pub const DETAIL_SEED: u8 = 0x00;

/// Seed used by flow (`FLW*`) files.
pub const FLOW_SEED: u8 = 0xFF;

/// Outcome of checking a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Valid,
    Mismatch { stored: u8, computed: u8 },
}

impl ChecksumStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, ChecksumStatus::Valid)
    }
}

/// Sum bytes `[0, 511)` of `header` onto `seed`, modulo 256.
pub fn header_sum(seed: u8, header: &[u8]) -> u8 {
    header[..HEADER_LEN - 1]
        .iter()
        .fold(seed, |acc, b| acc.wrapping_add(*b))
}

/// Check the header at the start of `data`.
///
/// # Errors
///
/// Returns [`Error::ShortFile`] when `data` is shorter than the header.
pub fn validate_header(seed: u8, data: &[u8]) -> Result<ChecksumStatus> {
    if data.len() < HEADER_LEN {
        return Err(Error::ShortFile { len: data.len() });
    }
    let computed = header_sum(seed, data);
    let stored = data[HEADER_LEN - 1];
    if computed == stored {
        Ok(ChecksumStatus::Valid)
    } else {
        Ok(ChecksumStatus::Mismatch { stored, computed })
    }
}

/// Validate the header, log a mismatch, and return the bytes after it.
pub fn split_header<'a>(seed: u8, data: &'a [u8], name: &str) -> Result<(ChecksumStatus, &'a [u8])> {
    let status = validate_header(seed, data)?;
    if let ChecksumStatus::Mismatch { stored, computed } = status {
        warn!(
            "Header checksum mismatch in {}: stored {:#04x}, computed {:#04x}",
            name, stored, computed
        );
    }
    Ok((status, &data[HEADER_LEN..]))
}
