//! Packed date/time words used by every ICON record stream.
//!
//! A stamp is two little-endian 16-bit words:
//!
//! - date word: bits 0..5 day, 5..9 month, 9..16 years since 2000
//! - time word: bits 0..5 seconds / 2, 5..11 minutes, 11..16 hours
//!
//! The device writes its own wall-clock time. [`DeviceClock`] decides how that
//! wall-clock is mapped onto UTC epoch seconds, which key every [`Session`].
//!
//! [`Session`]: crate::models::Session

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{
    DateTime, Datelike, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone,
    Timelike, Utc,
};
use std::io::Read;

/// Date word value that terminates a record stream.
pub const END_OF_RECORDS: u16 = 0xFAFE;

/// Size of one encoded stamp in bytes.
pub const STAMP_LEN: usize = 4;

/// How the device's wall-clock stamps relate to UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeviceClock {
    /// Stamps are in the host's local time zone.
    #[default]
    Local,
    /// Stamps are already UTC.
    Utc,
    /// Stamps are in a fixed offset from UTC.
    Fixed(FixedOffset),
}

impl DeviceClock {
    /// Convert a device wall-clock time to epoch seconds.
    ///
    /// A local time that is ambiguous (clocks going back) resolves to the
    /// earlier instant. A local time that never happened (clocks going
    /// forward) yields `None`.
    pub fn to_epoch(&self, local: &NaiveDateTime) -> Option<i64> {
        match self {
            DeviceClock::Utc => Some(local.and_utc().timestamp()),
            DeviceClock::Local => earliest(Local.from_local_datetime(local)),
            DeviceClock::Fixed(offset) => earliest(offset.from_local_datetime(local)),
        }
    }
}

fn earliest<Tz: TimeZone>(result: LocalResult<DateTime<Tz>>) -> Option<i64> {
    result.earliest().map(|dt| dt.with_timezone(&Utc).timestamp())
}

/// A decoded device timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTime {
    /// Wall-clock time as written by the device.
    pub local: NaiveDateTime,
    /// The same instant as UTC epoch seconds.
    pub epoch: i64,
}

impl DeviceTime {
    /// Calendar day of the stamp, in device wall-clock terms.
    pub fn date(&self) -> NaiveDate {
        self.local.date()
    }
}

/// Result of reading a stamp from a record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// The date word was [`END_OF_RECORDS`]; the time word was not read.
    EndOfRecords,
    At(DeviceTime),
}

/// Decodes packed date/time word pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampCodec {
    clock: DeviceClock,
}

impl TimestampCodec {
    pub fn new(clock: DeviceClock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> DeviceClock {
        self.clock
    }

    /// Read one stamp from `rdr`.
    ///
    /// Stops after the date word when it is the end-of-records sentinel.
    /// Otherwise both words are consumed even when they fail to decode, so
    /// fixed-size record walks stay aligned.
    pub fn read<R: Read>(&self, rdr: &mut R) -> Result<Stamp> {
        let date_word = rdr.read_u16::<LittleEndian>()?;
        if date_word == END_OF_RECORDS {
            return Ok(Stamp::EndOfRecords);
        }
        let time_word = rdr.read_u16::<LittleEndian>()?;
        self.decode(date_word, time_word).map(Stamp::At)
    }

    /// Decode an already-read word pair.
    pub fn decode(&self, date_word: u16, time_word: u16) -> Result<DeviceTime> {
        let invalid = || Error::InvalidTimestamp {
            date_word,
            time_word,
        };
        let local = unpack(date_word, time_word).ok_or_else(invalid)?;
        let epoch = self.clock.to_epoch(&local).ok_or_else(invalid)?;
        Ok(DeviceTime { local, epoch })
    }
}

/// Unpack the calendar fields. `None` when they are out of range.
pub fn unpack(date_word: u16, time_word: u16) -> Option<NaiveDateTime> {
    let day = u32::from(date_word & 0x1f);
    let month = u32::from((date_word >> 5) & 0x0f);
    let year = 2000 + i32::from((date_word >> 9) & 0x7f);

    let second = u32::from(time_word & 0x1f) * 2;
    let minute = u32::from((time_word >> 5) & 0x3f);
    let hour = u32::from((time_word >> 11) & 0x1f);

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

/// Pack a wall-clock time into its date and time words.
///
/// Seconds are truncated to even values; years outside 2000..=2127 do not fit.
pub fn pack(local: &NaiveDateTime) -> (u16, u16) {
    let date_word = (((local.year() - 2000) as u16 & 0x7f) << 9)
        | ((local.month() as u16 & 0x0f) << 5)
        | (local.day() as u16 & 0x1f);
    let time_word = ((local.hour() as u16 & 0x1f) << 11)
        | ((local.minute() as u16 & 0x3f) << 5)
        | ((local.second() as u16 / 2) & 0x1f);
    (date_word, time_word)
}
