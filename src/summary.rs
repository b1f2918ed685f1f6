//! Summary (`SUM*`) files: one fixed 29-byte record per session.
//!
//! Record layout after the header, little-endian:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0x00 | 4 | date/time stamp |
//! | 0x04 | 1 | run time, tenths of an hour |
//! | 0x05 | 1 | usage time, tenths of an hour |
//! | 0x06 | 3 | ramp, pressure, leak percentage |
//! | 0x09 | 6 | three 16-bit values, the last a 90% leak |
//! | 0x0f | 2 | p1, p2 |
//! | 0x11 | 7 | j1..j7 event counters |
//! | 0x18 | 3 | p3, p4, p5 |
//! | 0x1b | 2 | humidifier and misc |

use crate::checksum::{split_header, SUMMARY_SEED};
use crate::error::{Error, Result};
use crate::models::{Channel, CpapMode, ParseReport, Session, Setting};
use crate::store::SessionStore;
use crate::timestamp::{DeviceTime, Stamp, TimestampCodec, END_OF_RECORDS, STAMP_LEN};
use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use std::io::{Cursor, Read};

/// Bytes per summary record.
pub const SUMMARY_RECORD_LEN: usize = 29;

/// Seconds per unit of the run and usage bytes.
const DURATION_UNIT_SECS: i64 = 360;

/// One decoded summary record, every field included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub time: DeviceTime,
    /// Run time in seconds.
    pub run_time: i64,
    /// Usage time in seconds.
    pub usage: i64,
    pub ramp: u8,
    pub pressure: u8,
    pub leak_percent: u8,
    pub d1: u16,
    pub d2: u16,
    /// 90% leak value.
    pub d3: u16,
    pub p1: u8,
    pub p2: u8,
    /// Event counters j1..j7. j2 counts obstructive apneas, j3 hypopneas.
    pub counters: [u8; 7],
    pub p3: u8,
    pub p4: u8,
    pub p5: u8,
    pub humidifier: u8,
    pub misc: u8,
}

impl SummaryRecord {
    /// Decode one record from exactly [`SUMMARY_RECORD_LEN`] bytes.
    pub fn decode(codec: &TimestampCodec, bytes: &[u8]) -> Result<Self> {
        let mut rdr = Cursor::new(bytes);
        let time = match codec.read(&mut rdr)? {
            Stamp::At(time) => time,
            Stamp::EndOfRecords => {
                return Err(Error::Other("summary record starts with end marker".to_string()))
            }
        };

        let run_time = i64::from(rdr.read_u8()?) * DURATION_UNIT_SECS;
        let usage = i64::from(rdr.read_u8()?) * DURATION_UNIT_SECS;
        let ramp = rdr.read_u8()?;
        let pressure = rdr.read_u8()?;
        let leak_percent = rdr.read_u8()?;
        let d1 = rdr.read_u16::<LittleEndian>()?;
        let d2 = rdr.read_u16::<LittleEndian>()?;
        let d3 = rdr.read_u16::<LittleEndian>()?;
        let p1 = rdr.read_u8()?;
        let p2 = rdr.read_u8()?;
        let mut counters = [0u8; 7];
        rdr.read_exact(&mut counters)?;
        let p3 = rdr.read_u8()?;
        let p4 = rdr.read_u8()?;
        let p5 = rdr.read_u8()?;
        let humidifier = rdr.read_u8()?;
        let misc = rdr.read_u8()?;

        Ok(Self {
            time,
            run_time,
            usage,
            ramp,
            pressure,
            leak_percent,
            d1,
            d2,
            d3,
            p1,
            p2,
            counters,
            p3,
            p4,
            p5,
            humidifier,
            misc,
        })
    }

    pub fn obstructive(&self) -> u8 {
        self.counters[1]
    }

    pub fn hypopnea(&self) -> u8 {
        self.counters[2]
    }

    /// APAP when the two pressure bytes differ, fixed CPAP otherwise.
    pub fn mode(&self) -> CpapMode {
        if self.p1 != self.p2 {
            CpapMode::Apap
        } else {
            CpapMode::Cpap
        }
    }

    /// Build the session this record describes.
    pub fn to_session(&self) -> Session {
        let ts = self.time.epoch;
        let mut session = Session::new(ts, self.time.date());
        session.first = ts * 1000;
        session.last = (ts + self.usage) * 1000;
        session
            .counts
            .insert(Channel::Obstructive, u32::from(self.obstructive()));
        session
            .counts
            .insert(Channel::Hypopnea, u32::from(self.hypopnea()));

        let mode = self.mode();
        session.settings.insert(Setting::Mode, mode.code());
        match mode {
            CpapMode::Apap => {
                session
                    .settings
                    .insert(Setting::PressureMin, f64::from(self.p4) / 10.0);
                session
                    .settings
                    .insert(Setting::PressureMax, f64::from(self.p3) / 10.0);
            }
            CpapMode::Cpap => {
                session
                    .settings
                    .insert(Setting::Pressure, f64::from(self.p1) / 10.0);
            }
        }
        session
    }
}

/// Iterator over the records of a summary body (the bytes after the header).
///
/// Yields `Err` for a record whose stamp does not decode; iteration continues
/// with the next record. Stops at the end marker, at the end of the buffer,
/// or before a truncated trailing record.
pub struct SummaryRecords<'a> {
    codec: TimestampCodec,
    body: &'a [u8],
    pos: usize,
    truncated: bool,
}

impl<'a> SummaryRecords<'a> {
    pub fn new(codec: TimestampCodec, body: &'a [u8]) -> Self {
        Self {
            codec,
            body,
            pos: 0,
            truncated: false,
        }
    }

    /// Whether iteration stopped on a partial trailing record.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl<'a> Iterator for SummaryRecords<'a> {
    type Item = Result<SummaryRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.body.get(self.pos..)?;
        if rest.len() < 2 {
            return None;
        }
        if u16::from_le_bytes([rest[0], rest[1]]) == END_OF_RECORDS {
            return None;
        }
        if rest.len() < SUMMARY_RECORD_LEN {
            self.truncated = true;
            return None;
        }

        let bytes = &rest[..SUMMARY_RECORD_LEN];
        self.pos += SUMMARY_RECORD_LEN;
        Some(SummaryRecord::decode(&self.codec, bytes))
    }
}

/// Creates sessions from summary files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryParser {
    codec: TimestampCodec,
}

impl SummaryParser {
    pub fn new(codec: TimestampCodec) -> Self {
        Self { codec }
    }

    /// Decode a whole summary file and register its new sessions in `store`.
    ///
    /// Records whose session already exists are left alone, so parsing the
    /// same file twice changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortFile`] when the file cannot hold a header.
    pub fn parse(&self, data: &[u8], name: &str, store: &mut SessionStore) -> Result<ParseReport> {
        let (checksum, body) = split_header(SUMMARY_SEED, data, name)?;
        let mut report = ParseReport::new(checksum);

        let mut records = SummaryRecords::new(self.codec, body);
        for record in records.by_ref() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping summary record in {}: {}", name, e);
                    report.skipped += 1;
                    continue;
                }
            };
            report.records += 1;

            if store.insert(record.to_session()) {
                debug!(
                    "Session {} on {} ({}s usage, {:?})",
                    record.time.epoch,
                    record.time.date(),
                    record.usage,
                    record.mode()
                );
                report.sessions += 1;
            } else {
                debug!("Session {} already known, skipping", record.time.epoch);
                report.skipped += 1;
            }
        }

        if records.truncated() {
            warn!("Dropping truncated trailing summary record in {}", name);
            report.skipped += 1;
        }

        Ok(report)
    }
}

// Record length matches the field table.
const _: () = assert!(SUMMARY_RECORD_LEN == STAMP_LEN + 2 + 3 + 6 + 2 + 7 + 3 + 2);
