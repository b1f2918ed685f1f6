//! Detail (`DET*`) files: a session index followed by two-minute samples.
//!
//! After the header comes a 2048-byte index of 7-byte entries (stamp, 16-bit
//! start offset, 8-bit record count), ended by the end marker or the end of
//! the region. The data region follows. An entry's samples start at
//! `start * 15` in the data region; each record is three 5-byte samples of
//! pressure, leak, obstructive, hypopnea and flow-limitation bytes.

use crate::checksum::{split_header, DETAIL_SEED};
use crate::error::Result;
use crate::models::{Channel, EventList, ParseReport, SessionId};
use crate::store::SessionStore;
use crate::timestamp::{DeviceTime, Stamp, TimestampCodec, END_OF_RECORDS, STAMP_LEN};
use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use std::io::Cursor;

/// Size of the index region following the header.
pub const INDEX_LEN: usize = 0x800;

/// Bytes per index entry.
pub const INDEX_ENTRY_LEN: usize = STAMP_LEN + 3;

/// Bytes per data-region sample.
pub const SAMPLE_LEN: usize = 5;

/// Samples per indexed record.
pub const SAMPLES_PER_RECORD: usize = 3;

/// Milliseconds between samples.
pub const SAMPLE_INTERVAL_MS: i64 = 120_000;

/// One index entry pointing into the data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailIndexEntry {
    pub time: DeviceTime,
    /// Start of this session's samples, in 15-byte record units.
    pub start: u16,
    /// Number of 15-byte records.
    pub records: u8,
}

impl DetailIndexEntry {
    /// Byte offset of the first sample in the data region.
    pub fn data_offset(&self) -> usize {
        usize::from(self.start) * SAMPLE_LEN * SAMPLES_PER_RECORD
    }

    pub fn sample_count(&self) -> usize {
        usize::from(self.records) * SAMPLES_PER_RECORD
    }
}

/// One two-minute sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailSample {
    /// Tenths of cmH2O.
    pub pressure: u8,
    pub leak: u8,
    pub obstructive: u8,
    pub hypopnea: u8,
    pub flow_limit: u8,
}

impl DetailSample {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut rdr = Cursor::new(bytes);
        let pressure = rdr.read_u8()?;
        let leak = rdr.read_u8()?;
        let obstructive = rdr.read_u8()?;
        let hypopnea = rdr.read_u8()?;
        let flow_limit = rdr.read_u8()?;
        Ok(Self {
            pressure,
            leak,
            obstructive,
            hypopnea,
            flow_limit,
        })
    }
}

/// Decode the index region.
///
/// Entries with malformed stamps come back as `Err` in place so the caller
/// can count them. Stops at the end marker or when fewer than a full entry's
/// bytes remain.
pub fn read_index(codec: &TimestampCodec, index: &[u8]) -> Vec<Result<DetailIndexEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0;

    while index.len() - pos >= 2 {
        // A short entry still gets checked for the end marker first.
        if u16::from_le_bytes([index[pos], index[pos + 1]]) == END_OF_RECORDS {
            break;
        }
        if index.len() - pos < INDEX_ENTRY_LEN {
            break;
        }

        let mut rdr = Cursor::new(&index[pos..pos + INDEX_ENTRY_LEN]);
        pos += INDEX_ENTRY_LEN;
        let entry = codec.read(&mut rdr).and_then(|stamp| {
            let start = rdr.read_u16::<LittleEndian>()?;
            let records = rdr.read_u8()?;
            Ok((stamp, start, records))
        });
        match entry {
            Ok((Stamp::At(time), start, records)) => entries.push(Ok(DetailIndexEntry {
                time,
                start,
                records,
            })),
            Ok((Stamp::EndOfRecords, ..)) => break,
            Err(e) => entries.push(Err(e)),
        }
    }

    entries
}

/// Attaches two-minute pressure, leak and event samples to known sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailParser {
    codec: TimestampCodec,
}

impl DetailParser {
    pub fn new(codec: TimestampCodec) -> Self {
        Self { codec }
    }

    /// Decode a detail file into the sessions already in `store`.
    ///
    /// Never creates sessions; entries without an exact session match are
    /// dropped.
    pub fn parse(&self, data: &[u8], name: &str, store: &mut SessionStore) -> Result<ParseReport> {
        let (checksum, body) = split_header(DETAIL_SEED, data, name)?;
        let mut report = ParseReport::new(checksum);

        let split = body.len().min(INDEX_LEN);
        let (index, region) = body.split_at(split);

        let mut matched: Vec<DetailIndexEntry> = Vec::new();
        for entry in read_index(&self.codec, index) {
            match entry {
                Ok(entry) if store.contains(entry.time.epoch) => {
                    report.records += 1;
                    matched.push(entry);
                }
                Ok(entry) => {
                    debug!("No session for detail entry {} in {}", entry.time.epoch, name);
                    report.records += 1;
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Skipping detail index entry in {}: {}", name, e);
                    report.skipped += 1;
                }
            }
        }

        for entry in matched {
            let id = entry.time.epoch;
            let complete = self.attach(id, &entry, region, store)?;
            report.sessions += 1;
            if !complete {
                warn!(
                    "Detail data for session {} runs past the end of {}",
                    id, name
                );
                report.skipped += 1;
            }
        }

        Ok(report)
    }

    /// Add one entry's samples to its session. Returns `false` if the data
    /// region ended early.
    fn attach(
        &self,
        id: SessionId,
        entry: &DetailIndexEntry,
        region: &[u8],
        store: &mut SessionStore,
    ) -> Result<bool> {
        let Some(session) = store.get_mut(id) else {
            return Ok(true);
        };

        let mut ti = id * 1000;
        session.first = ti;

        let mut pressure = EventList::events(Channel::Pressure, 0.1);
        let mut leak = EventList::events(Channel::LeakTotal, 1.0);
        let mut flag = EventList::events(Channel::FlowLimitFlag, 1.0);
        let mut obstructive = EventList::events(Channel::Obstructive, 1.0);
        let mut hypopnea = EventList::events(Channel::Hypopnea, 1.0);
        let mut flow_limit = EventList::events(Channel::FlowLimit, 1.0);

        let mut complete = true;
        let mut offset = entry.data_offset();
        for _ in 0..entry.sample_count() {
            let Some(bytes) = region.get(offset..offset + SAMPLE_LEN) else {
                complete = false;
                break;
            };
            let sample = DetailSample::decode(bytes)?;

            pressure.add_event(ti, u16::from(sample.pressure));
            leak.add_event(ti, u16::from(sample.leak));
            if sample.obstructive > 0 {
                obstructive.add_event(ti, u16::from(sample.obstructive));
            }
            if sample.hypopnea > 0 {
                hypopnea.add_event(ti, u16::from(sample.hypopnea));
            }
            if sample.flow_limit > 0 {
                flow_limit.add_event(ti, u16::from(sample.flow_limit));
            }
            flag.add_event(ti, u16::from(sample.flow_limit));

            ti += SAMPLE_INTERVAL_MS;
            offset += SAMPLE_LEN;
        }

        for list in [pressure, leak, flag, obstructive, hypopnea, flow_limit] {
            if !list.is_empty() {
                session.add_event_list(list);
            }
        }

        Ok(complete)
    }
}
