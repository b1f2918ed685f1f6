//! Test utilities for building ICON card files
#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{NaiveDate, NaiveDateTime};
use fpicon_parser::checksum::{header_sum, DETAIL_SEED, FLOW_SEED, HEADER_LEN, SUMMARY_SEED};
use fpicon_parser::detail::INDEX_LEN;
use fpicon_parser::timestamp::{pack, END_OF_RECORDS};
use std::fs;
use std::path::{Path, PathBuf};

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, s)
        .unwrap()
}

/// Epoch seconds of a wall-clock time read as UTC
pub fn epoch(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp()
}

/// A 512-byte header with filler content and a correct checksum
pub fn header(seed: u8) -> Vec<u8> {
    let mut data: Vec<u8> = (0..HEADER_LEN).map(|i| (i % 251) as u8).collect();
    data[..8].copy_from_slice(b"ICONHDR\0");
    data[HEADER_LEN - 1] = header_sum(seed, &data);
    data
}

fn write_stamp(data: &mut Vec<u8>, time: NaiveDateTime) {
    let (date_word, time_word) = pack(&time);
    data.write_u16::<LittleEndian>(date_word).unwrap();
    data.write_u16::<LittleEndian>(time_word).unwrap();
}

/// Fields of one summary record
#[derive(Debug, Clone, Copy)]
pub struct SummaryFields {
    pub time: NaiveDateTime,
    pub run: u8,
    pub usage: u8,
    /// p1..p5
    pub p: [u8; 5],
    /// j1..j7
    pub j: [u8; 7],
}

impl SummaryFields {
    /// A fixed-pressure session
    pub fn cpap(time: NaiveDateTime, usage: u8, pressure: u8) -> Self {
        Self {
            time,
            run: usage,
            usage,
            p: [pressure, pressure, 0, 0, 0],
            j: [0; 7],
        }
    }

    /// An auto-adjusting session between `min` and `max`
    pub fn apap(time: NaiveDateTime, usage: u8, min: u8, max: u8) -> Self {
        Self {
            time,
            run: usage,
            usage,
            p: [min + 10, min + 20, max, min, 0],
            j: [0; 7],
        }
    }

    pub fn events(mut self, obstructive: u8, hypopnea: u8) -> Self {
        self.j[1] = obstructive;
        self.j[2] = hypopnea;
        self
    }
}

/// Builder for summary (`SUM*`) files
pub struct SummaryBuilder {
    data: Vec<u8>,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self {
            data: header(SUMMARY_SEED),
        }
    }

    pub fn record(mut self, f: SummaryFields) -> Self {
        write_stamp(&mut self.data, f.time);
        self.data.push(f.run);
        self.data.push(f.usage);
        self.data.extend_from_slice(&[3, 90, 12]); // ramp, pressure, leak %
        self.data.write_u16::<LittleEndian>(0x0102).unwrap();
        self.data.write_u16::<LittleEndian>(0x0304).unwrap();
        self.data.write_u16::<LittleEndian>(27).unwrap(); // 90% leak
        self.data.push(f.p[0]);
        self.data.push(f.p[1]);
        self.data.extend_from_slice(&f.j);
        self.data.push(f.p[2]);
        self.data.push(f.p[3]);
        self.data.push(f.p[4]);
        self.data.push(4); // humidifier
        self.data.push(0);
        self
    }

    /// A record slot whose stamp words are given raw
    pub fn raw_record(mut self, date_word: u16, time_word: u16) -> Self {
        self.data.write_u16::<LittleEndian>(date_word).unwrap();
        self.data.write_u16::<LittleEndian>(time_word).unwrap();
        self.data.extend_from_slice(&[0u8; 25]);
        self
    }

    pub fn end(mut self) -> Self {
        self.data.write_u16::<LittleEndian>(END_OF_RECORDS).unwrap();
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// Builder for detail (`DET*`) files
pub struct DetailBuilder {
    index: Vec<u8>,
    data: Vec<u8>,
}

impl DetailBuilder {
    pub fn new() -> Self {
        Self {
            index: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn entry(mut self, time: NaiveDateTime, start: u16, records: u8) -> Self {
        write_stamp(&mut self.index, time);
        self.index.write_u16::<LittleEndian>(start).unwrap();
        self.index.push(records);
        self
    }

    pub fn raw_entry(mut self, date_word: u16, time_word: u16, start: u16, records: u8) -> Self {
        self.index.write_u16::<LittleEndian>(date_word).unwrap();
        self.index.write_u16::<LittleEndian>(time_word).unwrap();
        self.index.write_u16::<LittleEndian>(start).unwrap();
        self.index.push(records);
        self
    }

    pub fn end_index(mut self) -> Self {
        self.index.write_u16::<LittleEndian>(END_OF_RECORDS).unwrap();
        self
    }

    /// Append one 5-byte sample to the data region
    pub fn sample(mut self, pressure: u8, leak: u8, obstructive: u8, hypopnea: u8, flow_limit: u8) -> Self {
        self.data
            .extend_from_slice(&[pressure, leak, obstructive, hypopnea, flow_limit]);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with_seed(DETAIL_SEED)
    }

    pub fn build_with_seed(self, seed: u8) -> Vec<u8> {
        let mut out = header(seed);
        // Zero padding would read as malformed entries, so always close the index.
        let mut index = self.index;
        index.write_u16::<LittleEndian>(END_OF_RECORDS).unwrap();
        index.resize(INDEX_LEN, 0);
        out.extend_from_slice(&index);
        out.extend_from_slice(&self.data);
        out
    }
}

/// Builder for flow (`FLW*`) files
pub struct FlowBuilder {
    data: Vec<u8>,
}

impl FlowBuilder {
    pub fn new(time: NaiveDateTime) -> Self {
        let mut data = header(FLOW_SEED);
        write_stamp(&mut data, time);
        Self { data }
    }

    /// Samples, a 5-byte trailer and the `FF FF` marker
    pub fn chunk(mut self, samples: &[i16], z1: u16, z2: u8) -> Self {
        for &s in samples {
            self.data.write_i16::<LittleEndian>(s).unwrap();
        }
        self.data.write_u16::<LittleEndian>(z1).unwrap();
        self.data.push(z2);
        self.data.extend_from_slice(&[0x00, 0x00]);
        self.data.extend_from_slice(&[0xFF, 0xFF]);
        self
    }

    /// End of one session's stream plus zero padding
    pub fn end_stream(mut self) -> Self {
        self.data.extend_from_slice(&[0xFF, 0x7F, 0x00, 0x00]);
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// Lays out `FPHCARE/ICON/<serial>/` trees on disk
pub struct CardBuilder {
    root: PathBuf,
}

impl CardBuilder {
    pub fn new(root: &Path) -> Self {
        fs::create_dir_all(root.join("FPHCARE").join("ICON")).unwrap();
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn device_dir(&self, serial: &str) -> PathBuf {
        self.root.join("FPHCARE").join("ICON").join(serial)
    }

    pub fn file(self, serial: &str, name: &str, bytes: &[u8]) -> Self {
        let dir = self.device_dir(serial);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), bytes).unwrap();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpicon_parser::checksum::validate_header;

    #[test]
    fn test_builders_write_valid_headers() {
        assert!(validate_header(SUMMARY_SEED, &SummaryBuilder::new().build())
            .unwrap()
            .is_valid());
        assert!(validate_header(DETAIL_SEED, &DetailBuilder::new().build())
            .unwrap()
            .is_valid());
        assert!(validate_header(FLOW_SEED, &FlowBuilder::new(at(2012, 1, 1, 0, 0, 0)).build())
            .unwrap()
            .is_valid());
    }

    #[test]
    fn test_summary_record_is_29_bytes() {
        let data = SummaryBuilder::new()
            .record(SummaryFields::cpap(at(2012, 1, 1, 0, 0, 0), 10, 80))
            .build();
        assert_eq!(data.len(), HEADER_LEN + 29);
    }

    #[test]
    fn test_detail_layout() {
        let data = DetailBuilder::new()
            .entry(at(2012, 1, 1, 0, 0, 0), 0, 1)
            .sample(1, 2, 3, 4, 5)
            .build();
        assert_eq!(data.len(), HEADER_LEN + INDEX_LEN + 5);
    }
}
