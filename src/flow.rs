//! Flow (`FLW*`) files: marker-framed flow-rate waveform chunks.
//!
//! The body opens with a stamp that only pins down the calendar day. The
//! rest is a run of chunks, each ending in a 5-byte trailer and the marker
//! `FF FF`. Payload bytes are little-endian 16-bit samples; only their
//! magnitude is meaningful. A marker followed by `FF 7F` ends one session's
//! stream, after which zero padding may follow before the next session's
//! chunks.
//!
//! The framing is reverse-engineered. The trailer's first two bytes (`z1`)
//! and third byte (`z2`) vary per chunk and have no known meaning.

use crate::checksum::{split_header, FLOW_SEED};
use crate::error::Result;
use crate::models::{Channel, EventList, ParseReport};
use crate::store::SessionStore;
use crate::timestamp::{Stamp, TimestampCodec, STAMP_LEN};
use log::debug;
use std::io::Cursor;

/// Flow samples per second.
pub const FLOW_RATE_HZ: f64 = 1000.0 / 23.5;

/// Bytes between a chunk's payload and its marker.
pub const TRAILER_LEN: usize = 5;

const MARKER: [u8; 2] = [0xFF, 0xFF];
const END_OF_STREAM: [u8; 2] = [0xFF, 0x7F];

/// One framed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowChunk<'a> {
    /// Raw sample bytes.
    pub payload: &'a [u8],
    /// Bytes between payload and marker, shorter than [`TRAILER_LEN`] only
    /// when the marker sat closer than that to the chunk start.
    pub trailer: &'a [u8],
    /// Whether this chunk ended its session's stream.
    pub terminal: bool,
}

impl<'a> FlowChunk<'a> {
    /// Sample magnitudes. A trailing odd byte is ignored.
    pub fn samples(&self) -> impl Iterator<Item = u16> + 'a {
        self.payload
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]).unsigned_abs())
    }

    pub fn sample_count(&self) -> usize {
        self.payload.len() / 2
    }

    pub fn z1(&self) -> Option<u16> {
        self.trailer
            .get(..2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn z2(&self) -> Option<u8> {
        self.trailer.get(2).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Running,
    Terminated,
    Exhausted,
}

/// Walks chunks from a byte position until one session's stream ends.
pub struct ChunkScanner<'a> {
    body: &'a [u8],
    pos: usize,
    state: ScanState,
    dropped: usize,
}

impl<'a> ChunkScanner<'a> {
    pub fn new(body: &'a [u8], pos: usize) -> Self {
        Self {
            body,
            pos: pos.min(body.len()),
            state: ScanState::Running,
            dropped: 0,
        }
    }

    /// Where the next session's chunks begin.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Whether the buffer ran out, leaving nothing for later sessions.
    pub fn exhausted(&self) -> bool {
        self.state == ScanState::Exhausted
    }

    /// Unframed bytes discarded at the end of the buffer.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<'a> Iterator for ChunkScanner<'a> {
    type Item = FlowChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != ScanState::Running {
            return None;
        }

        let start = self.pos;
        let Some(found) = self.body[start..].windows(2).position(|w| w == MARKER) else {
            self.dropped = self.body.len() - start;
            self.pos = self.body.len();
            self.state = ScanState::Exhausted;
            return None;
        };

        let marker = start + found;
        let trailer_start = marker.saturating_sub(TRAILER_LEN).max(start);
        let mut chunk = FlowChunk {
            payload: &self.body[start..trailer_start],
            trailer: &self.body[trailer_start..marker],
            terminal: false,
        };

        self.pos = marker + MARKER.len();
        match self.body.get(self.pos..self.pos + 2) {
            None => self.state = ScanState::Exhausted,
            Some(next) if next == END_OF_STREAM => {
                self.pos += END_OF_STREAM.len();
                while self.body.get(self.pos) == Some(&0) {
                    self.pos += 1;
                }
                chunk.terminal = true;
                self.state = ScanState::Terminated;
            }
            Some(_) => {}
        }

        Some(chunk)
    }
}

/// Attaches flow-rate waveforms to the sessions of the file's day.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowParser {
    codec: TimestampCodec,
}

impl FlowParser {
    pub fn new(codec: TimestampCodec) -> Self {
        Self { codec }
    }

    /// Decode a flow file into the sessions already in `store`.
    ///
    /// Sessions starting on the file's day consume chunk streams in start
    /// order. Days without sessions leave the store untouched.
    pub fn parse(&self, data: &[u8], name: &str, store: &mut SessionStore) -> Result<ParseReport> {
        let (checksum, body) = split_header(FLOW_SEED, data, name)?;
        let mut report = ParseReport::new(checksum);

        if body.len() < 2 {
            debug!("No flow data in {}", name);
            return Ok(report);
        }
        let date = match self.codec.read(&mut Cursor::new(body))? {
            Stamp::At(time) => time.date(),
            Stamp::EndOfRecords => {
                debug!("End marker where the flow stamp belongs in {}", name);
                return Ok(report);
            }
        };

        let ids = store.ids_on(date);
        if ids.is_empty() {
            debug!("No sessions on {} for {}", date, name);
        }

        let mut pos = STAMP_LEN;
        for id in ids {
            let mut ti = id as f64 * 1000.0;
            let mut flow: Option<EventList> = None;

            let mut scanner = ChunkScanner::new(body, pos);
            for chunk in scanner.by_ref() {
                report.records += 1;
                let samples: Vec<u16> = chunk.samples().collect();
                if !samples.is_empty() {
                    flow.get_or_insert_with(|| {
                        EventList::waveform(Channel::FlowRate, 1.0, FLOW_RATE_HZ, ti.round() as i64)
                    })
                    .add_samples(&samples);
                }
                ti += samples.len() as f64 * (1000.0 / FLOW_RATE_HZ);
            }
            pos = scanner.position();

            if let (Some(flow), Some(session)) = (flow, store.get_mut(id)) {
                debug!("Session {}: {} flow samples from {}", id, flow.len(), name);
                session.add_event_list(flow);
                report.sessions += 1;
            }

            if scanner.exhausted() {
                if scanner.dropped() > 0 {
                    debug!(
                        "Discarding {} unframed bytes at the end of {}",
                        scanner.dropped(),
                        name
                    );
                    report.skipped += 1;
                }
                break;
            }
        }

        Ok(report)
    }
}
