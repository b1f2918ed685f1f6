use crate::checksum::ChecksumStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Session key: start of the session in UTC epoch seconds.
pub type SessionId = i64;

/// Named time series a session can own or count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Pressure,
    LeakTotal,
    FlowLimitFlag,
    Obstructive,
    Hypopnea,
    FlowLimit,
    FlowRate,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Pressure => "pressure",
            Channel::LeakTotal => "leak_total",
            Channel::FlowLimitFlag => "flow_limit_flag",
            Channel::Obstructive => "obstructive",
            Channel::Hypopnea => "hypopnea",
            Channel::FlowLimit => "flow_limit",
            Channel::FlowRate => "flow_rate",
        }
    }
}

/// Session settings recorded from the summary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setting {
    Mode,
    Pressure,
    PressureMin,
    PressureMax,
}

/// Therapy mode. Stored in the settings map as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CpapMode {
    Cpap = 1,
    Apap = 2,
}

impl CpapMode {
    pub fn code(self) -> f64 {
        self as i32 as f64
    }

    pub fn from_code(code: f64) -> Option<Self> {
        match code as i32 {
            1 => Some(CpapMode::Cpap),
            2 => Some(CpapMode::Apap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Irregular `(time, value)` pairs.
    Event,
    /// Evenly spaced samples from a start time.
    Waveform,
}

/// One channel's data inside a session.
///
/// Values are stored raw; multiply by `gain` for physical units.
/// Event lists carry one absolute millisecond timestamp per value. Waveforms
/// carry only `first` and `rate`, sample `i` sits at `first + i * 1000 / rate`.
#[derive(Debug, Clone, Serialize)]
pub struct EventList {
    pub channel: Channel,
    pub kind: EventKind,
    pub gain: f64,
    /// Samples per second; zero for event lists.
    pub rate: f64,
    /// Time of the first value, ms since epoch.
    pub first: i64,
    /// Time of the last value, ms since epoch.
    pub last: i64,
    pub times: Vec<i64>,
    pub values: Vec<u16>,
}

impl EventList {
    pub fn events(channel: Channel, gain: f64) -> Self {
        Self {
            channel,
            kind: EventKind::Event,
            gain,
            rate: 0.0,
            first: 0,
            last: 0,
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn waveform(channel: Channel, gain: f64, rate: f64, first: i64) -> Self {
        Self {
            channel,
            kind: EventKind::Waveform,
            gain,
            rate,
            first,
            last: first,
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn add_event(&mut self, time: i64, value: u16) {
        if self.values.is_empty() {
            self.first = time;
        }
        self.last = time;
        self.times.push(time);
        self.values.push(value);
    }

    /// Append samples continuing the waveform.
    pub fn add_samples(&mut self, samples: &[u16]) {
        self.values.extend_from_slice(samples);
        if !self.values.is_empty() {
            let span = (self.values.len() - 1) as f64 * self.interval_ms();
            self.last = self.first + span.round() as i64;
        }
    }

    /// Milliseconds between waveform samples.
    pub fn interval_ms(&self) -> f64 {
        if self.rate > 0.0 {
            1000.0 / self.rate
        } else {
            0.0
        }
    }

    /// Timestamp of value `i`, ms since epoch.
    pub fn time(&self, i: usize) -> i64 {
        match self.kind {
            EventKind::Event => self.times[i],
            EventKind::Waveform => self.first + (i as f64 * self.interval_ms()).round() as i64,
        }
    }

    /// Value `i` in physical units.
    pub fn physical(&self, i: usize) -> f64 {
        f64::from(self.values[i]) * self.gain
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One contiguous therapy period.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: SessionId,
    /// Device wall-clock day the session started on.
    pub date: NaiveDate,
    /// Start, ms since epoch.
    pub first: i64,
    /// End, ms since epoch.
    pub last: i64,
    pub counts: BTreeMap<Channel, u32>,
    pub settings: BTreeMap<Setting, f64>,
    pub events: BTreeMap<Channel, Vec<EventList>>,
}

impl Session {
    pub fn new(id: SessionId, date: NaiveDate) -> Self {
        Self {
            id,
            date,
            first: id * 1000,
            last: id * 1000,
            counts: BTreeMap::new(),
            settings: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn mode(&self) -> Option<CpapMode> {
        self.settings.get(&Setting::Mode).copied().and_then(CpapMode::from_code)
    }

    pub fn count(&self, channel: Channel) -> Option<u32> {
        self.counts.get(&channel).copied()
    }

    pub fn setting(&self, setting: Setting) -> Option<f64> {
        self.settings.get(&setting).copied()
    }

    pub fn add_event_list(&mut self, list: EventList) {
        self.events.entry(list.channel).or_default().push(list);
    }

    pub fn event_lists(&self, channel: Channel) -> &[EventList] {
        self.events.get(&channel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total values across every list of `channel`.
    pub fn sample_count(&self, channel: Channel) -> usize {
        self.event_lists(channel).iter().map(EventList::len).sum()
    }

    pub fn duration_secs(&self) -> i64 {
        (self.last - self.first) / 1000
    }
}

/// Identity of one ICON device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub brand: String,
    pub model: String,
    pub serial: String,
}

impl DeviceInfo {
    pub fn icon(serial: &str) -> Self {
        Self {
            brand: "Fisher & Paykel".to_string(),
            model: "ICON".to_string(),
            serial: serial.to_string(),
        }
    }
}

/// What a single file parse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseReport {
    pub checksum: ChecksumStatus,
    /// Records (summary records, index entries, or flow chunks) decoded.
    pub records: usize,
    /// Sessions created or updated.
    pub sessions: usize,
    /// Records skipped as unmatched, duplicate, malformed, or truncated.
    pub skipped: usize,
}

impl ParseReport {
    pub fn new(checksum: ChecksumStatus) -> Self {
        Self {
            checksum,
            records: 0,
            sessions: 0,
            skipped: 0,
        }
    }
}
