use crate::models::{Channel, CpapMode, Session, SessionId, Setting};
use serde::Serialize;

/// One session flattened to a table row.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRow {
    pub serial: String,
    pub session: SessionId,
    pub date: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub mode: Option<CpapMode>,
    pub pressure: Option<f64>,
    pub pressure_min: Option<f64>,
    pub pressure_max: Option<f64>,
    pub obstructive: Option<u32>,
    pub hypopnea: Option<u32>,
    pub detail_samples: usize,
    pub flow_samples: usize,
}

/// One event or waveform sample in long format.
#[derive(Debug, Clone, Serialize)]
pub struct EventRow {
    pub session: SessionId,
    pub channel: String,
    pub timestamp_ms: i64,
    /// Physical value (raw value times gain).
    pub value: f64,
}

/// Flattens a device's sessions into rows.
pub struct Formatter {
    pub serial: String,
}

impl Formatter {
    pub fn new(serial: &str) -> Self {
        Self {
            serial: serial.to_string(),
        }
    }

    pub fn session_row(&self, session: &Session) -> SessionRow {
        SessionRow {
            serial: self.serial.clone(),
            session: session.id(),
            date: session.date.format("%Y-%m-%d").to_string(),
            start_ms: session.first,
            end_ms: session.last,
            mode: session.mode(),
            pressure: session.setting(Setting::Pressure),
            pressure_min: session.setting(Setting::PressureMin),
            pressure_max: session.setting(Setting::PressureMax),
            obstructive: session.count(Channel::Obstructive),
            hypopnea: session.count(Channel::Hypopnea),
            detail_samples: session.sample_count(Channel::Pressure),
            flow_samples: session.sample_count(Channel::FlowRate),
        }
    }

    /// Every value of every channel, ordered by channel then time.
    pub fn event_rows(&self, session: &Session) -> Vec<EventRow> {
        let mut rows = Vec::new();
        for (channel, lists) in &session.events {
            for list in lists {
                for i in 0..list.len() {
                    rows.push(EventRow {
                        session: session.id(),
                        channel: channel.name().to_string(),
                        timestamp_ms: list.time(i),
                        value: list.physical(i),
                    });
                }
            }
        }
        rows
    }

    pub fn format<'a, I>(&self, sessions: I) -> (Vec<SessionRow>, Vec<EventRow>)
    where
        I: IntoIterator<Item = &'a Session>,
    {
        let mut session_rows = Vec::new();
        let mut event_rows = Vec::new();
        for session in sessions {
            session_rows.push(self.session_row(session));
            event_rows.extend(self.event_rows(session));
        }
        (session_rows, event_rows)
    }
}
