//! In-memory session registry for one device import.

use crate::models::{Session, SessionId};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Sessions of one device, indexed by start time and by calendar day.
///
/// Only the summary parser inserts. Detail and flow parsers look sessions up
/// and mutate them in place.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: BTreeMap<SessionId, Session>,
    by_date: BTreeMap<NaiveDate, Vec<SessionId>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Returns `false` and drops it if the key is taken.
    pub fn insert(&mut self, session: Session) -> bool {
        let id = session.id();
        if self.sessions.contains_key(&id) {
            return false;
        }
        self.by_date.entry(session.date).or_default().push(id);
        self.sessions.insert(id, session);
        true
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    /// Keys of the sessions that started on `date`, oldest first.
    pub fn ids_on(&self, date: NaiveDate) -> Vec<SessionId> {
        let mut ids = self.by_date.get(&date).cloned().unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Days covered by at least one session, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.by_date.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Hand the sessions off, oldest first.
    pub fn into_sessions(self) -> Vec<Session> {
        self.sessions.into_values().collect()
    }
}
