//! Where finished sessions go.
//!
//! The decoder does not persist anything itself. An importer hands each
//! device's completed sessions to a [`SessionSink`], which also answers
//! whether a day is already claimed by another device.

use crate::error::Result;
use crate::models::{DeviceInfo, Session};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Receiver of imported sessions.
pub trait SessionSink {
    /// Whether `serial` is already registered.
    fn has_device(&self, serial: &str) -> bool;

    /// Whether a device other than `serial` already has sessions on `day`.
    fn day_taken(&self, serial: &str, day: NaiveDate) -> bool;

    /// Store a device's sessions. Returns how many were new.
    fn commit(&mut self, device: &DeviceInfo, sessions: Vec<Session>) -> Result<usize>;
}

/// Sessions of one device inside a [`MemoryProfile`].
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub info: DeviceInfo,
    pub sessions: BTreeMap<i64, Session>,
}

impl DeviceRecord {
    pub fn days(&self) -> BTreeSet<NaiveDate> {
        self.sessions.values().map(|s| s.date).collect()
    }
}

/// A [`SessionSink`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryProfile {
    devices: BTreeMap<String, DeviceRecord>,
}

impl MemoryProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(&self, serial: &str) -> Option<&DeviceRecord> {
        self.devices.get(serial)
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.values()
    }

    pub fn session_count(&self) -> usize {
        self.devices.values().map(|d| d.sessions.len()).sum()
    }
}

impl SessionSink for MemoryProfile {
    fn has_device(&self, serial: &str) -> bool {
        self.devices.contains_key(serial)
    }

    fn day_taken(&self, serial: &str, day: NaiveDate) -> bool {
        self.devices
            .iter()
            .filter(|(s, _)| s.as_str() != serial)
            .any(|(_, record)| record.sessions.values().any(|s| s.date == day))
    }

    fn commit(&mut self, device: &DeviceInfo, sessions: Vec<Session>) -> Result<usize> {
        let record = self
            .devices
            .entry(device.serial.clone())
            .or_insert_with(|| DeviceRecord {
                info: device.clone(),
                sessions: BTreeMap::new(),
            });

        let mut added = 0;
        for session in sessions {
            if !record.sessions.contains_key(&session.id()) {
                record.sessions.insert(session.id(), session);
                added += 1;
            }
        }
        Ok(added)
    }
}
