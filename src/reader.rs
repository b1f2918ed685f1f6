//! High-level API for importing an ICON SD card.
//!
//! The card holds `FPHCARE/ICON/<serial>/` directories, one per device.
//! Within a device directory files are told apart by name prefix:
//!
//! - `SUM*` summary files create sessions
//! - `DET*` detail files add two-minute pressure, leak and event samples
//! - `FLW*` flow files add the flow-rate waveform
//! - `LOG*` files are not decoded
//!
//! Summary files are decoded as they are found, then every detail file, then
//! every flow file, each group in name order. The later groups only ever look
//! sessions up, so this order is required.

use crate::checksum::{ChecksumStatus, HEADER_LEN};
use crate::detail::DetailParser;
use crate::error::{Error, Result};
use crate::flow::FlowParser;
use crate::models::{DeviceInfo, ParseReport};
use crate::profile::SessionSink;
use crate::store::SessionStore;
use crate::summary::SummaryParser;
use crate::timestamp::{DeviceClock, TimestampCodec};
use log::{debug, error, info, warn};
use memmap2::Mmap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const CARD_DIR: &str = "FPHCARE";
const DEVICE_FAMILY_DIR: &str = "ICON";

/// Kind of file in a device directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Summary,
    Detail,
    Flow,
    Log,
}

impl FileKind {
    /// Classify a file by the case-insensitive first three characters of its name.
    pub fn classify(name: &str) -> Option<Self> {
        let prefix: String = name.chars().take(3).collect::<String>().to_ascii_uppercase();
        match prefix.as_str() {
            "SUM" => Some(FileKind::Summary),
            "DET" => Some(FileKind::Detail),
            "FLW" => Some(FileKind::Flow),
            "LOG" => Some(FileKind::Log),
            _ => None,
        }
    }
}

/// Resolve a card root, `FPHCARE` directory, or `ICON` directory to the
/// directory holding the serial-number folders.
///
/// # Errors
///
/// Returns [`Error::NotFound`] when no readable ICON directory exists there.
pub fn locate<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    let icon = if path.ends_with(DEVICE_FAMILY_DIR) {
        path.to_path_buf()
    } else if path.ends_with(CARD_DIR) {
        path.join(DEVICE_FAMILY_DIR)
    } else {
        path.join(CARD_DIR).join(DEVICE_FAMILY_DIR)
    };

    if icon.is_dir() && fs::read_dir(&icon).is_ok() {
        Ok(icon)
    } else {
        Err(Error::NotFound(icon.display().to_string()))
    }
}

/// Names of the entries in `icon_dir` that are device serial numbers
/// (all digits), in name order.
pub fn serial_numbers<P: AsRef<Path>>(icon_dir: P) -> Result<Vec<String>> {
    let mut serials: Vec<String> = fs::read_dir(icon_dir.as_ref())?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
        .collect();
    serials.sort();
    Ok(serials)
}

/// Map a whole file into memory.
///
/// # Errors
///
/// Returns [`Error::ShortFile`] without mapping when the file cannot hold a
/// header.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Mmap> {
    let file = File::open(path.as_ref())?;
    let len = file.metadata()?.len() as usize;
    if len < HEADER_LEN {
        return Err(Error::ShortFile { len });
    }
    // SAFETY: the card is read-only for the duration of an import.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// How many files of each kind a device import saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    pub summary: usize,
    pub detail: usize,
    pub flow: usize,
    pub log: usize,
    /// Files that could not be opened or were too short.
    pub failed: usize,
}

/// Sessions decoded from one device directory, not yet committed.
#[derive(Debug)]
pub struct DeviceImport {
    pub info: DeviceInfo,
    pub store: SessionStore,
    pub files: FileCounts,
}

/// Outcome for one device directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOutcome {
    /// Sessions were committed; `sessions` counts the new ones.
    Imported { serial: String, sessions: usize },
    /// Nothing from this device was kept.
    Rejected { serial: String, reason: String },
}

/// Result of importing a whole card.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub outcomes: Vec<DeviceOutcome>,
}

impl ImportSummary {
    /// Number of devices whose sessions were committed.
    pub fn devices(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, DeviceOutcome::Imported { .. }))
            .count()
    }

    /// Number of new sessions across all devices.
    pub fn sessions(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                DeviceOutcome::Imported { sessions, .. } => *sessions,
                DeviceOutcome::Rejected { .. } => 0,
            })
            .sum()
    }
}

/// Imports ICON device directories.
///
/// # Examples
///
/// ```no_run
/// use fpicon_parser::{IconImporter, MemoryProfile};
///
/// let mut profile = MemoryProfile::new();
/// let summary = IconImporter::new().import("/media/sdcard", &mut profile)?;
/// println!("{} sessions", summary.sessions());
/// # Ok::<(), fpicon_parser::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct IconImporter {
    codec: TimestampCodec,
}

impl IconImporter {
    /// Create an importer that reads device stamps as host local time.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> IconImporterBuilder {
        IconImporterBuilder::new()
    }

    pub fn clock(&self) -> DeviceClock {
        self.codec.clock()
    }

    /// Decode one serial-number directory into a fresh [`SessionStore`].
    ///
    /// Files that fail to open or are too short are logged and counted; the
    /// rest of the directory is still decoded.
    pub fn import_device<P: AsRef<Path>>(&self, dir: P) -> Result<DeviceImport> {
        let dir = dir.as_ref();
        let serial = dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        debug!("Opening ICON {} at {}", serial, dir.display());

        let mut entries: Vec<(String, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                Some((name, entry.path()))
            })
            .collect();
        entries.sort();

        let mut store = SessionStore::new();
        let mut files = FileCounts::default();
        let mut details = Vec::new();
        let mut flows = Vec::new();

        for (name, path) in entries {
            match FileKind::classify(&name) {
                Some(FileKind::Summary) => {
                    files.summary += 1;
                    self.run(FileKind::Summary, &path, &mut store, &mut files);
                }
                Some(FileKind::Detail) => {
                    files.detail += 1;
                    details.push(path);
                }
                Some(FileKind::Flow) => {
                    files.flow += 1;
                    flows.push(path);
                }
                Some(FileKind::Log) => files.log += 1,
                None => debug!("Ignoring {}", name),
            }
        }

        for path in &details {
            self.run(FileKind::Detail, path, &mut store, &mut files);
        }
        for path in &flows {
            self.run(FileKind::Flow, path, &mut store, &mut files);
        }

        Ok(DeviceImport {
            info: DeviceInfo::icon(&serial),
            store,
            files,
        })
    }

    /// Decode one file into `store`.
    pub fn parse_file<P: AsRef<Path>>(
        &self,
        kind: FileKind,
        path: P,
        store: &mut SessionStore,
    ) -> Result<ParseReport> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let data = read_file(path)?;

        match kind {
            FileKind::Summary => SummaryParser::new(self.codec).parse(&data, &name, store),
            FileKind::Detail => DetailParser::new(self.codec).parse(&data, &name, store),
            FileKind::Flow => FlowParser::new(self.codec).parse(&data, &name, store),
            FileKind::Log => Ok(ParseReport::new(ChecksumStatus::Valid)),
        }
    }

    fn run(&self, kind: FileKind, path: &Path, store: &mut SessionStore, files: &mut FileCounts) {
        match self.parse_file(kind, path, store) {
            Ok(report) => debug!(
                "{}: {} records, {} sessions, {} skipped",
                path.display(),
                report.records,
                report.sessions,
                report.skipped
            ),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                files.failed += 1;
            }
        }
    }

    /// Hand a decoded device to `sink`.
    ///
    /// A device the sink has not seen before must not share any day with
    /// another device's sessions. On overlap nothing is committed and
    /// [`Error::OverlappingDays`] is returned; the decoded sessions are dropped.
    pub fn commit<S: SessionSink>(&self, import: DeviceImport, sink: &mut S) -> Result<usize> {
        let serial = &import.info.serial;
        if !sink.has_device(serial) {
            if let Some(day) = import.store.dates().find(|day| sink.day_taken(serial, *day)) {
                return Err(Error::OverlappingDays {
                    serial: serial.clone(),
                    day,
                });
            }
        }
        sink.commit(&import.info, import.store.into_sessions())
    }

    /// Import every device found under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when `path` holds no ICON directory.
    /// Per-device failures are reported in the summary instead.
    pub fn import<P: AsRef<Path>, S: SessionSink>(&self, path: P, sink: &mut S) -> Result<ImportSummary> {
        let icon = locate(path)?;
        let mut summary = ImportSummary::default();

        for serial in serial_numbers(&icon)? {
            let result = self.import_device(icon.join(&serial));
            summary.outcomes.push(self.finish(serial, result, sink));
        }

        Ok(summary)
    }

    /// Import every device under `path`, decoding devices in parallel.
    ///
    /// Each device is decoded on a blocking worker with its own store.
    /// Commits happen one at a time, in serial order, on the calling task.
    #[cfg(feature = "tokio-runtime")]
    pub async fn import_concurrent<P: AsRef<Path>, S: SessionSink>(
        &self,
        path: P,
        sink: &mut S,
    ) -> Result<ImportSummary> {
        let icon = locate(path)?;
        let mut tasks = tokio::task::JoinSet::new();
        for serial in serial_numbers(&icon)? {
            let importer = *self;
            let dir = icon.join(&serial);
            tasks.spawn_blocking(move || (serial, importer.import_device(dir)));
        }

        let mut imports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let done = joined.map_err(|e| Error::Other(format!("Import worker failed: {}", e)))?;
            imports.push(done);
        }
        imports.sort_by(|a, b| a.0.cmp(&b.0));

        let mut summary = ImportSummary::default();
        for (serial, result) in imports {
            summary.outcomes.push(self.finish(serial, result, sink));
        }
        Ok(summary)
    }

    fn finish<S: SessionSink>(
        &self,
        serial: String,
        result: Result<DeviceImport>,
        sink: &mut S,
    ) -> DeviceOutcome {
        let outcome = result.and_then(|import| {
            let decoded = import.store.len();
            self.commit(import, sink).map(|added| (decoded, added))
        });

        match outcome {
            Ok((decoded, sessions)) => {
                info!(
                    "ICON {}: {} sessions decoded, {} new",
                    serial, decoded, sessions
                );
                DeviceOutcome::Imported { serial, sessions }
            }
            Err(Error::OverlappingDays { day, .. }) => {
                warn!(
                    "This machine record cannot be imported in this profile: the day records \
                     overlap with already existing content (ICON {}, {})",
                    serial, day
                );
                DeviceOutcome::Rejected {
                    serial,
                    reason: format!("day records overlap existing content on {}", day),
                }
            }
            Err(e) => {
                error!("ICON {}: {}", serial, e);
                DeviceOutcome::Rejected {
                    serial,
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Builder for configuring an [`IconImporter`].
///
/// # Examples
///
/// ```no_run
/// use fpicon_parser::{DeviceClock, IconImporterBuilder};
///
/// let importer = IconImporterBuilder::new()
///     .clock(DeviceClock::Utc)
///     .build();
/// ```
pub struct IconImporterBuilder {
    clock: DeviceClock,
}

impl IconImporterBuilder {
    pub fn new() -> Self {
        Self {
            clock: DeviceClock::Local,
        }
    }

    /// Set how device wall-clock stamps map to UTC. Default is host local time.
    pub fn clock(mut self, clock: DeviceClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> IconImporter {
        IconImporter {
            codec: TimestampCodec::new(self.clock),
        }
    }
}

impl Default for IconImporterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
