//! # FP ICON Parser
//!
//! A Rust library for decoding the therapy records a Fisher & Paykel ICON
//! CPAP device writes to its SD card: session boundaries, summary statistics,
//! two-minute event timelines and the flow-rate waveform.
//!
//! ## Features
//!
//! - **Three file kinds**: summary (`SUM*`), detail (`DET*`) and flow (`FLW*`)
//!   files cross-referenced by timestamp
//! - **Non-fatal checks**: header checksum mismatches and malformed records are
//!   logged and skipped, never turned into made-up values
//! - **Explicit state**: every import owns its own [`SessionStore`], so devices
//!   can be decoded in parallel
//! - **Parquet output**: sessions and events exported for analysis
//!
//! ## Quick Start
//!
//! ```no_run
//! use fpicon_parser::{IconImporter, MemoryProfile};
//!
//! let mut profile = MemoryProfile::new();
//! let summary = IconImporter::new().import("/media/sdcard", &mut profile)?;
//!
//! println!("Imported {} sessions from {} devices", summary.sessions(), summary.devices());
//! # Ok::<(), fpicon_parser::Error>(())
//! ```
//!
//! ## Low-Level Access
//!
//! Each parser works on raw bytes against a caller-owned store:
//!
//! ```no_run
//! use fpicon_parser::{SessionStore, SummaryParser, TimestampCodec, DeviceClock};
//!
//! let data = std::fs::read("SUM0001.FPH")?;
//! let mut store = SessionStore::new();
//! let report = SummaryParser::new(TimestampCodec::new(DeviceClock::Utc))
//!     .parse(&data, "SUM0001.FPH", &mut store)?;
//!
//! println!("{} sessions, checksum ok: {}", report.sessions, report.checksum.is_valid());
//! # Ok::<(), fpicon_parser::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use fpicon_parser::{IconImporter, MemoryProfile, Error};
//!
//! let mut profile = MemoryProfile::new();
//! match IconImporter::new().import("/media/sdcard", &mut profile) {
//!     Ok(summary) => println!("{} sessions", summary.sessions()),
//!     Err(Error::NotFound(path)) => eprintln!("No ICON data at {}", path),
//!     Err(err) => eprintln!("Error: {}", err),
//! }
//! ```

// Public API modules
pub mod error;
pub mod reader;
pub mod writer;

// Re-export commonly used types
pub use error::{Error, Result};
pub use reader::{DeviceImport, DeviceOutcome, FileKind, IconImporter, IconImporterBuilder, ImportSummary};
pub use writer::{ParquetWriter, ParquetWriterBuilder, WriteStats};

pub use models::{Channel, CpapMode, DeviceInfo, EventKind, EventList, ParseReport, Session, SessionId, Setting};
pub use profile::{MemoryProfile, SessionSink};
pub use store::SessionStore;

pub use detail::DetailParser;
pub use flow::FlowParser;
pub use summary::SummaryParser;
pub use timestamp::{DeviceClock, TimestampCodec};

// Decoding building blocks (public but not part of the high-level API)
pub mod checksum;
pub mod detail;
pub mod flow;
pub mod formats;
pub mod formatter;
pub mod models;
pub mod profile;
pub mod store;
pub mod summary;
pub mod timestamp;
