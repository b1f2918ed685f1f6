//! Command-line interface for the ICON decoder.
//!
//! Imports every device on an ICON SD card, reports what was found, and
//! optionally writes each device's sessions to Parquet.

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use clap::Parser;
use fpicon_parser::formatter::Formatter;
use fpicon_parser::{
    DeviceClock, DeviceOutcome, IconImporter, MemoryProfile, ParquetWriter, Session,
};
use log::{info, LevelFilter};
use std::path::Path;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Decode Fisher & Paykel ICON CPAP SD-card records",
    long_about = "Decodes the summary, detail and flow files an ICON device writes under \
                  FPHCARE/ICON/<serial>/ into therapy sessions.\n\n\
                  Sessions can be exported to Parquet for analysis."
)]
struct Args {
    /// SD card root, FPHCARE directory, or ICON directory
    #[arg(value_name = "PATH")]
    path: String,

    /// Root output directory for Parquet files, one subdirectory per device
    #[arg(short, long, value_name = "OUT_ROOT")]
    out_root: Option<String>,

    /// Number of event rows per Parquet file chunk
    #[arg(long, default_value = "50000")]
    chunk_size: usize,

    /// Treat device timestamps as UTC instead of host local time
    #[arg(long, conflicts_with = "utc_offset")]
    utc: bool,

    /// Treat device timestamps as this many minutes east of UTC
    #[arg(long, value_name = "MINUTES", allow_hyphen_values = true)]
    utc_offset: Option<i32>,

    /// Print every session as JSON
    #[arg(long)]
    json: bool,

    /// Log per-file and per-record decisions
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn clock(&self) -> Result<DeviceClock> {
        if self.utc {
            return Ok(DeviceClock::Utc);
        }
        match self.utc_offset {
            Some(minutes) => {
                let offset = FixedOffset::east_opt(minutes * 60)
                    .ok_or_else(|| anyhow::anyhow!("UTC offset out of range: {} minutes", minutes))?;
                Ok(DeviceClock::Fixed(offset))
            }
            None => Ok(DeviceClock::Local),
        }
    }
}

fn describe(session: &Session) -> String {
    let start = DateTime::from_timestamp_millis(session.first)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    format!(
        "{} │ {} │ {:>5} min │ {:?}",
        session.id(),
        start,
        session.duration_secs() / 60,
        session.mode()
    )
}

fn export_device(serial: &str, sessions: &[Session], out_root: &Path, chunk_size: usize) -> Result<()> {
    let output_dir = out_root.join(format!("serial={}", serial));
    let t0 = Instant::now();
    let stats = ParquetWriter::new(&output_dir, serial)
        .chunk_size(chunk_size)
        .write_with_stats(sessions)?;
    info!("   ├─ {}", stats.summary());
    info!("   └─ ✓ Wrote Parquet in {:.2?}", t0.elapsed());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger
    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let importer = IconImporter::builder().clock(args.clock()?).build();
    let mut profile = MemoryProfile::new();

    info!("");
    info!("╔════════════════════════════════════════════╗");
    info!("║       F&P ICON Session Decoder             ║");
    info!("╚════════════════════════════════════════════╝");
    info!("");
    info!("📂 Card: {}", args.path);
    info!("🕒 Device clock: {:?}", importer.clock());
    info!("");

    let total_start = Instant::now();
    let summary = importer.import(&args.path, &mut profile)?;

    if summary.outcomes.is_empty() {
        info!("No ICON devices found under {}", args.path);
        return Ok(());
    }

    for outcome in &summary.outcomes {
        let serial = match outcome {
            DeviceOutcome::Imported { serial, sessions } => {
                info!("📟 ICON {}: {} new session(s)", serial, sessions);
                serial
            }
            DeviceOutcome::Rejected { serial, reason } => {
                log::error!("📟 ICON {}: ✗ not imported: {}", serial, reason);
                continue;
            }
        };

        let Some(record) = profile.device(serial) else {
            continue;
        };
        let sessions: Vec<Session> = record.sessions.values().cloned().collect();

        for session in &sessions {
            info!("   ├─ {}", describe(session));
        }

        if args.json {
            let rows: Vec<_> = sessions
                .iter()
                .map(|s| Formatter::new(serial).session_row(s))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }

        if let Some(out_root) = &args.out_root {
            if sessions.is_empty() {
                continue;
            }
            if let Err(e) = export_device(serial, &sessions, Path::new(out_root), args.chunk_size) {
                log::error!("   └─ ✗ Error: {}", e);
            }
        }
    }

    info!("");
    info!("═══════════════════════════════════════════");
    info!(
        "🏁 {} session(s) from {} device(s) in {:.2?}",
        summary.sessions(),
        summary.devices(),
        total_start.elapsed()
    );
    info!("");

    Ok(())
}
