//! High-level API for exporting decoded sessions.

use crate::error::{Error, Result};
use crate::formats::parquet::ParquetFormatter;
use crate::formatter::Formatter;
use crate::models::Session;
use std::path::Path;

/// Writer for exporting one device's sessions to Apache Parquet.
///
/// Produces `sessions.parquet` with one row per session and
/// `events_part000.parquet`, `events_part001.parquet`, ... with one row per
/// event or waveform sample.
///
/// # Examples
///
/// ```no_run
/// use fpicon_parser::{IconImporter, ParquetWriter};
///
/// let import = IconImporter::new().import_device("/media/sdcard/FPHCARE/ICON/20121234")?;
/// let sessions = import.store.into_sessions();
///
/// ParquetWriter::new("output_dir", "20121234")
///     .write(&sessions)?;
/// # Ok::<(), fpicon_parser::Error>(())
/// ```
pub struct ParquetWriter {
    output_directory: String,
    serial: String,
    chunk_size: usize,
}

impl ParquetWriter {
    /// Create a writer for device `serial` targeting `output_directory`.
    pub fn new<P: AsRef<Path>>(output_directory: P, serial: &str) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_string_lossy().to_string(),
            serial: serial.to_string(),
            chunk_size: 50_000, // Default chunk size
        }
    }

    /// Set the number of event rows per Parquet file. Default is 50,000.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Write the sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if `sessions` is empty or the files cannot be written.
    pub fn write(self, sessions: &[Session]) -> Result<()> {
        self.write_with_stats(sessions).map(|_| ())
    }

    /// Write the sessions and report what was written.
    pub fn write_with_stats(self, sessions: &[Session]) -> Result<WriteStats> {
        let (session_rows, event_rows) = Formatter::new(&self.serial).format(sessions);

        let formatter = ParquetFormatter::new(self.output_directory, self.chunk_size);
        let num_chunks = formatter
            .convert(&session_rows, &event_rows)
            .map_err(|e| Error::OutputError(e.to_string()))?;

        Ok(WriteStats {
            num_sessions: session_rows.len(),
            num_events: event_rows.len(),
            num_chunks,
            chunk_size: self.chunk_size,
        })
    }
}

/// Statistics about a Parquet write operation.
#[derive(Debug, Clone)]
pub struct WriteStats {
    pub num_sessions: usize,
    /// Total event and waveform rows written
    pub num_events: usize,
    /// Number of event files created
    pub num_chunks: usize,
    pub chunk_size: usize,
}

impl WriteStats {
    /// Get a human-readable summary of the write operation.
    pub fn summary(&self) -> String {
        format!(
            "Wrote {} sessions and {} events across {} file(s) ({} rows per file)",
            self.num_sessions, self.num_events, self.num_chunks, self.chunk_size
        )
    }
}

/// Builder for configuring Parquet write options.
///
/// # Examples
///
/// ```no_run
/// use fpicon_parser::ParquetWriterBuilder;
///
/// let writer = ParquetWriterBuilder::new()
///     .output_directory("./output")
///     .serial("20121234")
///     .chunk_size(75_000)
///     .build()?;
/// # Ok::<(), fpicon_parser::Error>(())
/// ```
pub struct ParquetWriterBuilder {
    output_directory: Option<String>,
    serial: String,
    chunk_size: usize,
}

impl ParquetWriterBuilder {
    pub fn new() -> Self {
        Self {
            output_directory: None,
            serial: String::new(),
            chunk_size: 50_000,
        }
    }

    pub fn output_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_directory = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn serial(mut self, serial: &str) -> Self {
        self.serial = serial.to_string();
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Build the Parquet writer.
    ///
    /// # Errors
    ///
    /// Returns an error if output_directory was not set.
    pub fn build(self) -> Result<ParquetWriter> {
        let output_directory = self
            .output_directory
            .ok_or_else(|| Error::Other("Output directory not set".to_string()))?;

        Ok(ParquetWriter::new(output_directory, &self.serial).chunk_size(self.chunk_size))
    }
}

impl Default for ParquetWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
