use anyhow::Result;
use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use log::info;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::{create_dir_all, File};
use std::path::Path;
use std::sync::Arc;

use crate::formatter::{EventRow, SessionRow};
use crate::models::CpapMode;

pub struct ParquetFormatter {
    output_directory: String,
    chunk_size: usize,
}

impl ParquetFormatter {
    pub fn new(output_directory: String, chunk_size: usize) -> Self {
        Self {
            output_directory,
            chunk_size,
        }
    }

    /// Write `sessions.parquet` and `events_partNNN.parquet` files.
    pub fn convert(&self, sessions: &[SessionRow], events: &[EventRow]) -> Result<usize> {
        if sessions.is_empty() {
            anyhow::bail!("No sessions to write to Parquet");
        }

        create_dir_all(&self.output_directory)?;
        let dir = Path::new(&self.output_directory);

        self.write_sessions(sessions, &dir.join("sessions.parquet"))?;

        let total_chunks = events.len().div_ceil(self.chunk_size);
        info!(
            "Writing {} events across {} chunk file(s)",
            events.len(),
            total_chunks
        );

        for (i, chunk) in events.chunks(self.chunk_size).enumerate() {
            info!(
                "Writing chunk {}/{}, {} rows",
                i + 1,
                total_chunks,
                chunk.len()
            );
            let output_path = dir.join(format!("events_part{:03}.parquet", i));
            self.write_events(chunk, &output_path)?;
        }

        Ok(total_chunks)
    }

    fn write_sessions(&self, rows: &[SessionRow], output_path: &Path) -> Result<()> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("serial", DataType::Utf8, false),
            Field::new("session", DataType::Int64, false),
            Field::new("date", DataType::Utf8, false),
            Field::new("start_ms", DataType::Int64, false),
            Field::new("end_ms", DataType::Int64, false),
            Field::new("mode", DataType::Utf8, true),
            Field::new("pressure", DataType::Float64, true),
            Field::new("pressure_min", DataType::Float64, true),
            Field::new("pressure_max", DataType::Float64, true),
            Field::new("obstructive", DataType::UInt32, true),
            Field::new("hypopnea", DataType::UInt32, true),
            Field::new("detail_samples", DataType::UInt64, false),
            Field::new("flow_samples", DataType::UInt64, false),
        ]));

        let mode_name = |mode: &CpapMode| match mode {
            CpapMode::Cpap => "CPAP",
            CpapMode::Apap => "APAP",
        };

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.serial.as_str()))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.session))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.date.as_str()))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.start_ms))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.end_ms))),
            Arc::new(StringArray::from(
                rows.iter()
                    .map(|r| r.mode.as_ref().map(mode_name))
                    .collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.pressure).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.pressure_min).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.pressure_max).collect::<Vec<_>>())),
            Arc::new(UInt32Array::from(rows.iter().map(|r| r.obstructive).collect::<Vec<_>>())),
            Arc::new(UInt32Array::from(rows.iter().map(|r| r.hypopnea).collect::<Vec<_>>())),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.detail_samples as u64))),
            Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.flow_samples as u64))),
        ];

        write_batch(schema, arrays, output_path)
    }

    fn write_events(&self, rows: &[EventRow], output_path: &Path) -> Result<()> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("session", DataType::Int64, false),
            Field::new("channel", DataType::Utf8, false),
            Field::new("timestamp_ms", DataType::Int64, false),
            Field::new("value", DataType::Float64, false),
        ]));

        let num_rows = rows.len();
        let mut session_vec = Vec::with_capacity(num_rows);
        let mut channel_vec = Vec::with_capacity(num_rows);
        let mut timestamp_vec = Vec::with_capacity(num_rows);
        let mut value_vec = Vec::with_capacity(num_rows);

        for row in rows {
            session_vec.push(row.session);
            channel_vec.push(row.channel.as_str());
            timestamp_vec.push(row.timestamp_ms);
            value_vec.push(row.value);
        }

        let arrays: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(session_vec)),
            Arc::new(StringArray::from(channel_vec)),
            Arc::new(Int64Array::from(timestamp_vec)),
            Arc::new(Float64Array::from(value_vec)),
        ];

        write_batch(schema, arrays, output_path)
    }
}

fn write_batch(schema: Arc<Schema>, arrays: Vec<ArrayRef>, output_path: &Path) -> Result<()> {
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let file = File::create(output_path)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}
