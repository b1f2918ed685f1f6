//! Output formats for decoded sessions.

pub mod parquet;
