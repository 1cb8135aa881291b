//! Output sinks: hand an ordered slice of records to a file format.

pub mod csv_sink;
pub mod json;
pub mod sqlite;

pub use csv_sink::CsvSink;
pub use json::JsonSink;
pub use sqlite::SqliteSink;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{Column, ExtractedRecord};

pub trait RecordSink {
    /// Write `records` restricted to `columns`, replacing previous output. Returns rows written.
    fn write(&mut self, records: &[ExtractedRecord], columns: &[Column]) -> Result<usize>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Sqlite,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub format: OutputFormat,
    /// Empty: all columns.
    pub columns: Vec<Column>,
}

impl OutputConfig {
    pub fn open(&self) -> Box<dyn RecordSink> {
        match self.format {
            OutputFormat::Csv => Box::new(CsvSink::new(&self.path)),
            OutputFormat::Json => Box::new(JsonSink::new(&self.path)),
            OutputFormat::Sqlite => Box::new(SqliteSink::new(&self.path)),
        }
    }

    pub fn write(&self, records: &[ExtractedRecord]) -> Result<usize> {
        self.open().write(records, &Column::resolve(&self.columns))
    }
}
