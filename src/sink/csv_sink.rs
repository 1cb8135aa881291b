use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};

use super::RecordSink;
use crate::types::{Column, ExtractedRecord};
use crate::utils::tempfiles::write_atomic;

/// CSV with a header row of column names (`email.1`, `ct`, ...).
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

/// Header plus one row per record, in record order.
pub fn render_csv(records: &[ExtractedRecord], columns: &[Column]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(columns.iter().map(|c| c.name()))
        .context("write csv header")?;
    for record in records {
        writer
            .write_record(columns.iter().map(|c| c.value_of(record)))
            .with_context(|| format!("write csv row for {}", record.username))?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow!("flush csv: {}", e.error()))
}

impl RecordSink for CsvSink {
    fn write(&mut self, records: &[ExtractedRecord], columns: &[Column]) -> Result<usize> {
        let bytes = render_csv(records, columns)?;
        write_atomic(&self.path, &bytes)
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(records.len())
    }
}
