use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use super::RecordSink;
use crate::types::{Column, ExtractedRecord};
use crate::utils::tempfiles::write_atomic;

/// JSON array of objects keyed by column name.
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

/// Typed JSON value for one cell: numbers and flags stay numbers and flags.
pub fn column_json(column: Column, record: &ExtractedRecord) -> Value {
    match column {
        Column::IsBusiness => Value::Bool(record.is_business),
        Column::IsVerified => Value::Bool(record.is_verified),
        Column::Uid => Value::from(record.uid),
        Column::FollowersCount => Value::from(record.followers_count),
        Column::Value => Value::from(record.value),
        other => Value::String(other.value_of(record)),
    }
}

pub fn record_json(record: &ExtractedRecord, columns: &[Column]) -> Value {
    let row: Map<String, Value> = columns
        .iter()
        .map(|c| (c.name().to_string(), column_json(*c, record)))
        .collect();
    Value::Object(row)
}

impl RecordSink for JsonSink {
    fn write(&mut self, records: &[ExtractedRecord], columns: &[Column]) -> Result<usize> {
        let rows: Vec<Value> = records.iter().map(|r| record_json(r, columns)).collect();
        let bytes = serde_json::to_vec_pretty(&rows).context("serialize records")?;
        write_atomic(&self.path, &bytes)
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(rows.len())
    }
}
