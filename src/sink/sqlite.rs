//! SQLite sink: one `followers` table, replaced on every write.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use super::RecordSink;
use crate::types::{Column, ExtractedRecord};

pub const TABLE: &str = "followers";

pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

fn sql_type(column: Column) -> &'static str {
    match column {
        Column::Uid | Column::FollowersCount => "INTEGER",
        Column::Value => "REAL",
        _ => "TEXT",
    }
}

/// Column names carry dots (`email.1`), so every identifier is quoted.
fn quoted(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table_sql(columns: &[Column]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {}", quoted(c.name()), sql_type(*c)))
        .collect();
    format!("CREATE TABLE {TABLE} ({})", defs.join(", "))
}

fn insert_sql(columns: &[Column]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quoted(c.name())).collect();
    let slots: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {TABLE} ({}) VALUES ({})",
        names.join(", "),
        slots.join(", ")
    )
}

impl RecordSink for SqliteSink {
    fn write(&mut self, records: &[ExtractedRecord], columns: &[Column]) -> Result<usize> {
        let mut conn = Connection::open(&self.path)
            .with_context(|| format!("open database {}", self.path.display()))?;
        let tx = conn.transaction().context("begin transaction")?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {TABLE};"))
            .context("drop table")?;
        tx.execute_batch(&create_table_sql(columns))
            .context("create table")?;
        {
            let mut stmt = tx.prepare(&insert_sql(columns)).context("prepare insert")?;
            for record in records {
                let values = columns.iter().map(|c| c.value_of(record));
                stmt.execute(rusqlite::params_from_iter(values))
                    .with_context(|| format!("insert {}", record.username))?;
            }
        }
        tx.commit().context("commit transaction")?;
        Ok(records.len())
    }
}
