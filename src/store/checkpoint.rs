//! Durable progress record: load, throttled atomic save, delete.

use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{HarvestError, HarvestResult};
use crate::types::{Checkpoint, HarvestConfig};
use crate::utils::tempfiles::{remove_stale_temp, write_atomic};

/// Pause between attempts of a failed checkpoint read or write.
const IO_RETRY_DELAY: Duration = Duration::from_millis(200);

pub struct CheckpointStore {
    path: PathBuf,
    interval: Duration,
    max_retries: u32,
    last_saved: Option<Instant>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>, interval: Duration, max_retries: u32) -> Self {
        Self {
            path: path.into(),
            interval,
            max_retries: max_retries.max(1),
            last_saved: None,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            config.checkpoint_path(),
            config.checkpoint_interval,
            config.max_retries,
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when no checkpoint exists. Malformed content is `CorruptCheckpoint`; a file that
    /// exists but cannot be read after every retry is `CheckpointUnreadable`.
    pub fn load(&self) -> HarvestResult<Option<Checkpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut attempt = 0;
        let text = loop {
            attempt += 1;
            match fs::read_to_string(&self.path) {
                Ok(text) => break text,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                // Invalid UTF-8 will not improve with retries.
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Err(HarvestError::CorruptCheckpoint {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) if attempt >= self.max_retries => {
                    return Err(HarvestError::CheckpointUnreadable {
                        path: self.path.clone(),
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        "read checkpoint {} (attempt {}/{}): {}",
                        self.path.display(),
                        attempt,
                        self.max_retries,
                        e
                    );
                    thread::sleep(IO_RETRY_DELAY);
                }
            }
        };
        let checkpoint: Checkpoint =
            serde_json::from_str(&text).map_err(|e| HarvestError::CorruptCheckpoint {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        debug!(
            "Loaded checkpoint {}: {} results, {} processed ids",
            self.path.display(),
            checkpoint.results.len(),
            checkpoint.processed_ids.len()
        );
        Ok(Some(checkpoint))
    }

    /// Persist `checkpoint`. Unforced saves are skipped (returning `Ok(false)`) until the save
    /// interval has passed since the last persisted save.
    pub fn save(&mut self, checkpoint: &Checkpoint, force: bool) -> HarvestResult<bool> {
        if !force
            && let Some(last) = self.last_saved
            && last.elapsed() <= self.interval
        {
            return Ok(false);
        }
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match write_atomic(&self.path, &bytes) {
                Ok(()) => break,
                Err(e) if attempt >= self.max_retries => {
                    return Err(HarvestError::CheckpointWriteFailed {
                        path: self.path.clone(),
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        "write checkpoint {} (attempt {}/{}): {}",
                        self.path.display(),
                        attempt,
                        self.max_retries,
                        e
                    );
                    thread::sleep(IO_RETRY_DELAY);
                }
            }
        }
        self.last_saved = Some(Instant::now());
        debug!(
            "Checkpoint saved ({} results, {} processed{})",
            checkpoint.results.len(),
            checkpoint.processed_ids.len(),
            if force { ", forced" } else { "" }
        );
        Ok(true)
    }

    /// Remove the durable record and any leftover temp file.
    pub fn delete(&mut self) -> HarvestResult<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        remove_stale_temp(&self.path)?;
        self.last_saved = None;
        Ok(())
    }
}
