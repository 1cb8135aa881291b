//! Bounded worker pool: filter → cache → extract on miss → cache put, per entity.

use log::{debug, error, warn};
use rayon::prelude::*;
use std::time::Duration;

use crate::error::{HarvestError, HarvestResult};
use crate::extract::{RecordExtractor, accepts};
use crate::pacing::uniform;
use crate::store::ResultCache;
use crate::types::{Entity, ExtractedRecord, FilterCriteria};
use crate::utils::config::WorkerLimits;

#[derive(Debug)]
pub enum Outcome {
    Accepted(ExtractedRecord),
    Filtered,
    /// Extraction kept failing; the entity is a loss for this run.
    Failed(HarvestError),
}

/// Everything a worker needs for one batch. Borrowed; workers never own shared state.
pub struct BatchJob<'a> {
    pub account: &'a str,
    pub filter: &'a FilterCriteria,
    pub cache: &'a ResultCache,
    pub extractor: &'a dyn RecordExtractor,
    pub max_retries: u32,
    pub backoff: (Duration, Duration),
}

/// Build the pool: `workers` threads, or min(4, available parallelism).
pub fn build_pool(workers: Option<usize>) -> HarvestResult<rayon::ThreadPool> {
    let n = workers
        .filter(|n| *n > 0)
        .unwrap_or_else(WorkerLimits::default_workers);
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .thread_name(|i| format!("harvest-worker-{i}"))
        .build()
        .map_err(|e| HarvestError::Config(format!("worker pool: {e}")))
}

fn extract_with_retries(job: &BatchJob<'_>, entity: &Entity) -> Outcome {
    let attempts = job.max_retries.max(1);
    let mut last_reason = String::new();
    for attempt in 1..=attempts {
        match job.extractor.extract_record(entity, job.account) {
            Ok(record) => {
                if let Err(e) = job.cache.put(&entity.id, &record) {
                    warn!("[{}] cache write for {}: {}", job.account, entity.id, e);
                }
                return Outcome::Accepted(record);
            }
            Err(e) => {
                warn!(
                    "[{}] extract {} failed (attempt {}/{}): {}",
                    job.account, entity.id, attempt, attempts, e
                );
                last_reason = e.to_string();
                if attempt < attempts {
                    std::thread::sleep(uniform(job.backoff.0, job.backoff.1));
                }
            }
        }
    }
    error!(
        "[{}] giving up on {} after {} attempts",
        job.account, entity.id, attempts
    );
    Outcome::Failed(HarvestError::ExtractionFailed {
        id: entity.id.clone(),
        attempts,
        reason: last_reason,
    })
}

pub fn process_entity(job: &BatchJob<'_>, entity: &Entity) -> Outcome {
    if !accepts(entity, job.filter) {
        return Outcome::Filtered;
    }
    if let Some(record) = job.cache.get(&entity.id) {
        debug!("[{}] cache hit {}", job.account, entity.id);
        return Outcome::Accepted(record);
    }
    extract_with_retries(job, entity)
}

/// Run one batch on `pool`. Outcomes come back in batch order.
pub fn process_batch(
    pool: &rayon::ThreadPool,
    job: &BatchJob<'_>,
    batch: &[Entity],
) -> Vec<Outcome> {
    pool.install(|| {
        batch
            .par_iter()
            .map(|entity| process_entity(job, entity))
            .collect()
    })
}
