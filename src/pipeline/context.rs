//! Harvest state owned by the merge step, and the progress events it emits.

use crossbeam_channel::Sender;
use std::collections::HashSet;

use super::workers::Outcome;
use crate::report::RunStats;
use crate::types::{Checkpoint, Entity, EntityId, ExtractedRecord};

/// Run-level transitions observers care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Paused,
    Resumed,
    Completed,
    Interrupted,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HarvestEvent {
    AccountStarted {
        account: String,
        total: Option<u64>,
    },
    /// One merged batch: newly accepted records and how many of them are business / verified.
    Processed {
        delta: usize,
        business: usize,
        verified: usize,
    },
    StateChanged {
        phase: RunPhase,
        /// Records accumulated so far.
        results: usize,
    },
    AccountFailed {
        account: String,
        reason: String,
    },
}

/// Optional event sink. A dropped receiver just means nobody is listening.
#[derive(Clone, Default)]
pub struct EventSender(Option<Sender<HarvestEvent>>);

impl EventSender {
    pub fn new(tx: Sender<HarvestEvent>) -> Self {
        Self(Some(tx))
    }

    pub fn emit(&self, event: HarvestEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Tallies of one merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub accepted: usize,
    pub filtered: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub business: usize,
    pub verified: usize,
}

/// Accumulated results and processed set. Mutated only by the single-threaded merge.
pub struct HarvestState {
    checkpoint: Checkpoint,
    processed: HashSet<EntityId>,
    /// Account being merged; tags the cursor each merge writes.
    account: Option<String>,
    /// Cursor loaded from the checkpoint, applied at most once.
    resume_point: Option<(Option<String>, EntityId)>,
    pub stats: RunStats,
    /// Results appended since the last persisted checkpoint.
    pub new_since_save: usize,
}

impl HarvestState {
    pub fn fresh() -> Self {
        Self::from_checkpoint(Checkpoint::default())
    }

    pub fn from_checkpoint(checkpoint: Checkpoint) -> Self {
        let processed = checkpoint.processed_ids.iter().cloned().collect();
        let resume_point = checkpoint
            .resume_cursor
            .clone()
            .map(|id| (checkpoint.resume_account.clone(), id));
        Self {
            checkpoint,
            processed,
            account: None,
            resume_point,
            stats: RunStats::default(),
            new_since_save: 0,
        }
    }

    pub fn is_processed(&self, id: &EntityId) -> bool {
        self.processed.contains(id)
    }

    pub fn results(&self) -> &[ExtractedRecord] {
        &self.checkpoint.results
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn resume_cursor(&self) -> Option<&EntityId> {
        self.checkpoint.resume_cursor.as_ref()
    }

    pub fn resume_account(&self) -> Option<&str> {
        self.checkpoint.resume_account.as_deref()
    }

    pub fn begin_account(&mut self, account: &str) {
        self.account = Some(account.to_string());
    }

    /// The loaded cursor if it belongs to `account`; consumed on first match. A cursor saved
    /// without an account matches whichever account asks first.
    pub fn take_resume_point(&mut self, account: &str) -> Option<EntityId> {
        match &self.resume_point {
            Some((Some(owner), _)) if owner != account => None,
            Some(_) => self.resume_point.take().map(|(_, id)| id),
            None => None,
        }
    }

    /// Drop the cursor once every account is done, so the next run starts from the top.
    pub fn clear_resume_cursor(&mut self) {
        self.checkpoint.resume_cursor = None;
        self.checkpoint.resume_account = None;
        self.resume_point = None;
    }

    pub fn at_limit(&self, max_results: Option<usize>) -> bool {
        max_results.is_some_and(|max| self.checkpoint.results.len() >= max)
    }

    fn mark_processed(&mut self, id: &EntityId) {
        if self.processed.insert(id.clone()) {
            self.checkpoint.processed_ids.push(id.clone());
        }
    }

    /// Fold a batch's outcomes in batch order. Stops appending at `max_results`; entities past
    /// the limit stay unprocessed and the resume cursor stays before them.
    pub fn merge(
        &mut self,
        batch: &[Entity],
        outcomes: Vec<Outcome>,
        max_results: Option<usize>,
    ) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut last_seen = None;
        for (entity, outcome) in batch.iter().zip(outcomes) {
            if self.at_limit(max_results) {
                break;
            }
            last_seen = Some(&entity.id);
            if self.is_processed(&entity.id) {
                summary.duplicates += 1;
                continue;
            }
            match outcome {
                Outcome::Accepted(record) => {
                    summary.accepted += 1;
                    summary.business += usize::from(record.is_business);
                    summary.verified += usize::from(record.is_verified);
                    self.checkpoint.results.push(record);
                    self.mark_processed(&entity.id);
                    self.new_since_save += 1;
                }
                Outcome::Filtered => {
                    summary.filtered += 1;
                    self.mark_processed(&entity.id);
                }
                Outcome::Failed(_) => summary.failed += 1,
            }
        }
        if let Some(id) = last_seen {
            self.checkpoint.resume_cursor = Some(id.clone());
            self.checkpoint.resume_account = self.account.clone();
        }
        self.stats.absorb(&summary);
        summary
    }

    /// Checkpoint stamped with the current time, ready to persist.
    pub fn snapshot(&mut self) -> &Checkpoint {
        self.checkpoint.timestamp = chrono::Utc::now().to_rfc3339();
        &self.checkpoint
    }

    pub fn into_results(self) -> Vec<ExtractedRecord> {
        self.checkpoint.results
    }
}
