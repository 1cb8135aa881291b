//! Batch harvester: pull pages, batch, dispatch to the worker pool, merge, checkpoint, pace.

use log::{debug, error, info, warn};
use std::sync::Arc;

use super::context::{EventSender, HarvestEvent, HarvestState, RunPhase};
use super::error_handler::{log_degraded_save, record_account_failure};
use super::workers::{BatchJob, build_pool, process_batch};
use crate::control::{RunController, RunState};
use crate::error::{HarvestError, HarvestResult};
use crate::extract::{Extractor, RecordExtractor};
use crate::pacing::{ProxySelector, Upstream};
use crate::report::{AccountFailure, Analytics, HarvestReport, RunOutcome};
use crate::source::{AccountHandle, EntitySource, Page};
use crate::store::{CheckpointStore, ResultCache};
use crate::types::{Entity, HarvestConfig};

/// Whether the run goes on after a controller poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct Harvester {
    config: HarvestConfig,
    source: Box<dyn EntitySource>,
    selector: ProxySelector,
    extractor: Arc<dyn RecordExtractor>,
    controller: RunController,
    events: EventSender,
    store: CheckpointStore,
    cache: ResultCache,
    pool: rayon::ThreadPool,
}

impl Harvester {
    /// `source` must already be authenticated.
    pub fn new(
        config: HarvestConfig,
        source: Box<dyn EntitySource>,
        upstream: Arc<dyn Upstream>,
    ) -> HarvestResult<Self> {
        if config.accounts.is_empty() {
            return Err(HarvestError::Config("no accounts to harvest".into()));
        }
        if config.pacing.delay_min > config.pacing.delay_max {
            return Err(HarvestError::Config(
                "delay_min must not exceed delay_max".into(),
            ));
        }
        let controller = RunController::new();
        let selector = ProxySelector::new(upstream, config.pacing.clone(), config.proxies.clone())
            .with_controller(controller.clone());
        Ok(Self {
            store: CheckpointStore::from_config(&config),
            cache: ResultCache::new(config.cache_path()),
            pool: build_pool(config.workers)?,
            config,
            source,
            selector,
            extractor: Arc::new(Extractor::new()),
            controller,
            events: EventSender::default(),
        })
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn RecordExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Share an outside controller (interrupt handler, stdin listener, tests).
    pub fn with_controller(mut self, controller: RunController) -> Self {
        self.selector = ProxySelector::new(
            self.selector.upstream(),
            self.config.pacing.clone(),
            self.config.proxies.clone(),
        )
        .with_controller(controller.clone());
        self.controller = controller;
        self
    }

    pub fn with_events(mut self, tx: crossbeam_channel::Sender<HarvestEvent>) -> Self {
        self.events = EventSender::new(tx);
        self
    }

    pub fn controller(&self) -> RunController {
        self.controller.clone()
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Fresh start deletes the checkpoint; otherwise load it, treating a corrupt file as absent.
    fn initial_state(&mut self) -> HarvestResult<HarvestState> {
        if self.config.fresh_start {
            self.store.delete()?;
            info!("Starting fresh; checkpoint removed");
            return Ok(HarvestState::fresh());
        }
        match self.store.load() {
            Ok(Some(checkpoint)) => {
                info!(
                    "Resuming: {} results, {} processed ids",
                    checkpoint.results.len(),
                    checkpoint.processed_ids.len()
                );
                Ok(HarvestState::from_checkpoint(checkpoint))
            }
            Ok(None) => Ok(HarvestState::fresh()),
            Err(e @ HarvestError::CorruptCheckpoint { .. }) => {
                warn!("{e}; starting fresh");
                Ok(HarvestState::fresh())
            }
            Err(e) => Err(e),
        }
    }

    fn save(&mut self, state: &mut HarvestState, force: bool) -> bool {
        match self.store.save(state.snapshot(), force) {
            Ok(saved) => {
                if saved {
                    state.new_since_save = 0;
                }
                saved
            }
            Err(e) => {
                log_degraded_save(&e, "checkpoint");
                false
            }
        }
    }

    fn emit_phase(&self, phase: RunPhase, state: &HarvestState) {
        self.events.emit(HarvestEvent::StateChanged {
            phase,
            results: state.results().len(),
        });
    }

    /// If paused: flush, announce, park until resumed or stopped. Returns the state after.
    fn hold_if_paused(&mut self, state: &mut HarvestState) -> RunState {
        let current = self.controller.state();
        if current != RunState::Paused {
            return current;
        }
        self.save(state, true);
        info!("Paused at {} results", state.results().len());
        self.emit_phase(RunPhase::Paused, state);
        let after = self.controller.wait_while_paused();
        if after != RunState::Stopped {
            info!("Resumed");
            self.emit_phase(RunPhase::Resumed, state);
        }
        after
    }

    /// Pause parks here; stop flushes, announces, exits.
    fn poll_controller(&mut self, state: &mut HarvestState) -> Flow {
        match self.hold_if_paused(state) {
            RunState::Stopped => self.interrupt(state),
            _ => Flow::Continue,
        }
    }

    fn interrupt(&mut self, state: &mut HarvestState) -> Flow {
        self.save(state, true);
        warn!(
            "Interrupted at {} results; rerun to resume",
            state.results().len()
        );
        self.emit_phase(RunPhase::Interrupted, state);
        Flow::Stop
    }

    /// Fetch one page, sitting out rate limits. `Ok(None)` when stopped while backing off.
    fn fetch_page(
        &mut self,
        handle: &AccountHandle,
        cursor: Option<&str>,
        state: &mut HarvestState,
    ) -> HarvestResult<Option<Page>> {
        loop {
            match self.source.fetch_page(handle, cursor) {
                Ok(page) => return Ok(Some(page)),
                Err(HarvestError::RateLimited { retry_after }) => {
                    self.selector.back_off(retry_after);
                    if self.hold_if_paused(state) == RunState::Stopped {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// All of the account's entities, pages in order. `Ok(None)` when stopped mid-way.
    fn fetch_all(
        &mut self,
        handle: &AccountHandle,
        state: &mut HarvestState,
    ) -> HarvestResult<Option<Vec<Entity>>> {
        let mut entities = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let Some(page) = self.fetch_page(handle, cursor.as_deref(), state)? else {
                return Ok(None);
            };
            debug!(
                "[{}] page: {} entities (cursor {:?})",
                handle.name,
                page.entities.len(),
                cursor
            );
            entities.extend(page.entities);
            match page.next_cursor {
                Some(next) => {
                    cursor = Some(next);
                    let path = self.selector.select();
                    self.selector.wait_before_next_request(&path);
                    if self.hold_if_paused(state) == RunState::Stopped {
                        return Ok(None);
                    }
                }
                None => return Ok(Some(entities)),
            }
        }
    }

    /// Entities still to process: fast-forward past this account's checkpointed cursor (once per
    /// resume), then drop processed ids.
    fn pending(
        &self,
        account: &str,
        mut entities: Vec<Entity>,
        state: &mut HarvestState,
    ) -> Vec<Entity> {
        if let Some(cursor) = state.take_resume_point(account)
            && let Some(pos) = entities.iter().position(|e| e.id == cursor)
        {
            debug!("[{}] fast-forwarding past {} ({} entities)", account, cursor, pos + 1);
            entities.drain(..=pos);
        }
        entities.retain(|e| !state.is_processed(&e.id));
        entities
    }

    fn harvest_account(&mut self, account: &str, state: &mut HarvestState) -> HarvestResult<Flow> {
        let handle = self.source.resolve_account(account)?;
        info!("Harvesting followers of {}", account);
        self.events.emit(HarvestEvent::AccountStarted {
            account: account.to_string(),
            total: handle.follower_total,
        });

        state.begin_account(account);
        let Some(entities) = self.fetch_all(&handle, state)? else {
            return Ok(self.interrupt(state));
        };
        let pending = self.pending(account, entities, state);
        info!("[{}] {} entities to process", account, pending.len());

        let extractor = Arc::clone(&self.extractor);
        let mut idx = 0;
        while idx < pending.len() {
            if state.at_limit(self.config.max_results) {
                info!("Reached max results ({})", state.results().len());
                break;
            }
            let size = self.selector.dynamic_batch_size();
            let end = (idx + size).min(pending.len());
            let batch = &pending[idx..end];
            idx = end;

            self.cache.refresh();
            let job = BatchJob {
                account,
                filter: &self.config.filter,
                cache: &self.cache,
                extractor: extractor.as_ref(),
                max_retries: self.config.max_retries,
                backoff: (self.config.retry_backoff_min, self.config.retry_backoff_max),
            };
            let outcomes = process_batch(&self.pool, &job, batch);
            let summary = state.merge(batch, outcomes, self.config.max_results);
            debug!(
                "[{}] batch of {}: {} accepted, {} filtered, {} failed",
                account,
                batch.len(),
                summary.accepted,
                summary.filtered,
                summary.failed
            );
            self.events.emit(HarvestEvent::Processed {
                delta: summary.accepted,
                business: summary.business,
                verified: summary.verified,
            });
            if state.new_since_save >= self.config.checkpoint_every {
                self.save(state, false);
            }

            if self.poll_controller(state) == Flow::Stop {
                return Ok(Flow::Stop);
            }
            if idx < pending.len() {
                let path = self.selector.select();
                self.selector.wait_before_next_request(&path);
                if self.poll_controller(state) == Flow::Stop {
                    return Ok(Flow::Stop);
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn finish(
        &self,
        state: HarvestState,
        outcome: RunOutcome,
        failed: Vec<AccountFailure>,
    ) -> HarvestReport {
        let analytics = Analytics::compute(state.results(), &state.stats);
        analytics.log();
        HarvestReport {
            outcome,
            stats: state.stats,
            analytics,
            failed_accounts: failed,
            processed: state.processed_count(),
            records: state.into_results(),
        }
    }

    /// Harvest every configured account. Per-account failures are recorded in the report; a
    /// broken connection fails the run after a forced checkpoint (rerun resumes).
    pub fn run(&mut self) -> HarvestResult<HarvestReport> {
        let mut state = self.initial_state()?;
        self.selector.probe();

        let mut failed = Vec::new();
        let accounts = self.config.accounts.clone();
        for account in &accounts {
            if state.at_limit(self.config.max_results) {
                break;
            }
            if self.poll_controller(&mut state) == Flow::Stop {
                return Ok(self.finish(state, RunOutcome::Interrupted, failed));
            }
            match self.harvest_account(account, &mut state) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return Ok(self.finish(state, RunOutcome::Interrupted, failed)),
                Err(e) if e.is_account_fatal() => {
                    self.save(&mut state, true);
                    let failure = record_account_failure(account, &e);
                    self.events.emit(HarvestEvent::AccountFailed {
                        account: failure.account.clone(),
                        reason: failure.reason.clone(),
                    });
                    failed.push(failure);
                }
                Err(e) => {
                    self.save(&mut state, true);
                    error!(
                        "[{}] run failed at {} results: {}",
                        account,
                        state.results().len(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        state.clear_resume_cursor();
        self.save(&mut state, true);
        info!("Completed: {} results", state.results().len());
        self.emit_phase(RunPhase::Completed, &state);
        Ok(self.finish(state, RunOutcome::Completed, failed))
    }
}
