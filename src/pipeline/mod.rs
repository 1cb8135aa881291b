//! Harvest pipeline: merge state and events, worker pool, orchestrator, account error handling.

pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod workers;

pub use context::{EventSender, HarvestEvent, HarvestState, MergeSummary, RunPhase};
pub use error_handler::{log_degraded_save, record_account_failure};
pub use orchestrator::Harvester;
pub use workers::{BatchJob, Outcome, build_pool, process_batch, process_entity};
