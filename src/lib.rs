//! Biotrawl: resumable, rate-aware follower harvester with bio field extraction

pub mod control;
pub mod engine;
pub mod error;
pub mod extract;
pub mod pacing;
pub mod pipeline;
pub mod report;
pub mod sink;
pub mod source;
pub mod store;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use control::{RunController, RunState};
pub use error::{HarvestError, HarvestResult};
pub use extract::{Extractor, RecordExtractor};
pub use pacing::{DirectUpstream, EgressPath, HttpUpstream, Liveness, Upstream};
pub use pipeline::{HarvestEvent, Harvester, RunPhase};
pub use report::{Analytics, HarvestReport, RunOutcome, RunStats};
pub use source::{EntitySource, JsonFeedSource, MemorySource};

use log::debug;
use std::sync::Arc;

/// Result alias used by public biotrawl API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: harvest every account in `config` from `source`, pacing against `upstream`.
///
/// Resumes from the checkpoint in `config.state_dir` unless `config.fresh_start` is set.
/// For pause/stop control or live events, build a [`Harvester`] directly:
///
/// ```ignore
/// let controller = biotrawl::RunController::new();
/// let mut harvester = biotrawl::Harvester::new(config, source, upstream)?
///     .with_controller(controller.clone());
/// let report = harvester.run()?;
/// ```
pub fn harvest(
    config: HarvestConfig,
    source: Box<dyn EntitySource>,
    upstream: Arc<dyn Upstream>,
) -> Result<HarvestReport> {
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        config
    );
    debug!("{}", config_str);

    let mut harvester = Harvester::new(config, source, upstream)?;
    Ok(harvester.run()?)
}
