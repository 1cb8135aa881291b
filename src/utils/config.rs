//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    env_login_pass: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                env_login_pass: format!("{}_LOGIN_PASS", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Per-directory settings file name.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable consulted for the source login password.
    pub fn env_login_pass(&self) -> &str {
        &self.env_login_pass
    }

    pub fn checkpoint_filename(&self, account: &str) -> String {
        format!("{account}_checkpoint.json")
    }

    pub fn cache_filename(&self, account: &str) -> String {
        format!("{account}_cache.json.gz")
    }
}

// ---- Worker threads ----

/// Worker pool sizing for per-entity processing.
pub struct WorkerLimits;

impl WorkerLimits {
    /// Upper bound regardless of core count; more parallel extraction buys nothing once paced.
    pub const MAX_WORKERS: usize = 4;

    /// min(MAX_WORKERS, available parallelism), at least 1.
    pub fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, Self::MAX_WORKERS)
    }
}

// ---- Pacing ----

/// Default request pacing and backoff windows.
pub struct PacingConsts;

impl PacingConsts {
    pub const DELAY_MIN: Duration = Duration::from_millis(1500);
    pub const DELAY_MAX: Duration = Duration::from_millis(4000);
    pub const NATURAL_PAUSE_CHANCE: f64 = 0.1;
    pub const NATURAL_PAUSE_MIN: Duration = Duration::from_secs(30);
    pub const NATURAL_PAUSE_MAX: Duration = Duration::from_secs(60);
    pub const FALLBACK_MIN: Duration = Duration::from_secs(5);
    pub const FALLBACK_MAX: Duration = Duration::from_secs(10);
    pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Concurrent proxy probes at most.
    pub const PROBE_CONCURRENCY: usize = 4;
}

// ---- Batching ----

/// Dynamic batch size bounds. Size follows 10 / (avg_latency + 0.1), clamped.
pub struct BatchConsts;

impl BatchConsts {
    pub const MIN: usize = 5;
    pub const MAX: usize = 20;
    /// Used when no egress path has a measured latency.
    pub const FALLBACK: usize = 10;
    pub const SCALE: f64 = 10.0;
    pub const LATENCY_OFFSET: f64 = 0.1;
}

// ---- Retries ----

pub struct RetryConsts;

impl RetryConsts {
    pub const MAX_RETRIES: u32 = 3;
    pub const BACKOFF_MIN: Duration = Duration::from_secs(5);
    pub const BACKOFF_MAX: Duration = Duration::from_secs(10);
}

// ---- Checkpointing ----

pub struct CheckpointConsts;

impl CheckpointConsts {
    /// Unforced saves closer together than this are skipped.
    pub const SAVE_INTERVAL: Duration = Duration::from_secs(60);
    /// New results between unforced save attempts.
    pub const SAVE_EVERY_RESULTS: usize = 10;
}

// ---- Value score ----

pub struct ValueConsts;

impl ValueConsts {
    pub const BASE: f64 = 1.0;
    pub const BUSINESS_BONUS: f64 = 0.5;
    /// Follower count at which the follower bonus saturates at 1.0.
    pub const FOLLOWER_SATURATION: f64 = 10_000.0;
}

// ---- Feed source ----

pub struct SourceConsts;

impl SourceConsts {
    pub const FEED_DIR: &'static str = ".";
    pub const PAGE_SIZE: usize = 50;
}

// ---- Progress ----

pub struct ProgressConsts;

impl ProgressConsts {
    /// Event channel cap between workers and the progress reporter.
    pub const EVENT_CHANNEL_CAP: usize = 1024;
}

// ---- Analytics ----

/// Follower-count segment edges: below SMALL, SMALL..LARGE, LARGE and above.
pub struct SegmentConsts;

impl SegmentConsts {
    pub const SMALL: u64 = 100;
    pub const LARGE: u64 = 1000;
}
