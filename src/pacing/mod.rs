//! Request pacing: egress path choice, latency tracking, rate-limit backoff.

pub mod http;
pub mod probe;
pub mod selector;

pub use http::HttpUpstream;
pub use probe::probe_paths;
pub use selector::{ProxySelector, ProxyStat};

use rand::Rng;
use std::fmt;
use std::time::Duration;

use crate::error::HarvestResult;

/// Route a request leaves through.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EgressPath {
    Direct,
    Proxy(String),
}

impl fmt::Display for EgressPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EgressPath::Direct => f.write_str("direct"),
            EgressPath::Proxy(url) => f.write_str(url),
        }
    }
}

/// Upstream answer to "may I send the next request?".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Liveness {
    Ready,
    RateLimited { retry_after: Option<Duration> },
}

/// Network collaborator the selector measures and polls.
pub trait Upstream: Send + Sync {
    /// One round trip through `path`. Err when the path is unusable.
    fn probe(&self, path: &EgressPath, timeout: Duration) -> HarvestResult<()>;

    fn liveness(&self, path: &EgressPath) -> HarvestResult<Liveness>;
}

/// No network at all: every probe succeeds instantly and the upstream is always ready.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectUpstream;

impl Upstream for DirectUpstream {
    fn probe(&self, _path: &EgressPath, _timeout: Duration) -> HarvestResult<()> {
        Ok(())
    }

    fn liveness(&self, _path: &EgressPath) -> HarvestResult<Liveness> {
        Ok(Liveness::Ready)
    }
}

/// Uniform random duration in `[min, max]`; `min` when the window is empty.
pub fn uniform(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    Duration::from_secs_f64(
        rand::rng().random_range(min.as_secs_f64()..=max.as_secs_f64()),
    )
}
