use log::{debug, warn};
use rayon::prelude::*;
use std::time::{Duration, Instant};

use super::{EgressPath, Upstream};
use crate::utils::config::PacingConsts;

/// Probe every candidate proxy, at most four at a time. Returns `(proxy, latency)` for each one
/// that answered without error inside `timeout`, in candidate order.
pub fn probe_paths(
    upstream: &dyn Upstream,
    candidates: &[String],
    timeout: Duration,
) -> Vec<(String, Duration)> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let probe_one = |proxy: &String| -> Option<(String, Duration)> {
        let path = EgressPath::Proxy(proxy.clone());
        let start = Instant::now();
        match upstream.probe(&path, timeout) {
            Ok(()) => {
                let latency = start.elapsed();
                if latency <= timeout {
                    debug!("Proxy {} ok ({:.3}s)", proxy, latency.as_secs_f64());
                    Some((proxy.clone(), latency))
                } else {
                    debug!("Proxy {} too slow ({:.3}s)", proxy, latency.as_secs_f64());
                    None
                }
            }
            Err(e) => {
                debug!("Proxy {} failed: {}", proxy, e);
                None
            }
        }
    };

    let threads = candidates.len().min(PacingConsts::PROBE_CONCURRENCY);
    let results: Vec<Option<(String, Duration)>> =
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| candidates.par_iter().map(probe_one).collect()),
            Err(e) => {
                warn!("probe pool unavailable ({e}); probing sequentially");
                candidates.iter().map(probe_one).collect()
            }
        };
    results.into_iter().flatten().collect()
}
