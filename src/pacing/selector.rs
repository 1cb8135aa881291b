//! Egress path selection and between-request waits.

use log::{debug, info, warn};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use super::{EgressPath, Liveness, Upstream, probe_paths, uniform};
use crate::control::RunController;
use crate::types::PacingConfig;
use crate::utils::config::BatchConsts;

/// Per-proxy measurements. Process-lifetime only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProxyStat {
    pub latency: Duration,
    pub uses: u64,
}

impl ProxyStat {
    /// Lower is better: latency spread over how often the path has been used.
    fn score(&self) -> f64 {
        self.latency.as_secs_f64() / self.uses.max(1) as f64
    }
}

pub struct ProxySelector {
    upstream: Arc<dyn Upstream>,
    pacing: PacingConfig,
    candidates: Vec<String>,
    /// Probed-valid proxies in candidate order.
    valid: Vec<(String, ProxyStat)>,
    controller: Option<RunController>,
}

impl ProxySelector {
    pub fn new(upstream: Arc<dyn Upstream>, pacing: PacingConfig, candidates: Vec<String>) -> Self {
        Self {
            upstream,
            pacing,
            candidates,
            valid: Vec::new(),
            controller: None,
        }
    }

    /// Waits become interruptible by `controller` (they end early when it stops).
    pub fn with_controller(mut self, controller: RunController) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn upstream(&self) -> Arc<dyn Upstream> {
        Arc::clone(&self.upstream)
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.pacing
    }

    /// Probe all candidates; keep the ones that answered in time with `uses = 1`.
    pub fn probe(&mut self) -> Vec<String> {
        let probed = probe_paths(
            self.upstream.as_ref(),
            &self.candidates,
            self.pacing.probe_timeout,
        );
        self.valid = probed
            .into_iter()
            .map(|(proxy, latency)| (proxy, ProxyStat { latency, uses: 1 }))
            .collect();
        if !self.candidates.is_empty() {
            info!(
                "{}/{} proxies usable",
                self.valid.len(),
                self.candidates.len()
            );
        }
        self.valid.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn valid_paths(&self) -> &[(String, ProxyStat)] {
        &self.valid
    }

    pub fn stat(&self, proxy: &str) -> Option<ProxyStat> {
        self.valid
            .iter()
            .find(|(p, _)| p == proxy)
            .map(|(_, s)| *s)
    }

    /// Lowest `latency / max(uses, 1)` wins (first on ties); its use count goes up. Direct when no proxy is valid.
    pub fn select(&mut self) -> EgressPath {
        let best = self
            .valid
            .iter_mut()
            .min_by(|(_, a), (_, b)| a.score().total_cmp(&b.score()));
        match best {
            Some((proxy, stat)) => {
                stat.uses += 1;
                EgressPath::Proxy(proxy.clone())
            }
            None => EgressPath::Direct,
        }
    }

    /// `clamp(floor(10 / (avg_latency + 0.1)), 5, 20)`, or 10 with no measured proxy.
    pub fn dynamic_batch_size(&self) -> usize {
        if self.valid.is_empty() {
            return BatchConsts::FALLBACK;
        }
        let avg = self
            .valid
            .iter()
            .map(|(_, s)| s.latency.as_secs_f64())
            .sum::<f64>()
            / self.valid.len() as f64;
        let raw = (BatchConsts::SCALE / (avg + BatchConsts::LATENCY_OFFSET)).floor();
        (raw as usize).clamp(BatchConsts::MIN, BatchConsts::MAX)
    }

    /// Wait applied after a rate-limit signal: the hint, or the default when none was given.
    pub fn backoff_for(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.pacing.default_retry_after)
    }

    /// Sleep for `dur`, through the controller when one is attached. False when cut short by a stop.
    pub fn sleep(&self, dur: Duration) -> bool {
        if dur.is_zero() {
            return true;
        }
        match &self.controller {
            Some(c) => c.sleep(dur),
            None => {
                std::thread::sleep(dur);
                true
            }
        }
    }

    /// Sleep out a rate-limit signal, logging when requests resume.
    pub fn back_off(&self, retry_after: Option<Duration>) -> Duration {
        let wait = self.backoff_for(retry_after);
        let resume_at = chrono::Local::now()
            + chrono::Duration::from_std(wait).unwrap_or(chrono::Duration::zero());
        warn!(
            "Rate limited; waiting {:.0}s, resuming at {}",
            wait.as_secs_f64(),
            resume_at.format("%H:%M:%S")
        );
        self.sleep(wait);
        wait
    }

    /// Check upstream liveness through `path` and wait accordingly. Never fails; returns the
    /// wait that was scheduled.
    pub fn wait_before_next_request(&self, path: &EgressPath) -> Duration {
        let wait = match self.upstream.liveness(path) {
            Ok(Liveness::RateLimited { retry_after }) => return self.back_off(retry_after),
            Ok(Liveness::Ready) => {
                let mut wait = uniform(self.pacing.delay_min, self.pacing.delay_max);
                let chance = self.pacing.natural_pause_chance.clamp(0.0, 1.0);
                if chance > 0.0 && rand::rng().random_bool(chance) {
                    let pause = uniform(
                        self.pacing.natural_pause_min,
                        self.pacing.natural_pause_max,
                    );
                    info!("Taking a {:.0}s pause", pause.as_secs_f64());
                    wait += pause;
                }
                wait
            }
            Err(e) => {
                debug!("Liveness probe via {} failed: {}", path, e);
                uniform(self.pacing.fallback_min, self.pacing.fallback_max)
            }
        };
        debug!("Waiting {:.2}s before next request", wait.as_secs_f64());
        self.sleep(wait);
        wait
    }
}
