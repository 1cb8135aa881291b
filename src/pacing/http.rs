//! HTTP probe/liveness over reqwest's blocking client, routed through each proxy.

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{RETRY_AFTER, USER_AGENT};
use std::time::Duration;

use super::{EgressPath, Liveness, Upstream};
use crate::error::{HarvestError, HarvestResult};
use crate::utils::config::PackagePaths;

pub struct HttpUpstream {
    url: String,
    timeout: Duration,
}

fn broken(e: impl std::fmt::Display) -> HarvestError {
    HarvestError::ConnectionBroken(e.to_string())
}

/// `Retry-After` in whole seconds. HTTP-date values are ignored (caller uses its default).
fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl HttpUpstream {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    fn client(&self, path: &EgressPath, timeout: Duration) -> HarvestResult<Client> {
        let mut builder = Client::builder().timeout(timeout);
        if let EgressPath::Proxy(url) = path {
            builder = builder.proxy(reqwest::Proxy::all(url).map_err(broken)?);
        }
        builder.build().map_err(broken)
    }

    fn get(&self, path: &EgressPath, timeout: Duration) -> HarvestResult<reqwest::blocking::Response> {
        self.client(path, timeout)?
            .get(&self.url)
            .header(USER_AGENT, PackagePaths::get().pkg_name())
            .send()
            .map_err(broken)
    }
}

impl Upstream for HttpUpstream {
    fn probe(&self, path: &EgressPath, timeout: Duration) -> HarvestResult<()> {
        let resp = self.get(path, timeout)?;
        if resp.status().is_server_error() {
            return Err(broken(format!("probe via {path}: {}", resp.status())));
        }
        Ok(())
    }

    fn liveness(&self, path: &EgressPath) -> HarvestResult<Liveness> {
        let resp = self.get(path, self.timeout)?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(
                resp.headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            return Ok(Liveness::RateLimited { retry_after });
        }
        Ok(Liveness::Ready)
    }
}
