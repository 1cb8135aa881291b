//! Load `.biotrawl.toml` from a directory (CLI only). The library takes a ready `HarvestConfig`.

use anyhow::{Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sink::OutputFormat;
use crate::types::{AccountKind, Column, HarvestConfig};
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct HarvestToml {
    #[serde(default)]
    pub(crate) settings: SettingsSection,
    #[serde(default)]
    pacing: PacingSection,
    #[serde(default)]
    filter: FilterSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsSection {
    accounts: Option<Vec<String>>,
    state_dir: Option<String>,
    proxies: Option<Vec<String>>,
    max_retries: Option<u32>,
    max_results: Option<usize>,
    workers: Option<usize>,
    columns: Option<Vec<Column>>,
    verbose: Option<bool>,
    checkpoint_every: Option<usize>,
    /// Seconds between unforced checkpoint writes.
    checkpoint_interval: Option<f64>,
    pub(crate) login: Option<String>,
    pub(crate) feed_dir: Option<String>,
    pub(crate) page_size: Option<usize>,
    pub(crate) output: Option<String>,
    pub(crate) format: Option<OutputFormat>,
    pub(crate) log_file: Option<String>,
}

/// Durations are in seconds.
#[derive(Debug, Default, Deserialize)]
struct PacingSection {
    delay_min: Option<f64>,
    delay_max: Option<f64>,
    natural_pause_chance: Option<f64>,
    natural_pause_min: Option<f64>,
    natural_pause_max: Option<f64>,
    default_retry_after: Option<f64>,
    probe_timeout: Option<f64>,
    probe_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FilterSection {
    min_followers: Option<u64>,
    business_only: Option<bool>,
    non_business_only: Option<bool>,
    verified_only: Option<bool>,
    text: Option<String>,
}

/// Load `.biotrawl.toml` from `dir` if present. Returns None if file missing or unreadable. CLI only.
pub fn load_harvest_toml(dir: &Path) -> Option<HarvestToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_harvest_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_harvest_toml(s: &str) -> Result<HarvestToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite config field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $cfg:expr, $sec_field:ident => $cfg_field:ident) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $cfg.$cfg_field = v;
        }
    };
    ($sec:expr, $cfg:expr, secs $sec_field:ident => $cfg_field:ident) => {
        if let Some(v) = $sec.$sec_field
            && v.is_finite()
            && v >= 0.0
        {
            $cfg.$cfg_field = Duration::from_secs_f64(v);
        }
    };
}

/// Apply file config (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_config(file: &HarvestToml, config: &mut HarvestConfig) -> Result<()> {
    let s = &file.settings;
    apply_file_opt!(s, config, accounts => accounts);
    if let Some(ref dir) = s.state_dir {
        config.state_dir = PathBuf::from(dir);
    }
    apply_file_opt!(s, config, proxies => proxies);
    apply_file_opt!(s, config, max_retries => max_retries);
    if s.max_results.is_some() {
        config.max_results = s.max_results;
    }
    if s.workers.is_some() {
        config.workers = s.workers;
    }
    apply_file_opt!(s, config, columns => columns);
    apply_file_opt!(s, config, verbose => verbose);
    apply_file_opt!(s, config, checkpoint_every => checkpoint_every);
    apply_file_opt!(s, config, secs checkpoint_interval => checkpoint_interval);

    let p = &file.pacing;
    let pacing = &mut config.pacing;
    apply_file_opt!(p, pacing, secs delay_min => delay_min);
    apply_file_opt!(p, pacing, secs delay_max => delay_max);
    apply_file_opt!(p, pacing, natural_pause_chance => natural_pause_chance);
    apply_file_opt!(p, pacing, secs natural_pause_min => natural_pause_min);
    apply_file_opt!(p, pacing, secs natural_pause_max => natural_pause_max);
    apply_file_opt!(p, pacing, secs default_retry_after => default_retry_after);
    apply_file_opt!(p, pacing, secs probe_timeout => probe_timeout);
    if p.probe_url.is_some() {
        pacing.probe_url = p.probe_url.clone();
    }

    let f = &file.filter;
    let filter = &mut config.filter;
    if f.min_followers.is_some() {
        filter.min_followers = f.min_followers;
    }
    match (f.business_only == Some(true), f.non_business_only == Some(true)) {
        (true, true) => bail!("[filter] business_only and non_business_only are mutually exclusive"),
        (true, false) => filter.account_kind = AccountKind::BusinessOnly,
        (false, true) => filter.account_kind = AccountKind::NonBusinessOnly,
        (false, false) => {}
    }
    apply_file_opt!(f, filter, verified_only => verified_only);
    if f.text.is_some() {
        filter.text_filter = f.text.clone();
    }
    Ok(())
}
