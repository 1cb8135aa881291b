//! CLI command handler: build config (file, then flags), harvest, write output, optionally repeat.

use anyhow::{Context, Result};
use log::{info, warn};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::control::{RunController, RunState};
use crate::engine::arg_parser::Cli;
use crate::engine::progress::spawn_reporter;
use crate::pacing::{DirectUpstream, HttpUpstream, Upstream};
use crate::pipeline::Harvester;
use crate::report::{HarvestReport, RunOutcome};
use crate::sink::{OutputConfig, OutputFormat};
use crate::source::{EntitySource, JsonFeedSource, SessionContext};
use crate::types::{AccountKind, HarvestConfig};
use crate::utils::config::{PackagePaths, ProgressConsts, SourceConsts};
use crate::utils::harvest_toml::{HarvestToml, apply_file_to_config, load_harvest_toml};
use crate::utils::{get_login_password, setup_logging};

/// Everything one harvest needs besides the core config.
struct RunPlan {
    config: HarvestConfig,
    output: OutputConfig,
    feed_dir: PathBuf,
    page_size: usize,
    login: Option<String>,
}

fn secs(v: f64) -> Option<Duration> {
    (v.is_finite() && v >= 0.0).then(|| Duration::from_secs_f64(v))
}

fn build_plan(cli: &Cli, file: Option<&HarvestToml>) -> Result<RunPlan> {
    let mut config = HarvestConfig::default();
    if let Some(f) = file {
        apply_file_to_config(f, &mut config)
            .with_context(|| format!("invalid {}", PackagePaths::get().config_filename()))?;
    }
    let settings = file.map(|f| &f.settings);

    if !cli.accounts.is_empty() {
        config.accounts = cli.accounts.clone();
    }
    if let Some(dir) = &cli.state_dir {
        config.state_dir = dir.clone();
    }
    if cli.checkpoint.is_some() {
        config.checkpoint_path = cli.checkpoint.clone();
    }
    if !cli.proxies.is_empty() {
        config.proxies = cli.proxies.clone();
    }
    if cli.probe_url.is_some() {
        config.pacing.probe_url = cli.probe_url.clone();
    }
    if let Some(d) = cli.delay_min.and_then(secs) {
        config.pacing.delay_min = d;
    }
    if let Some(d) = cli.delay_max.and_then(secs) {
        config.pacing.delay_max = d;
    }
    if let Some(n) = cli.max_retries {
        config.max_retries = n;
    }
    if cli.max_results.is_some() {
        config.max_results = cli.max_results;
    }
    if cli.min_followers.is_some() {
        config.filter.min_followers = cli.min_followers;
    }
    if cli.business_only == Some(true) {
        config.filter.account_kind = AccountKind::BusinessOnly;
    } else if cli.non_business_only == Some(true) {
        config.filter.account_kind = AccountKind::NonBusinessOnly;
    }
    if let Some(v) = cli.verified_only {
        config.filter.verified_only = v;
    }
    if cli.filter_text.is_some() {
        config.filter.text_filter = cli.filter_text.clone();
    }
    if !cli.columns.is_empty() {
        config.columns = cli.columns.clone();
    }
    if cli.workers.is_some() {
        config.workers = cli.workers;
    }
    if let Some(v) = cli.fresh {
        config.fresh_start = v;
    }
    if let Some(v) = cli.verbose {
        config.verbose = v;
    }
    config.dry_run = cli.dry_run;

    if config.accounts.is_empty() {
        anyhow::bail!("no accounts given (pass ACCOUNT or set [settings] accounts)");
    }

    let format = cli
        .format
        .or_else(|| settings.and_then(|s| s.format))
        .unwrap_or_default();
    let output_path = match (&cli.output, settings.and_then(|s| s.output.as_ref())) {
        (None, Some(p)) => p.into(),
        _ => cli.output_path(config.primary_account(), format),
    };
    let feed_dir = cli
        .feed_dir
        .clone()
        .or_else(|| settings.and_then(|s| s.feed_dir.as_ref()).map(Into::into))
        .unwrap_or_else(|| PathBuf::from(SourceConsts::FEED_DIR));

    Ok(RunPlan {
        output: OutputConfig {
            path: output_path,
            format,
            columns: config.columns.clone(),
        },
        feed_dir,
        page_size: cli
            .page_size
            .or_else(|| settings.and_then(|s| s.page_size))
            .unwrap_or(SourceConsts::PAGE_SIZE),
        login: cli
            .login
            .clone()
            .or_else(|| settings.and_then(|s| s.login.clone())),
        config,
    })
}

/// Enter resumes a paused run; `q` or `stop` stops it.
fn spawn_stdin_listener(controller: RunController) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "q" | "stop" => {
                    controller.stop();
                    break;
                }
                "p" | "pause" => {
                    controller.pause();
                }
                _ if controller.state() == RunState::Paused => {
                    controller.resume();
                }
                _ => {}
            }
            if controller.is_stopped() {
                break;
            }
        }
    });
}

fn build_source(plan: &RunPlan) -> Result<Box<dyn EntitySource>> {
    let mut source = JsonFeedSource::new(&plan.feed_dir, plan.page_size);
    let context = match &plan.login {
        Some(login) => SessionContext {
            login: Some(login.clone()),
            password: Some(get_login_password(&plan.config.state_dir, login)?),
        },
        None => SessionContext::default(),
    };
    let session = source
        .authenticate(&context)
        .context("authenticate with source")?;
    if let Some(login) = &session.login {
        info!(
            "Session for {} ({})",
            login,
            if session.authenticated {
                "authenticated"
            } else {
                "anonymous"
            }
        );
    }
    Ok(Box::new(source))
}

fn build_upstream(config: &HarvestConfig) -> Arc<dyn Upstream> {
    match &config.pacing.probe_url {
        Some(url) => Arc::new(HttpUpstream::new(url.clone(), config.pacing.probe_timeout)),
        None => Arc::new(DirectUpstream),
    }
}

fn run_once(plan: &RunPlan, controller: &RunController) -> Result<HarvestReport> {
    let source = build_source(plan)?;
    let upstream = build_upstream(&plan.config);
    let (tx, rx) = crossbeam_channel::bounded(ProgressConsts::EVENT_CHANNEL_CAP);
    let reporter = spawn_reporter(rx);

    let report = {
        let mut harvester = Harvester::new(plan.config.clone(), source, upstream)
            .context("set up harvester")?
            .with_controller(controller.clone())
            .with_events(tx);
        harvester.run()
    };
    // Harvester dropped: the event channel is closed and the reporter drains out.
    let live = reporter
        .join()
        .map_err(|_| anyhow::anyhow!("progress thread panicked"))?;
    let report = report.context("harvest failed; rerun to resume from the checkpoint")?;
    info!(
        "Live stats: processed={}, business={}, verified={}",
        live.processed, live.business, live.verified
    );

    for failure in &report.failed_accounts {
        warn!("Skipped {}: {}", failure.account, failure.reason);
    }
    if plan.config.dry_run {
        info!(
            "Dry run complete. {} records harvested, nothing written.",
            report.records.len()
        );
    } else if report.records.is_empty() {
        info!("No records to write");
    } else {
        let n = plan
            .output
            .write(&report.records)
            .with_context(|| format!("write output {}", plan.output.path.display()))?;
        let fmt = match plan.output.format {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Sqlite => "sqlite",
        };
        info!(
            "Saved {} records to {} ({})",
            n,
            plan.output.path.display(),
            fmt
        );
    }
    Ok(report)
}

/// Run the harvest; with `--every-hours`, repeat until stopped.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let file = load_harvest_toml(Path::new("."));
    let mut plan = build_plan(cli, file.as_ref())?;
    setup_logging(
        plan.config.verbose,
        cli.log_file
            .as_deref()
            .or_else(|| {
                file.as_ref()
                    .and_then(|f| f.settings.log_file.as_deref())
                    .map(Path::new)
            }),
    );
    if plan.config.dry_run {
        warn!("RUNNING IN DRY-RUN MODE. NO OUTPUT WILL BE WRITTEN.");
    }

    let controller = RunController::new();
    controller.install_interrupt_handler()?;
    spawn_stdin_listener(controller.clone());

    loop {
        let report = run_once(&plan, &controller)?;
        if report.outcome == RunOutcome::Interrupted {
            break;
        }
        let Some(hours) = cli.every_hours.and_then(|h| secs(h * 3600.0)) else {
            break;
        };
        // Later runs pick up where this one ended.
        plan.config.fresh_start = false;
        info!("Next run in {:.1} hours", hours.as_secs_f64() / 3600.0);
        if !controller.sleep(hours) {
            break;
        }
    }
    Ok(())
}
