use clap::Parser;
use std::path::PathBuf;

use crate::sink::OutputFormat;
use crate::types::Column;

/// Resumable follower harvester with bio field extraction.
#[derive(Clone, Parser)]
#[command(name = "biotrawl")]
#[command(about = "Harvest followers of one or more accounts; Ctrl+C pauses, twice stops. Rerun to resume.")]
pub struct Cli {
    /// Accounts whose followers are harvested. The first names the checkpoint and cache files.
    #[arg(value_name = "ACCOUNT")]
    pub accounts: Vec<String>,

    /// Directory with `<account>.json` follower feeds. Default: current directory.
    #[arg(long)]
    pub feed_dir: Option<PathBuf>,

    /// Entities per fetched page. Default: 50.
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Directory for checkpoint and cache files. Default: current directory.
    #[arg(long, short = 's')]
    pub state_dir: Option<PathBuf>,

    /// Checkpoint file. Default: `<account>_checkpoint.json` in the state directory.
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Output file. Default: `<account>_followers.<format>`.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Output columns (e.g. -c username email fn ct). Default: all.
    #[arg(long, short = 'c', num_args = 1..)]
    pub columns: Vec<Column>,

    /// Proxy URLs to probe and rotate through. Can specify multiple.
    #[arg(long = "proxy", num_args = 1..)]
    pub proxies: Vec<String>,

    /// URL used to probe proxies and check for rate limiting. Without it nothing is probed.
    #[arg(long)]
    pub probe_url: Option<String>,

    /// Minimum wait between requests, in seconds.
    #[arg(long)]
    pub delay_min: Option<f64>,

    /// Maximum wait between requests, in seconds.
    #[arg(long)]
    pub delay_max: Option<f64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Stop after this many records.
    #[arg(long, short = 'n')]
    pub max_results: Option<usize>,

    #[arg(long)]
    pub min_followers: Option<u64>,

    /// Keep business accounts only.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool), conflicts_with = "non_business_only")]
    pub business_only: Option<bool>,

    /// Keep non-business accounts only.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub non_business_only: Option<bool>,

    /// Keep verified accounts only.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verified_only: Option<bool>,

    /// Keep entities whose bio contains this text (case-insensitive).
    #[arg(long)]
    pub filter_text: Option<String>,

    /// Worker threads. Default: min(4, available cores).
    #[arg(long, short = 'j')]
    pub workers: Option<usize>,

    /// Discard any existing checkpoint and start over.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub fresh: Option<bool>,

    /// Harvest and checkpoint, but write no output file.
    #[arg(long)]
    pub dry_run: bool,

    /// Login for private accounts. Password from BIOTRAWL_LOGIN_PASS, .env, or a prompt.
    #[arg(long)]
    pub login: Option<String>,

    /// Re-run the harvest every N hours until stopped.
    #[arg(long)]
    pub every_hours: Option<f64>,

    /// Also append log lines to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    /// Output path, defaulting to `<primary>_followers.<ext>` in the working directory.
    pub fn output_path(&self, primary: &str, format: OutputFormat) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let ext = match format {
                OutputFormat::Csv => "csv",
                OutputFormat::Json => "json",
                OutputFormat::Sqlite => "db",
            };
            PathBuf::from(format!("{primary}_followers.{ext}"))
        })
    }
}
