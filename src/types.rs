//! Public and internal types for the biotrawl API and harvest pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::utils::config::{CheckpointConsts, PackagePaths, PacingConsts, RetryConsts};

/// Source-assigned identity of an entity. Feeds hand out either numeric or text ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Numeric(u64),
    Text(String),
}

impl Default for EntityId {
    fn default() -> Self {
        EntityId::Text(String::new())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Numeric(n) => write!(f, "{n}"),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for EntityId {
    fn from(n: u64) -> Self {
        EntityId::Numeric(n)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Text(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Text(s)
    }
}

/// One harvested profile as handed out by the entity source. Never mutated after fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub biography: String,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub is_business: bool,
    #[serde(default)]
    pub is_verified: bool,
}

impl Entity {
    /// Minimal entity with only id and username set (handy for feeds and tests).
    pub fn new(id: impl Into<EntityId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            full_name: String::new(),
            biography: String::new(),
            external_url: None,
            followers: 0,
            following: 0,
            is_business: false,
            is_verified: false,
        }
    }
}

/// Structured output for one entity. Every field is always present; unknowns are empty or zero.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedRecord {
    pub id: EntityId,
    pub username: String,
    /// Account whose follower list produced this record.
    pub account: String,
    pub emails: [String; 3],
    pub phones: [String; 3],
    /// Mobile advertising id. Never derivable from a bio; kept for column parity.
    pub madid: String,
    pub first_name: String,
    pub last_name: String,
    pub zip: String,
    pub city: String,
    pub state: String,
    pub country: String,
    /// Raw location text the city/state/country were split from.
    pub location: String,
    pub is_business: bool,
    pub is_verified: bool,
    /// Full date of birth. Bios rarely carry one; kept for column parity.
    pub dob: String,
    pub birth_year: String,
    pub gender: String,
    pub age: String,
    pub uid: u64,
    pub value: f64,
    pub followers_count: u64,
    pub following_count: u64,
}

/// Output columns, named as downstream sheets expect them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Column {
    Username,
    Account,
    Email,
    Email1,
    Email2,
    Phone,
    Phone1,
    Phone2,
    Madid,
    FirstName,
    LastName,
    Zip,
    City,
    State,
    Country,
    Location,
    IsBusiness,
    IsVerified,
    Dob,
    BirthYear,
    Gender,
    Age,
    Uid,
    Value,
    FollowersCount,
}

impl Column {
    pub const ALL: [Column; 25] = [
        Column::Username,
        Column::Account,
        Column::Email,
        Column::Email1,
        Column::Email2,
        Column::Phone,
        Column::Phone1,
        Column::Phone2,
        Column::Madid,
        Column::FirstName,
        Column::LastName,
        Column::Zip,
        Column::City,
        Column::State,
        Column::Country,
        Column::Location,
        Column::IsBusiness,
        Column::IsVerified,
        Column::Dob,
        Column::BirthYear,
        Column::Gender,
        Column::Age,
        Column::Uid,
        Column::Value,
        Column::FollowersCount,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Username => "username",
            Column::Account => "account",
            Column::Email => "email",
            Column::Email1 => "email.1",
            Column::Email2 => "email.2",
            Column::Phone => "phone",
            Column::Phone1 => "phone.1",
            Column::Phone2 => "phone.2",
            Column::Madid => "madid",
            Column::FirstName => "fn",
            Column::LastName => "ln",
            Column::Zip => "zip",
            Column::City => "ct",
            Column::State => "st",
            Column::Country => "country",
            Column::Location => "location",
            Column::IsBusiness => "is_business",
            Column::IsVerified => "is_verified",
            Column::Dob => "dob",
            Column::BirthYear => "doby",
            Column::Gender => "gen",
            Column::Age => "age",
            Column::Uid => "uid",
            Column::Value => "value",
            Column::FollowersCount => "followers_count",
        }
    }

    /// Render this column of `record` as text.
    pub fn value_of(&self, record: &ExtractedRecord) -> String {
        match self {
            Column::Username => record.username.clone(),
            Column::Account => record.account.clone(),
            Column::Email => record.emails[0].clone(),
            Column::Email1 => record.emails[1].clone(),
            Column::Email2 => record.emails[2].clone(),
            Column::Phone => record.phones[0].clone(),
            Column::Phone1 => record.phones[1].clone(),
            Column::Phone2 => record.phones[2].clone(),
            Column::Madid => record.madid.clone(),
            Column::FirstName => record.first_name.clone(),
            Column::LastName => record.last_name.clone(),
            Column::Zip => record.zip.clone(),
            Column::City => record.city.clone(),
            Column::State => record.state.clone(),
            Column::Country => record.country.clone(),
            Column::Location => record.location.clone(),
            Column::IsBusiness => record.is_business.to_string(),
            Column::IsVerified => record.is_verified.to_string(),
            Column::Dob => record.dob.clone(),
            Column::BirthYear => record.birth_year.clone(),
            Column::Gender => record.gender.clone(),
            Column::Age => record.age.clone(),
            Column::Uid => record.uid.to_string(),
            Column::Value => format!("{:.2}", record.value),
            Column::FollowersCount => record.followers_count.to_string(),
        }
    }

    /// `selected` when non-empty, every column otherwise.
    pub fn resolve(selected: &[Column]) -> Vec<Column> {
        if selected.is_empty() {
            Column::ALL.to_vec()
        } else {
            selected.to_vec()
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown column '{s}'"))
    }
}

impl TryFrom<String> for Column {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Column> for String {
    fn from(c: Column) -> Self {
        c.name().to_string()
    }
}

/// Business-account restriction. Business-only and non-business-only exclude each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    #[default]
    Any,
    BusinessOnly,
    NonBusinessOnly,
}

/// Early-skip predicate inputs, evaluated before extraction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub min_followers: Option<u64>,
    pub account_kind: AccountKind,
    pub verified_only: bool,
    /// Case-insensitive substring the biography must contain.
    pub text_filter: Option<String>,
}

/// Durable progress snapshot. Field names match the on-disk checkpoint file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub results: Vec<ExtractedRecord>,
    pub processed_ids: Vec<EntityId>,
    pub resume_cursor: Option<EntityId>,
    /// Account whose follower list `resume_cursor` points into.
    #[serde(default)]
    pub resume_account: Option<String>,
    pub timestamp: String,
}

/// Request pacing knobs: delay window, natural pauses, backoff defaults, probe settings.
#[derive(Clone, Debug)]
pub struct PacingConfig {
    pub delay_min: Duration,
    pub delay_max: Duration,
    /// Chance of an extra long pause after a normal wait.
    pub natural_pause_chance: f64,
    pub natural_pause_min: Duration,
    pub natural_pause_max: Duration,
    /// Wait window used when the liveness probe itself fails.
    pub fallback_min: Duration,
    pub fallback_max: Duration,
    /// Backoff when a rate-limit signal carries no retry-after hint.
    pub default_retry_after: Duration,
    pub probe_timeout: Duration,
    /// URL probed for proxy health and liveness. None: no probing (direct, always ready).
    pub probe_url: Option<String>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            delay_min: PacingConsts::DELAY_MIN,
            delay_max: PacingConsts::DELAY_MAX,
            natural_pause_chance: PacingConsts::NATURAL_PAUSE_CHANCE,
            natural_pause_min: PacingConsts::NATURAL_PAUSE_MIN,
            natural_pause_max: PacingConsts::NATURAL_PAUSE_MAX,
            fallback_min: PacingConsts::FALLBACK_MIN,
            fallback_max: PacingConsts::FALLBACK_MAX,
            default_retry_after: PacingConsts::DEFAULT_RETRY_AFTER,
            probe_timeout: PacingConsts::PROBE_TIMEOUT,
            probe_url: None,
        }
    }
}

impl PacingConfig {
    /// No waiting at all. Used for offline feeds and tests.
    pub fn immediate() -> Self {
        Self {
            delay_min: Duration::ZERO,
            delay_max: Duration::ZERO,
            natural_pause_chance: 0.0,
            natural_pause_min: Duration::ZERO,
            natural_pause_max: Duration::ZERO,
            fallback_min: Duration::ZERO,
            fallback_max: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Full run configuration. Every field has a value up front; nothing is conditionally absent.
#[derive(Clone, Debug)]
pub struct HarvestConfig {
    /// Accounts whose followers are harvested, in order. The first one names the state files.
    pub accounts: Vec<String>,
    /// Directory holding the checkpoint and cache files.
    pub state_dir: PathBuf,
    /// Checkpoint file override. When None, `<primary>_checkpoint.json` in `state_dir`.
    pub checkpoint_path: Option<PathBuf>,
    /// Candidate egress paths (proxy URLs).
    pub proxies: Vec<String>,
    pub pacing: PacingConfig,
    /// Attempts for checkpoint I/O and per-entity processing.
    pub max_retries: u32,
    pub retry_backoff_min: Duration,
    pub retry_backoff_max: Duration,
    /// Stop once this many records have been accumulated.
    pub max_results: Option<usize>,
    pub filter: FilterCriteria,
    /// Output column subset. Empty: all columns.
    pub columns: Vec<Column>,
    /// Worker pool override. When None, min(4, available parallelism).
    pub workers: Option<usize>,
    /// Minimum spacing between unforced checkpoint writes.
    pub checkpoint_interval: Duration,
    /// New results between unforced checkpoint attempts.
    pub checkpoint_every: usize,
    /// Discard any existing checkpoint before starting.
    pub fresh_start: bool,
    /// Harvest without writing output.
    pub dry_run: bool,
    pub verbose: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            state_dir: PathBuf::from("."),
            checkpoint_path: None,
            proxies: Vec::new(),
            pacing: PacingConfig::default(),
            max_retries: RetryConsts::MAX_RETRIES,
            retry_backoff_min: RetryConsts::BACKOFF_MIN,
            retry_backoff_max: RetryConsts::BACKOFF_MAX,
            max_results: None,
            filter: FilterCriteria::default(),
            columns: Vec::new(),
            workers: None,
            checkpoint_interval: CheckpointConsts::SAVE_INTERVAL,
            checkpoint_every: CheckpointConsts::SAVE_EVERY_RESULTS,
            fresh_start: false,
            dry_run: false,
            verbose: false,
        }
    }
}

impl HarvestConfig {
    /// First account of the run; names the checkpoint and cache files.
    pub fn primary_account(&self) -> &str {
        self.accounts.first().map(String::as_str).unwrap_or("default")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_path.clone().unwrap_or_else(|| {
            self.state_dir
                .join(PackagePaths::get().checkpoint_filename(self.primary_account()))
        })
    }

    pub fn cache_path(&self) -> PathBuf {
        self.state_dir
            .join(PackagePaths::get().cache_filename(self.primary_account()))
    }
}
