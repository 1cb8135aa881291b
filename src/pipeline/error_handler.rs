use log::{error, warn};

use crate::error::HarvestError;
use crate::report::AccountFailure;

/// Log an error that ended one account and turn it into the report entry.
pub fn record_account_failure(account: &str, err: &HarvestError) -> AccountFailure {
    error!("[{}] account skipped: {}", account, err);
    AccountFailure {
        account: account.to_string(),
        reason: err.to_string(),
    }
}

/// Checkpoint writes that fail only degrade durability; log and carry on.
pub fn log_degraded_save(err: &HarvestError, context: &str) {
    warn!("{context}: {err}");
}
