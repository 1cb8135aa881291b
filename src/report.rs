//! Run report and end-of-run analytics.

use log::info;
use serde::Serialize;

use crate::pipeline::context::MergeSummary;
use crate::types::ExtractedRecord;
use crate::utils::config::SegmentConsts;

/// Counters for this run only (resumed results are not re-counted).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Entities that reached the worker pool and were merged.
    pub attempted: usize,
    pub accepted: usize,
    pub filtered: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub business: usize,
    pub verified: usize,
}

impl RunStats {
    pub fn absorb(&mut self, s: &MergeSummary) {
        self.attempted += s.accepted + s.filtered + s.failed;
        self.accepted += s.accepted;
        self.filtered += s.filtered;
        self.failed += s.failed;
        self.duplicates += s.duplicates;
        self.business += s.business;
        self.verified += s.verified;
    }

    /// Accepted ÷ attempted, in percent. Zero when nothing was attempted.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.accepted as f64 * 100.0 / self.attempted as f64
        }
    }
}

/// Follower-count buckets: `<100`, `100-1000`, `1000+`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Segments {
    pub small: usize,
    pub medium: usize,
    pub large: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Analytics {
    pub total: usize,
    pub business_pct: f64,
    pub verified_pct: f64,
    pub avg_followers: f64,
    pub success_rate: f64,
    pub segments: Segments,
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

impl Analytics {
    pub fn compute(records: &[ExtractedRecord], stats: &RunStats) -> Self {
        let total = records.len();
        let mut segments = Segments::default();
        let mut followers_sum: u64 = 0;
        let (mut business, mut verified) = (0, 0);
        for r in records {
            followers_sum += r.followers_count;
            business += usize::from(r.is_business);
            verified += usize::from(r.is_verified);
            match r.followers_count {
                n if n < SegmentConsts::SMALL => segments.small += 1,
                n if n < SegmentConsts::LARGE => segments.medium += 1,
                _ => segments.large += 1,
            }
        }
        Self {
            total,
            business_pct: pct(business, total),
            verified_pct: pct(verified, total),
            avg_followers: if total == 0 {
                0.0
            } else {
                followers_sum as f64 / total as f64
            },
            success_rate: stats.success_rate(),
            segments,
        }
    }

    pub fn log(&self) {
        info!(
            "Analytics: {} records, {:.1}% business, {:.1}% verified, avg followers {:.1}, success rate {:.1}%",
            self.total, self.business_pct, self.verified_pct, self.avg_followers, self.success_rate
        );
        info!(
            "Segments: <{}: {}, {}-{}: {}, {}+: {}",
            SegmentConsts::SMALL,
            self.segments.small,
            SegmentConsts::SMALL,
            SegmentConsts::LARGE,
            self.segments.medium,
            SegmentConsts::LARGE,
            self.segments.large
        );
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountFailure {
    pub account: String,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Completed,
    /// Stopped by the controller; the checkpoint holds everything merged so far.
    Interrupted,
}

#[derive(Clone, Debug, Serialize)]
pub struct HarvestReport {
    pub outcome: RunOutcome,
    pub records: Vec<ExtractedRecord>,
    pub stats: RunStats,
    pub analytics: Analytics,
    pub failed_accounts: Vec<AccountFailure>,
    /// Processed ids in the checkpoint at the end of the run.
    pub processed: usize,
}
