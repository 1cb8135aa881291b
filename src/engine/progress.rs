//! Progress bar driven by harvest events

use crossbeam_channel::Receiver;
use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::pipeline::{HarvestEvent, RunPhase};

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " followers"
    )))
}

/// Force a refresh of the bar.
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Live tallies shown in the bar postfix and returned when the event stream ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveStats {
    pub processed: usize,
    pub business: usize,
    pub verified: usize,
}

/// Fold one event into the bar and the tallies.
pub fn apply_event(pb: &ProgressBar, stats: &mut LiveStats, event: &HarvestEvent) {
    match event {
        HarvestEvent::AccountStarted { account, total } => {
            if let Ok(mut bar) = pb.lock() {
                bar.set_description(account.clone());
                let _ = bar.reset(total.map(|t| t as usize));
            }
        }
        HarvestEvent::Processed {
            delta,
            business,
            verified,
        } => {
            stats.processed += delta;
            stats.business += business;
            stats.verified += verified;
            if let Ok(mut bar) = pb.try_lock() {
                bar.set_postfix(format!(
                    "business={}, verified={}",
                    stats.business, stats.verified
                ));
                let _ = bar.update(*delta);
            }
        }
        HarvestEvent::StateChanged { phase, .. } => {
            if matches!(phase, RunPhase::Paused | RunPhase::Resumed) {
                refresh_bar(pb);
            }
        }
        HarvestEvent::AccountFailed { .. } => {}
    }
}

/// Consume events on a side thread until every sender is dropped.
pub fn spawn_reporter(rx: Receiver<HarvestEvent>) -> JoinHandle<LiveStats> {
    std::thread::spawn(move || {
        let pb = create_counter("harvest");
        let mut stats = LiveStats::default();
        while let Ok(event) = rx.recv() {
            apply_event(&pb, &mut stats, &event);
        }
        refresh_bar(&pb);
        eprintln!();
        stats
    })
}
