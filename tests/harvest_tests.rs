use biotrawl::error::{HarvestError, HarvestResult};
use biotrawl::source::SessionContext;
use biotrawl::source::memory::Fault;
use biotrawl::store::CheckpointStore;
use biotrawl::{
    DirectUpstream, Entity, EntityId, EntitySource, ExtractedRecord, Extractor, HarvestConfig,
    HarvestEvent, Harvester, JsonFeedSource, MemorySource, PacingConfig, RecordExtractor,
    RunController, RunOutcome, RunPhase, RunState,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const YEAR: i32 = 2025;

fn followers(ids: impl IntoIterator<Item = u64>) -> Vec<Entity> {
    ids.into_iter()
        .map(|i| {
        let mut e = Entity::new(i, format!("user{i}"));
        e.full_name = format!("User Number{i}");
        e.biography = format!("📍 Austin, TX | reach me at user{i}@mail.com");
        e.followers = i * 10;
        e.is_business = i % 3 == 0;
        e.is_verified = i % 5 == 0;
        e
        })
        .collect()
}

fn id_list(ids: impl IntoIterator<Item = u64>) -> Vec<EntityId> {
    ids.into_iter().map(EntityId::from).collect()
}

fn config(dir: &Path, accounts: &[&str]) -> HarvestConfig {
    HarvestConfig {
        accounts: accounts.iter().map(|a| a.to_string()).collect(),
        state_dir: dir.to_path_buf(),
        pacing: PacingConfig::immediate(),
        retry_backoff_min: Duration::ZERO,
        retry_backoff_max: Duration::ZERO,
        workers: Some(2),
        ..Default::default()
    }
}

type Action = fn(&RunController) -> RunState;

/// Counts calls, fails chosen ids, and can poke a controller once when a given id goes by.
struct ScriptedExtractor {
    inner: Extractor,
    calls: Arc<AtomicUsize>,
    always_fail: Vec<EntityId>,
    trigger: Option<(EntityId, RunController, Action)>,
    fired: AtomicBool,
}

impl ScriptedExtractor {
    fn new(calls: Arc<AtomicUsize>) -> Self {
        Self {
            inner: Extractor::with_year(YEAR),
            calls,
            always_fail: Vec::new(),
            trigger: None,
            fired: AtomicBool::new(false),
        }
    }

    fn failing(mut self, id: u64) -> Self {
        self.always_fail.push(EntityId::from(id));
        self
    }

    fn on(mut self, id: u64, controller: RunController, action: Action) -> Self {
        self.trigger = Some((EntityId::from(id), controller, action));
        self
    }
}

impl RecordExtractor for ScriptedExtractor {
    fn extract_record(&self, entity: &Entity, account: &str) -> HarvestResult<ExtractedRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.always_fail.contains(&entity.id) {
            return Err(HarvestError::ConnectionBroken("flaky".into()));
        }
        if let Some((id, controller, action)) = &self.trigger
            && *id == entity.id
            && !self.fired.swap(true, Ordering::SeqCst)
        {
            action(controller);
        }
        Ok(self.inner.extract(entity, account))
    }
}

fn harvester(
    config: HarvestConfig,
    source: MemorySource,
    extractor: ScriptedExtractor,
) -> Harvester {
    Harvester::new(config, Box::new(source), Arc::new(DirectUpstream))
        .unwrap()
        .with_extractor(Arc::new(extractor))
}

fn ids(records: &[ExtractedRecord]) -> Vec<EntityId> {
    records.iter().map(|r| r.id.clone()).collect()
}

// --- Harvester::run ---

#[test]
fn test_run_harvests_every_entity_in_order() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let source = MemorySource::new(7).with_account("alice", followers(1..=25));
    let (tx, rx) = crossbeam_channel::unbounded();
    let report = harvester(
        config(dir.path(), &["alice"]),
        source,
        ScriptedExtractor::new(Arc::clone(&calls)),
    )
    .with_events(tx)
    .run()
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(ids(&report.records), (1..=25).map(EntityId::from).collect::<Vec<_>>());
    assert_eq!(report.processed, 25);
    assert_eq!(calls.load(Ordering::SeqCst), 25);
    assert_eq!(report.records[0].emails[0], "user1@mail.com");
    assert_eq!(report.records[0].city, "Austin");

    let events: Vec<HarvestEvent> = rx.try_iter().collect();
    let delta: usize = events
        .iter()
        .map(|e| match e {
            HarvestEvent::Processed { delta, .. } => *delta,
            _ => 0,
        })
        .sum();
    assert_eq!(delta, 25);
    assert!(matches!(
        events.first(),
        Some(HarvestEvent::AccountStarted { total: Some(25), .. })
    ));
    assert!(matches!(
        events.last(),
        Some(HarvestEvent::StateChanged {
            phase: RunPhase::Completed,
            results: 25
        })
    ));

    let cp = CheckpointStore::new(dir.path().join("alice_checkpoint.json"), Duration::ZERO, 3)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(cp.processed_ids.len(), 25);
    assert_eq!(cp.resume_cursor, None);
    assert_eq!(cp.resume_account, None);
}

#[test]
fn test_multi_account_keeps_entities_listed_before_shared_follower() {
    let dir = TempDir::new().unwrap();
    let source = MemorySource::new(100)
        .with_account("alice", followers(1..=5))
        .with_account("bob", followers([10, 11, 12, 5, 13, 14]));
    let report = harvester(
        config(dir.path(), &["alice", "bob"]),
        source,
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .run()
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(
        ids(&report.records),
        id_list([1, 2, 3, 4, 5, 10, 11, 12, 13, 14])
    );
}

#[test]
fn test_rerun_after_completion_picks_up_new_followers() {
    let dir = TempDir::new().unwrap();
    let first = harvester(
        config(dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers(1..=5)),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .run()
    .unwrap();
    assert_eq!(first.outcome, RunOutcome::Completed);

    let calls = Arc::new(AtomicUsize::new(0));
    let second = harvester(
        config(dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers([6, 1, 2, 3, 4, 5])),
        ScriptedExtractor::new(Arc::clone(&calls)),
    )
    .run()
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ids(&second.records), id_list([1, 2, 3, 4, 5, 6]));
}

#[test]
fn test_multi_account_resume_covers_every_feed() {
    let bob = || followers((20..=21).chain([12]).chain(22..=40));
    let whole_dir = TempDir::new().unwrap();
    let whole = harvester(
        config(whole_dir.path(), &["alice", "bob"]),
        MemorySource::new(10)
            .with_account("alice", followers(1..=12))
            .with_account("bob", bob()),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .run()
    .unwrap();
    assert_eq!(ids(&whole.records), id_list((1..=12).chain(20..=40)));

    let dir = TempDir::new().unwrap();
    let controller = RunController::new();
    let first = harvester(
        config(dir.path(), &["alice", "bob"]),
        MemorySource::new(10)
            .with_account("alice", followers(1..=12))
            .with_account("bob", bob()),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))).on(
            22,
            controller.clone(),
            RunController::stop,
        ),
    )
    .with_controller(controller)
    .run()
    .unwrap();
    assert_eq!(first.outcome, RunOutcome::Interrupted);
    assert_eq!(first.records.len(), 22);

    let cp = CheckpointStore::new(dir.path().join("alice_checkpoint.json"), Duration::ZERO, 3)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(cp.resume_account.as_deref(), Some("bob"));

    let calls = Arc::new(AtomicUsize::new(0));
    let second = harvester(
        config(dir.path(), &["alice", "bob"]),
        MemorySource::new(10)
            .with_account("alice", followers(1..=12))
            .with_account("bob", bob()),
        ScriptedExtractor::new(Arc::clone(&calls)),
    )
    .run()
    .unwrap();
    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 11);
    assert_eq!(second.records, whole.records);
}

#[test]
fn test_resume_matches_uninterrupted_run() {
    let whole_dir = TempDir::new().unwrap();
    let whole = harvester(
        config(whole_dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers(1..=25)),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .run()
    .unwrap();

    let dir = TempDir::new().unwrap();
    let controller = RunController::new();
    let first = harvester(
        config(dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers(1..=25)),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))).on(
            13,
            controller.clone(),
            RunController::stop,
        ),
    )
    .with_controller(controller)
    .run()
    .unwrap();
    assert_eq!(first.outcome, RunOutcome::Interrupted);
    assert_eq!(first.records.len(), 20);

    let calls = Arc::new(AtomicUsize::new(0));
    let second = harvester(
        config(dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers(1..=25)),
        ScriptedExtractor::new(Arc::clone(&calls)),
    )
    .run()
    .unwrap();
    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
    assert_eq!(second.records, whole.records);
}

#[test]
fn test_cache_hit_skips_extraction() {
    let dir = TempDir::new().unwrap();
    let first_calls = Arc::new(AtomicUsize::new(0));
    let first = harvester(
        config(dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers(1..=12)),
        ScriptedExtractor::new(Arc::clone(&first_calls)),
    )
    .run()
    .unwrap();
    assert_eq!(first_calls.load(Ordering::SeqCst), 12);

    let mut cfg = config(dir.path(), &["alice"]);
    cfg.fresh_start = true;
    let calls = Arc::new(AtomicUsize::new(0));
    let second = harvester(
        cfg,
        MemorySource::new(10).with_account("alice", followers(1..=12)),
        ScriptedExtractor::new(Arc::clone(&calls)),
    )
    .run()
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.records, first.records);
}

#[test]
fn test_pause_flushes_checkpoint_matching_memory() {
    let dir = TempDir::new().unwrap();
    let cp_path = dir.path().join("alice_checkpoint.json");
    let controller = RunController::new();
    let (tx, rx) = crossbeam_channel::unbounded();

    let listener = {
        let controller = controller.clone();
        let cp_path = cp_path.clone();
        std::thread::spawn(move || {
            while let Ok(event) = rx.recv() {
                if let HarvestEvent::StateChanged {
                    phase: RunPhase::Paused,
                    results,
                } = event
                {
                    let cp = CheckpointStore::new(&cp_path, Duration::ZERO, 3)
                        .load()
                        .unwrap()
                        .unwrap();
                    controller.resume();
                    return Some((results, cp.results.len(), cp.processed_ids.len()));
                }
            }
            None
        })
    };

    let report = harvester(
        config(dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers(1..=25)),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))).on(
            4,
            controller.clone(),
            RunController::pause,
        ),
    )
    .with_controller(controller)
    .with_events(tx)
    .run()
    .unwrap();

    let (in_memory, saved_results, saved_processed) = listener.join().unwrap().unwrap();
    assert_eq!(in_memory, 10);
    assert_eq!(saved_results, 10);
    assert_eq!(saved_processed, 10);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.records.len(), 25);
}

#[test]
fn test_pause_during_pacing_wait_holds_next_batch() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), &["alice"]);
    cfg.pacing.delay_min = Duration::from_millis(400);
    cfg.pacing.delay_max = Duration::from_millis(400);
    let controller = RunController::new();
    let (tx, rx) = crossbeam_channel::unbounded();

    let listener = {
        let controller = controller.clone();
        std::thread::spawn(move || {
            let mut paused = false;
            while let Ok(event) = rx.recv() {
                match event {
                    HarvestEvent::Processed { .. } if !paused => {
                        paused = true;
                        std::thread::sleep(Duration::from_millis(100));
                        controller.pause();
                    }
                    HarvestEvent::StateChanged {
                        phase: RunPhase::Paused,
                        results,
                    } => {
                        controller.resume();
                        return Some(results);
                    }
                    _ => {}
                }
            }
            None
        })
    };

    let report = harvester(
        cfg,
        MemorySource::new(100).with_account("alice", followers(1..=15)),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .with_controller(controller)
    .with_events(tx)
    .run()
    .unwrap();

    assert_eq!(listener.join().unwrap(), Some(10));
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.records.len(), 15);
}

#[test]
fn test_account_failures_do_not_stop_run() {
    let dir = TempDir::new().unwrap();
    let source = MemorySource::new(10)
        .with_private_account("locked", followers(50..=55))
        .with_account("alice", followers(1..=5));
    let (tx, rx) = crossbeam_channel::unbounded();
    let report = harvester(
        config(dir.path(), &["ghost", "locked", "alice"]),
        source,
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .with_events(tx)
    .run()
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    let failed: Vec<&str> = report
        .failed_accounts
        .iter()
        .map(|f| f.account.as_str())
        .collect();
    assert_eq!(failed, ["ghost", "locked"]);
    assert_eq!(report.records.len(), 5);
    assert_eq!(
        rx.try_iter()
            .filter(|e| matches!(e, HarvestEvent::AccountFailed { .. }))
            .count(),
        2
    );
}

#[test]
fn test_private_account_readable_after_login() {
    let dir = TempDir::new().unwrap();
    let mut source = MemorySource::new(10).with_private_account("locked", followers(1..=3));
    let session = source
        .authenticate(&SessionContext {
            login: Some("me".into()),
            password: Some("secret".into()),
        })
        .unwrap();
    assert!(session.authenticated);
    let report = harvester(
        config(dir.path(), &["locked"]),
        source,
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .run()
    .unwrap();
    assert!(report.failed_accounts.is_empty());
    assert_eq!(report.records.len(), 3);
}

#[test]
fn test_connection_broken_fails_after_forced_checkpoint() {
    let dir = TempDir::new().unwrap();
    let source = MemorySource::new(10)
        .with_account("alice", followers(1..=5))
        .with_account("bob", followers(101..=115))
        .with_fault("bob", 10, Fault::ConnectionBroken);
    let err = harvester(
        config(dir.path(), &["alice", "bob"]),
        source,
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .run()
    .unwrap_err();
    assert!(matches!(err, HarvestError::ConnectionBroken(_)));

    let cp = CheckpointStore::new(dir.path().join("alice_checkpoint.json"), Duration::ZERO, 3)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(cp.results.len(), 5);

    let calls = Arc::new(AtomicUsize::new(0));
    let report = harvester(
        config(dir.path(), &["alice", "bob"]),
        MemorySource::new(10)
            .with_account("alice", followers(1..=5))
            .with_account("bob", followers(101..=115)),
        ScriptedExtractor::new(Arc::clone(&calls)),
    )
    .run()
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 15);
    assert_eq!(report.records.len(), 20);
}

#[test]
fn test_rate_limited_page_is_retried() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), &["alice"]);
    cfg.pacing.default_retry_after = Duration::from_secs(60);
    let source = MemorySource::new(10)
        .with_account("alice", followers(1..=25))
        .with_fault(
            "alice",
            10,
            Fault::RateLimited(Some(Duration::from_millis(80))),
        );
    let start = Instant::now();
    let report = harvester(cfg, source, ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))))
        .run()
        .unwrap();
    let elapsed = start.elapsed();
    assert_eq!(report.records.len(), 25);
    assert!(elapsed >= Duration::from_millis(80));
    assert!(elapsed < Duration::from_secs(30));
}

#[test]
fn test_max_results_stops_early() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), &["alice"]);
    cfg.max_results = Some(12);
    let report = harvester(
        cfg,
        MemorySource::new(10).with_account("alice", followers(1..=25)),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .run()
    .unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.records.len(), 12);
    assert_eq!(report.processed, 12);
}

#[test]
fn test_filtered_entities_processed_but_not_recorded() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), &["alice"]);
    cfg.filter.min_followers = Some(100);
    let calls = Arc::new(AtomicUsize::new(0));
    let report = harvester(
        cfg,
        MemorySource::new(10).with_account("alice", followers(1..=25)),
        ScriptedExtractor::new(Arc::clone(&calls)),
    )
    .run()
    .unwrap();
    assert_eq!(report.records.len(), 16);
    assert_eq!(report.processed, 25);
    assert_eq!(report.stats.filtered, 9);
    assert_eq!(calls.load(Ordering::SeqCst), 16);
    assert!((report.analytics.success_rate - 64.0).abs() < 1e-9);
}

#[test]
fn test_failed_extraction_is_excluded() {
    let dir = TempDir::new().unwrap();
    let mut cfg = config(dir.path(), &["alice"]);
    cfg.max_retries = 2;
    let calls = Arc::new(AtomicUsize::new(0));
    let report = harvester(
        cfg,
        MemorySource::new(10).with_account("alice", followers(1..=10)),
        ScriptedExtractor::new(Arc::clone(&calls)).failing(3),
    )
    .run()
    .unwrap();
    assert_eq!(report.records.len(), 9);
    assert!(!ids(&report.records).contains(&EntityId::from(3u64)));
    assert_eq!(report.stats.failed, 1);
    assert_eq!(report.processed, 9);
    assert_eq!(calls.load(Ordering::SeqCst), 11);
}

#[test]
fn test_corrupt_checkpoint_starts_fresh() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("alice_checkpoint.json"), b"{{{").unwrap();
    let report = harvester(
        config(dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers(1..=4)),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .run()
    .unwrap();
    assert_eq!(report.records.len(), 4);
}

#[test]
fn test_stop_before_start_is_interrupted() {
    let dir = TempDir::new().unwrap();
    let controller = RunController::new();
    controller.stop();
    let report = harvester(
        config(dir.path(), &["alice"]),
        MemorySource::new(10).with_account("alice", followers(1..=4)),
        ScriptedExtractor::new(Arc::new(AtomicUsize::new(0))),
    )
    .with_controller(controller)
    .run()
    .unwrap();
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert!(report.records.is_empty());
}

// --- Harvester::new ---

#[test]
fn test_new_rejects_bad_config() {
    let dir = TempDir::new().unwrap();
    let no_accounts = Harvester::new(
        config(dir.path(), &[]),
        Box::new(MemorySource::new(10)),
        Arc::new(DirectUpstream),
    );
    assert!(matches!(no_accounts, Err(HarvestError::Config(_))));

    let mut cfg = config(dir.path(), &["alice"]);
    cfg.pacing.delay_min = Duration::from_secs(5);
    cfg.pacing.delay_max = Duration::from_secs(1);
    let inverted = Harvester::new(cfg, Box::new(MemorySource::new(10)), Arc::new(DirectUpstream));
    assert!(matches!(inverted, Err(HarvestError::Config(_))));
}

// --- harvest (JSON feed) ---

#[test]
fn test_harvest_from_json_feed() {
    let dir = TempDir::new().unwrap();
    let feed = serde_json::json!({
        "followers": [
            {"id": 1, "username": "ann", "biography": "Call: (512) 555-0199", "followers": 150},
            {"id": "x2", "username": "bo", "full_name": "Bo Diddley", "is_business": true},
        ]
    });
    std::fs::write(dir.path().join("alice.json"), feed.to_string()).unwrap();

    let report = biotrawl::harvest(
        config(dir.path(), &["alice"]),
        Box::new(JsonFeedSource::new(dir.path(), 50)),
        Arc::new(DirectUpstream),
    )
    .unwrap();
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.records[0].phones[0], "5125550199");
    assert_eq!(report.records[1].id, EntityId::from("x2"));
    assert_eq!(report.records[1].first_name, "Bo");
    assert_eq!(report.analytics.segments.medium, 1);
    assert_eq!(report.analytics.segments.small, 1);
    assert!((report.analytics.business_pct - 50.0).abs() < 1e-9);
}

#[test]
fn test_json_feed_private_requires_login() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("locked.json"),
        r#"{"private": true, "followers": [{"id": 1, "username": "a"}]}"#,
    )
    .unwrap();
    let source = JsonFeedSource::new(dir.path(), 10);
    assert!(matches!(
        source.resolve_account("locked"),
        Err(HarvestError::UpstreamAuthRequired { .. })
    ));
    assert!(matches!(
        source.resolve_account("nobody"),
        Err(HarvestError::UpstreamNotFound { .. })
    ));

    let mut source = JsonFeedSource::new(dir.path(), 10);
    source
        .authenticate(&SessionContext {
            login: Some("me".into()),
            password: Some("pw".into()),
        })
        .unwrap();
    let handle = source.resolve_account("locked").unwrap();
    assert_eq!(handle.follower_total, Some(1));
    let page = source.fetch_page(&handle, None).unwrap();
    assert_eq!(page.entities.len(), 1);
    assert!(page.next_cursor.is_none());
}
