use biotrawl::error::HarvestError;
use biotrawl::store::{CheckpointStore, ResultCache};
use biotrawl::{Checkpoint, EntityId, ExtractedRecord};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn record(id: u64, username: &str) -> ExtractedRecord {
    ExtractedRecord {
        id: EntityId::from(id),
        username: username.to_string(),
        account: "acme".to_string(),
        followers_count: id * 10,
        ..Default::default()
    }
}

fn checkpoint_with(n: u64) -> Checkpoint {
    Checkpoint {
        results: (1..=n).map(|i| record(i, &format!("user{i}"))).collect(),
        processed_ids: (1..=n).map(EntityId::from).collect(),
        resume_cursor: (n > 0).then(|| EntityId::from(n)),
        resume_account: (n > 0).then(|| "acme".to_string()),
        timestamp: "2025-01-01T00:00:00+00:00".to_string(),
    }
}

// --- CheckpointStore ---

#[test]
fn test_checkpoint_load_missing_is_none() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("acme_checkpoint.json"), Duration::ZERO, 3);
    assert!(store.load().unwrap().is_none());
}

#[test]
fn test_checkpoint_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("acme_checkpoint.json");
    let mut store = CheckpointStore::new(&path, Duration::from_secs(60), 3);
    let cp = checkpoint_with(3);
    assert!(store.save(&cp, false).unwrap());

    let loaded = CheckpointStore::new(&path, Duration::ZERO, 3)
        .load()
        .unwrap()
        .unwrap();
    assert_eq!(loaded, cp);
    assert!(!dir.path().join("acme_checkpoint.json.tmp").exists());
}

#[test]
fn test_checkpoint_file_uses_camel_case_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cp.json");
    let mut store = CheckpointStore::new(&path, Duration::ZERO, 3);
    store.save(&checkpoint_with(1), true).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"processedIds\""));
    assert!(text.contains("\"resumeCursor\""));
    assert!(text.contains("\"timestamp\""));
}

#[test]
fn test_checkpoint_unforced_save_is_throttled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cp.json");
    let mut store = CheckpointStore::new(&path, Duration::from_secs(3600), 3);
    assert!(store.save(&checkpoint_with(1), false).unwrap());
    assert!(!store.save(&checkpoint_with(2), false).unwrap());
    let on_disk = store.load().unwrap().unwrap();
    assert_eq!(on_disk.results.len(), 1);

    // Forced saves ignore the interval.
    assert!(store.save(&checkpoint_with(2), true).unwrap());
    assert_eq!(store.load().unwrap().unwrap().results.len(), 2);
}

#[test]
fn test_checkpoint_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cp.json");
    std::fs::write(&path, b"{ not json").unwrap();
    let store = CheckpointStore::new(&path, Duration::ZERO, 3);
    assert!(matches!(
        store.load(),
        Err(HarvestError::CorruptCheckpoint { .. })
    ));
}

#[test]
fn test_checkpoint_delete() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cp.json");
    let mut store = CheckpointStore::new(&path, Duration::ZERO, 3);
    store.save(&checkpoint_with(2), true).unwrap();
    std::fs::write(dir.path().join("cp.json.tmp"), b"partial").unwrap();
    store.delete().unwrap();
    assert!(!path.exists());
    assert!(!dir.path().join("cp.json.tmp").exists());
    assert!(store.load().unwrap().is_none());
    // Deleting again is fine.
    store.delete().unwrap();
}

#[test]
fn test_checkpoint_save_creates_parent_dirs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("nested").join("cp.json");
    let mut store = CheckpointStore::new(&path, Duration::ZERO, 3);
    store.save(&checkpoint_with(1), true).unwrap();
    assert!(path.exists());
}

// --- ResultCache ---

#[test]
fn test_cache_miss_then_hit() {
    let dir = TempDir::new().unwrap();
    let cache = ResultCache::new(dir.path().join("acme_cache.json.gz"));
    let id = EntityId::from(7u64);
    assert!(cache.get(&id).is_none());
    assert!(cache.is_empty());
    cache.put(&id, &record(7, "seven")).unwrap();
    assert_eq!(cache.get(&id), Some(record(7, "seven")));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_put_same_content_is_noop() {
    let dir = TempDir::new().unwrap();
    let cache = ResultCache::new(dir.path().join("c.json.gz"));
    let id = EntityId::from(1u64);
    assert!(cache.put(&id, &record(1, "one")).unwrap());
    assert!(!cache.put(&id, &record(1, "one")).unwrap());
    assert!(cache.put(&id, &record(1, "renamed")).unwrap());
    assert_eq!(cache.get(&id).unwrap().username, "renamed");
}

#[test]
fn test_cache_persists_gzip_across_instances() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("c.json.gz");
    {
        let cache = ResultCache::new(&path);
        cache.put(&EntityId::from(1u64), &record(1, "one")).unwrap();
        cache.put(&EntityId::from("abc"), &record(2, "two")).unwrap();
    }
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

    let reopened = ResultCache::new(&path);
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.get(&EntityId::from("abc")).unwrap().username, "two");
}

#[test]
fn test_cache_refresh_sees_other_writer() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("c.json.gz");
    let reader = ResultCache::new(&path);
    assert!(reader.get(&EntityId::from(5u64)).is_none());

    ResultCache::new(&path)
        .put(&EntityId::from(5u64), &record(5, "five"))
        .unwrap();
    assert!(reader.get(&EntityId::from(5u64)).is_none());
    reader.refresh();
    assert_eq!(reader.get(&EntityId::from(5u64)).unwrap().username, "five");
}

#[test]
fn test_cache_corrupt_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("c.json.gz");
    std::fs::write(&path, b"definitely not gzip").unwrap();
    let cache = ResultCache::new(&path);
    assert!(cache.is_empty());
    cache.put(&EntityId::from(1u64), &record(1, "one")).unwrap();
    assert_eq!(ResultCache::new(&path).len(), 1);
}

#[test]
fn test_cache_concurrent_puts_keep_every_entry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("c.json.gz");
    let cache = Arc::new(ResultCache::new(&path));
    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..10u64 {
                    let id = t * 100 + i;
                    cache
                        .put(&EntityId::from(id), &record(id, &format!("u{id}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(cache.len(), 40);
    assert_eq!(ResultCache::new(&path).len(), 40);
}
