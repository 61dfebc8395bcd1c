//! Tests for heap compaction
//!
//! These tests verify:
//! - Payloads survive compaction and the heap shrinks to live data only
//! - Empty and free slots lose their spans
//! - Compaction on open follows the configured thresholds
//! - Temp files from an interrupted compaction are cleaned up

use std::fs;
use std::io::Write;
use std::path::Path;

use recordstore::data::DataTable;
use recordstore::records::RecordsTable;
use recordstore::{AppendCache, Config, Storage};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_with(base: &Path, compact_on_open: bool) -> Storage {
    let config = Config::builder()
        .path(base)
        .compaction_min_waste(100)
        .compaction_waste_ratio(0.25)
        .compact_on_open(compact_on_open)
        .build();
    Storage::open(config, AppendCache::default()).unwrap()
}

/// Leaves 4500 bytes of waste in a 12032 byte heap
fn write_with_waste(storage: &Storage) -> recordstore::RecordId {
    let record = storage.create_new_record().unwrap();
    storage.write_bytes(record, &[1u8; 3000]).unwrap();
    storage.write_bytes(record, &[2u8; 5000]).unwrap();
    record
}

// =============================================================================
// Explicit Compaction Tests
// =============================================================================

#[test]
fn test_compact_preserves_payloads() {
    let temp = TempDir::new().unwrap();
    let storage = open_with(&temp.path().join("store"), false);

    let a = storage.create_new_record().unwrap();
    storage.write_bytes(a, &[1u8; 1000]).unwrap();
    storage.write_bytes(a, &[2u8; 3000]).unwrap();
    let b = storage.create_new_record().unwrap();
    storage.write_bytes(b, b"small").unwrap();
    let empty = storage.create_new_record().unwrap();
    assert_eq!(storage.stats().unwrap().waste, 1024);

    storage.compact().unwrap();

    assert_eq!(storage.read_bytes(a).unwrap(), vec![2u8; 3000]);
    assert_eq!(storage.read_bytes(b).unwrap(), b"small");
    assert!(storage.read_bytes(empty).unwrap().is_empty());

    let stats = storage.stats().unwrap();
    assert_eq!(stats.waste, 0);
    // 32 byte header + 4500 for `a` + 8 for `b`
    assert_eq!(stats.data_file_len, 32 + 4500 + 8);
    assert_eq!(storage.address(a).unwrap(), 32);
    assert_eq!(storage.address(b).unwrap(), 32 + 4500);
}

#[test]
fn test_compact_clears_spans_of_empty_and_free_slots() {
    let temp = TempDir::new().unwrap();
    let storage = open_with(&temp.path().join("store"), false);
    let truncated = storage.create_new_record().unwrap();
    storage.write_bytes(truncated, &[1u8; 100]).unwrap();
    storage.write_bytes(truncated, &[]).unwrap();
    let deleted = storage.create_new_record().unwrap();
    storage.write_bytes(deleted, &[2u8; 100]).unwrap();
    storage.delete_record(deleted).unwrap();

    storage.compact().unwrap();

    for record in [truncated, deleted] {
        assert_eq!(storage.address(record).unwrap(), 0);
        assert_eq!(storage.capacity(record).unwrap(), 0);
        storage.check_sanity(record).unwrap();
    }
    assert_eq!(storage.stats().unwrap().data_file_len, 32);
}

#[test]
fn test_reused_id_after_compaction_gets_fresh_span() {
    let temp = TempDir::new().unwrap();
    let storage = open_with(&temp.path().join("store"), false);
    let keep = storage.create_new_record().unwrap();
    storage.write_bytes(keep, b"keep me").unwrap();
    let deleted = storage.create_new_record().unwrap();
    storage.write_bytes(deleted, &[9u8; 64]).unwrap();
    storage.delete_record(deleted).unwrap();
    storage.compact().unwrap();

    let reused = storage.create_new_record().unwrap();
    storage.write_bytes(reused, b"new").unwrap();

    assert_eq!(reused, deleted);
    assert_eq!(storage.read_bytes(reused).unwrap(), b"new");
    assert_eq!(storage.read_bytes(keep).unwrap(), b"keep me");
}

#[test]
fn test_compact_flushes_buffered_appends() {
    let temp = TempDir::new().unwrap();
    let storage = open_with(&temp.path().join("store"), false);
    let record = write_with_waste(&storage);

    let mut stream = storage.append_stream(record).unwrap();
    stream.write_all(b"tail").unwrap();
    storage.compact().unwrap();

    let mut expected = vec![2u8; 5000];
    expected.extend_from_slice(b"tail");
    assert_eq!(storage.read_bytes(record).unwrap(), expected);
}

#[test]
fn test_compact_removes_temp_file() {
    let temp = TempDir::new().unwrap();
    let storage = open_with(&temp.path().join("store"), false);
    write_with_waste(&storage);

    storage.compact().unwrap();

    assert!(!temp.path().join("store.data.temp").exists());
    assert!(temp.path().join("store.data").exists());
}

#[test]
fn test_compacted_dataset_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("store");
    let record;
    {
        let storage = open_with(&base, false);
        record = write_with_waste(&storage);
        storage.compact().unwrap();
        storage.dispose().unwrap();
    }

    let storage = open_with(&base, false);

    assert_eq!(storage.read_bytes(record).unwrap(), vec![2u8; 5000]);
    assert_eq!(storage.stats().unwrap().waste, 0);
}

// =============================================================================
// Compaction On Open Tests
// =============================================================================

#[test]
fn test_open_compacts_when_over_threshold() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("store");
    let record;
    {
        let storage = open_with(&base, false);
        record = write_with_waste(&storage);
        let stats = storage.stats().unwrap();
        assert_eq!(stats.waste, 4500);
        assert_eq!(stats.data_file_len, 32 + 4500 + 7500);
    }

    let storage = open_with(&base, true);

    let stats = storage.stats().unwrap();
    assert_eq!(stats.waste, 0);
    assert_eq!(stats.data_file_len, 32 + 7500);
    assert_eq!(storage.read_bytes(record).unwrap(), vec![2u8; 5000]);
}

#[test]
fn test_open_skips_compaction_when_disabled() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("store");
    {
        let storage = open_with(&base, false);
        write_with_waste(&storage);
    }

    let storage = open_with(&base, false);

    assert_eq!(storage.stats().unwrap().waste, 4500);
}

#[test]
fn test_open_skips_compaction_below_ratio() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("store");
    {
        let storage = open_with(&base, false);
        let record = storage.create_new_record().unwrap();
        storage.write_bytes(record, &[1u8; 200]).unwrap();
        let big = storage.create_new_record().unwrap();
        storage.write_bytes(big, &[3u8; 10_000]).unwrap();
        // 256 wasted out of ~15k
        storage.write_bytes(record, &[2u8; 300]).unwrap();
    }

    let storage = open_with(&base, true);

    assert_eq!(storage.stats().unwrap().waste, 256);
}

#[test]
fn test_open_removes_leftover_temp_file() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("store");
    {
        let storage = open_with(&base, false);
        let record = storage.create_new_record().unwrap();
        storage.write_bytes(record, b"survivor").unwrap();
    }
    fs::write(temp.path().join("store.data.temp"), b"half written heap").unwrap();

    let storage = open_with(&base, true);

    assert!(!temp.path().join("store.data.temp").exists());
    assert_eq!(storage.live_records_count().unwrap(), 1);
}

#[test]
fn test_failed_compaction_on_open_closes_files_cleanly() {
    let temp = TempDir::new().unwrap();
    let base = temp.path().join("store");
    let kept;
    let broken;
    {
        let storage = open_with(&base, false);
        kept = write_with_waste(&storage);
        broken = storage.create_new_record().unwrap();
        storage.write_bytes(broken, b"unreadable").unwrap();
    }
    {
        // Point a live record past the end of the heap so the copy fails
        let mut table = RecordsTable::open(&temp.path().join("store.rindex")).unwrap();
        table.set_address(broken, 1 << 30).unwrap();
        table.dispose().unwrap();
    }

    assert!(Storage::open(
        Config::builder().path(&base).compaction_min_waste(100).build(),
        AppendCache::default()
    )
    .is_err());

    // Both files were left safely closed and untouched
    let mut records = RecordsTable::open(&temp.path().join("store.rindex")).unwrap();
    assert_eq!(records.address(broken).unwrap(), 1 << 30);
    records.dispose().unwrap();
    let data = DataTable::open(&temp.path().join("store.data")).unwrap();
    assert_eq!(data.waste(), 4500);
    assert!(!temp.path().join("store.data.temp").exists());

    let storage = open_with(&base, false);
    assert_eq!(storage.read_bytes(kept).unwrap(), vec![2u8; 5000]);
}
