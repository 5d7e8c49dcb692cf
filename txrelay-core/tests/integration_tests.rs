// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for txrelay.
//!
//! These tests drive the full path from producer appends through the shared
//! store to bundles landing in a sink.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use txrelay_core::filter::NO_MATCH_ID;
use txrelay_core::record::{self, Record};
use txrelay_core::shm::SharedMemoryRegion;
use txrelay_core::{
    BundleAssembler, ConfigLoader, FilterEngine, MemorySink, RecordStore, Relay, SpoolSink,
    BUNDLE_HEADER,
};

static NEXT: AtomicUsize = AtomicUsize::new(0);

/// Unlinks the named store when the test ends.
struct ScratchStore(String);

impl ScratchStore {
    fn new(tag: &str) -> Self {
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        Self(format!("txrelay-it-{}-{}-{}", tag, std::process::id(), n))
    }
}

impl Drop for ScratchStore {
    fn drop(&mut self) {
        let _ = SharedMemoryRegion::unlink(&self.0);
    }
}

const RULES: &str = "\
# AND query
ID 1
ismobile 5551234567
isTTY 2

# OR query
ID 2
isIP 10.0.0.1,isTTY 3

# Both AND and OR query
ID 3
ismobile 5551234567,isIP 10.0.0.9,isTTY 9
";

fn record(transaction_type: i32, mobile: i64, ip: &str) -> Record {
    let mut info = BTreeMap::new();
    info.insert("Name".to_string(), "Dana Green".to_string());
    info.insert("Email".to_string(), "Dana.Green@example.com".to_string());
    Record::new(transaction_type, 43_200_000, mobile, ip, info)
}

fn append(store: &RecordStore, record: &Record) {
    let payload = record::encode(record).expect("Failed to encode record");
    store.append(&payload).expect("Failed to append record");
}

/// Two good records and one with a corrupted checksum.
#[test]
fn test_end_to_end_integrity_and_tagging() {
    let name = ScratchStore::new("e2e");
    let producer = RecordStore::open_or_create(&name.0, 64 * 1024).expect("Failed to create store");

    append(&producer, &record(2, 5_551_234_567, "10.0.0.9"));
    let mut corrupt = record(3, 5_550_000_000, "10.0.0.1");
    corrupt.checksum ^= 0xFF;
    append(&producer, &corrupt);
    append(&producer, &record(3, 5_550_000_000, "10.0.0.1"));

    // The consumer attaches to the existing region by name.
    let consumer = RecordStore::open_existing(&name.0).expect("Failed to open store");
    let sink = MemorySink::new();
    let engine = FilterEngine::load_str(RULES);
    let mut relay = Relay::new(engine, BundleAssembler::new(sink.clone(), "transactions", 1 << 20));

    let report = relay.run_cycle(&consumer);
    assert_eq!(report.relayed, 2);
    assert_eq!(report.integrity_failures, 1);
    assert_eq!(report.decode_failures, 0);
    assert_eq!(report.last_processed_index, 3);

    let published = sink.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "transactions");

    let bundle = String::from_utf8(published[0].payload.clone()).expect("Bundle is not UTF-8");
    assert!(bundle.starts_with(BUNDLE_HEADER));
    let lines: Vec<&str> = bundle.lines().skip(1).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("2,43200000,5551234567,10.0.0.9,"));
    assert!(lines[0].ends_with(",1 3"), "unexpected tag: {}", lines[0]);
    assert!(lines[1].starts_with("3,"));
    assert!(lines[1].ends_with(",2"), "unexpected tag: {}", lines[1]);
}

/// Records matching no rule carry the public no-match id.
#[test]
fn test_unmatched_record_uses_no_match_id() {
    let name = ScratchStore::new("nomatch");
    let store = RecordStore::open_or_create(&name.0, 64 * 1024).expect("Failed to create store");
    append(&store, &record(8, 5_550_000_000, "192.0.2.1"));

    let sink = MemorySink::new();
    let mut relay = Relay::new(
        FilterEngine::load_str(RULES),
        BundleAssembler::new(sink.clone(), "q", 1 << 20),
    );
    relay.run_cycle(&store);

    let bundles = sink.bundles();
    let line = bundles[0].lines().nth(1).expect("Bundle has no record line");
    assert!(line.ends_with(&format!(",{}", NO_MATCH_ID)));
}

/// The cursor never moves backwards and never reprocesses an index.
#[test]
fn test_cursor_monotonic_across_cycles() {
    let name = ScratchStore::new("cursor");
    let store = RecordStore::open_or_create(&name.0, 64 * 1024).expect("Failed to create store");
    let sink = MemorySink::new();
    let engine = FilterEngine::load_str(RULES);
    let mut relay = Relay::new(engine, BundleAssembler::new(sink.clone(), "q", 1 << 20));

    let mut previous = 0;
    let mut relayed = 0;
    for batch in [3usize, 0, 1, 5] {
        for i in 0..batch {
            append(&store, &record(i as i32, 1_000 + i as i64, "192.168.1.1"));
        }
        let report = relay.run_cycle(&store);
        assert_eq!(report.range.start, previous);
        assert!(report.last_processed_index >= previous);
        assert_eq!(report.relayed, batch);
        previous = report.last_processed_index;
        relayed += report.relayed;
    }

    assert_eq!(previous, 9);
    assert_eq!(relayed, 9);
    // One bundle per cycle that saw records.
    assert_eq!(sink.bundles().len(), 3);
}

/// Small thresholds split a cycle into several bundles.
#[test]
fn test_threshold_splits_bundles() {
    let name = ScratchStore::new("split");
    let store = RecordStore::open_or_create(&name.0, 64 * 1024).expect("Failed to create store");
    for i in 0..10 {
        append(&store, &record(i, 5_551_234_567, "10.0.0.1"));
    }

    let sink = MemorySink::new();
    let engine = FilterEngine::load_str(RULES);
    let threshold = BUNDLE_HEADER.len() + 300;
    let mut relay = Relay::new(engine, BundleAssembler::new(sink.clone(), "q", threshold));

    let report = relay.run_cycle(&store);
    assert!(report.flushes.len() > 1);

    let bundles = sink.bundles();
    let total_lines: usize = bundles.iter().map(|b| b.lines().count() - 1).sum();
    assert_eq!(total_lines, 10);
    for bundle in &bundles[..bundles.len() - 1] {
        assert!(bundle.len() >= threshold);
    }
}

/// A reader thread sees a producer thread's appends in order.
#[test]
fn test_concurrent_producer_and_relay() {
    let name = ScratchStore::new("live");
    let store = RecordStore::open_or_create(&name.0, 256 * 1024).expect("Failed to create store");

    let producer_name = name.0.clone();
    let producer = std::thread::spawn(move || {
        let store = RecordStore::open_existing(&producer_name).expect("Failed to open store");
        for i in 0..50 {
            append(&store, &record(i, 2_000 + i as i64, "10.10.10.10"));
            if i % 10 == 0 {
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    });

    let sink = MemorySink::new();
    let engine = FilterEngine::load_str(RULES);
    let mut relay = Relay::new(engine, BundleAssembler::new(sink.clone(), "q", 1 << 20));

    let mut relayed = 0;
    while relayed < 50 {
        relayed += relay.run_cycle(&store).relayed;
        std::thread::sleep(Duration::from_millis(1));
    }
    producer.join().expect("Producer thread panicked");

    let types: Vec<i32> = sink
        .bundles()
        .iter()
        .flat_map(|b| {
            b.lines()
                .skip(1)
                .map(|l| l.split(',').next().unwrap_or_default().parse::<i32>().unwrap_or(-1))
                .collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(types, (0..50).collect::<Vec<_>>());
}

/// Configuration, rule file and spool sink wired together from disk.
#[test]
fn test_config_rules_and_spool_from_disk() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let name = ScratchStore::new("disk");

    std::fs::write(temp_dir.path().join("queries.txt"), RULES).expect("Failed to write rules");
    let config_path = temp_dir.path().join("txrelay.yaml");
    std::fs::write(
        &config_path,
        format!(
            r#"
store:
  name: {}
  size_bytes: 65536

consumer:
  rule_file: queries.txt
  bundle_threshold_bytes: 4096

broker:
  topic: transactions
  spool_dir: {}
"#,
            name.0,
            temp_dir.path().join("spool").display()
        ),
    )
    .expect("Failed to write config");

    let config = ConfigLoader::load_file(&config_path).expect("Failed to load config");
    let engine = FilterEngine::load_file(&config.consumer.rule_file).expect("Failed to load rules");
    assert_eq!(engine.len(), 3);

    let store = RecordStore::open_or_create(config.store.name.as_str(), config.store.capacity.bytes())
        .expect("Failed to create store");
    append(&store, &record(2, 5_551_234_567, "10.0.0.9"));

    let sink = SpoolSink::new(&config.broker.spool_dir).expect("Failed to open spool");
    let assembler = BundleAssembler::new(
        sink,
        config.broker.topic.as_str(),
        config.consumer.bundle_threshold_bytes,
    );
    let mut relay = Relay::new(engine, assembler);
    let report = relay.run_cycle(&store);
    assert_eq!(report.bundles_published(), 1);

    let spooled = std::fs::read_to_string(
        config.broker.spool_dir.join("transactions-00000000.csv"),
    )
    .expect("Spooled bundle missing");
    assert!(spooled.starts_with(BUNDLE_HEADER));
    assert!(spooled.trim_end().ends_with(",1 3"));
}
