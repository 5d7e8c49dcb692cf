// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Consumer-side cursor over the shared record store.
//!
//! The cursor lives only in process memory. A restarted consumer begins at
//! index 0 again and replays the whole store.

use std::ops::Range;
use std::time::Instant;

use crate::filter::FilterEngine;
use crate::record::{self, Record};
use crate::shm::RecordStore;
use crate::timing::TimingSeries;

/// Outcome of one poll cycle.
#[derive(Debug, Default)]
pub struct PollBatch {
    /// Store indexes examined this cycle.
    pub range: Range<usize>,
    /// Decoded, verified and tagged records in index order.
    pub records: Vec<Record>,
    /// Entries that could not be read or decoded.
    pub decode_failures: usize,
    /// Entries whose checksum did not verify.
    pub integrity_failures: usize,
    /// Processing time of each accepted record.
    pub timings: TimingSeries,
}

impl PollBatch {
    /// Number of store entries examined.
    pub fn examined(&self) -> usize {
        self.range.len()
    }
}

/// Tracks the next unprocessed store index.
#[derive(Debug, Default)]
pub struct CursorReader {
    last_processed_index: usize,
}

impl CursorReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the first entry not yet processed.
    pub fn last_processed_index(&self) -> usize {
        self.last_processed_index
    }

    /// Pull every entry appended since the previous poll.
    ///
    /// Malformed and corrupt entries are logged, counted and skipped; they
    /// never abort the cycle.
    pub fn poll(&mut self, store: &RecordStore, filter: &FilterEngine) -> PollBatch {
        let end = store.len();
        let start = self.last_processed_index;
        let mut batch = PollBatch {
            range: start..end.max(start),
            ..PollBatch::default()
        };

        if end <= start {
            return batch;
        }

        tracing::debug!(from = start, to = end, "Reading new store entries");

        for index in start..end {
            let started = Instant::now();

            let payload = match store.get(index) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!(index = index, error = %e, "Failed to read store entry");
                    batch.decode_failures += 1;
                    continue;
                }
            };

            let mut record = match record::decode(&payload) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(index = index, error = %e, "Failed to decode record");
                    batch.decode_failures += 1;
                    continue;
                }
            };

            if let Err(e) = record.verify() {
                tracing::error!(
                    index = index,
                    transaction_type = record.transaction_type,
                    error = %e,
                    "Checksum mismatch, dropping record"
                );
                batch.integrity_failures += 1;
                continue;
            }

            filter.apply(&mut record);
            batch.records.push(record);
            batch.timings.record(started.elapsed());
        }

        self.last_processed_index = end;
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shm::SharedMemoryRegion;
    use std::collections::BTreeMap;

    struct Scratch(String);

    impl Scratch {
        fn new(tag: &str) -> Self {
            Self(format!("txrelay-cursor-{}-{}", tag, std::process::id()))
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = SharedMemoryRegion::unlink(&self.0);
        }
    }

    fn payload(transaction_type: i32) -> Vec<u8> {
        let mut info = BTreeMap::new();
        info.insert("Name".to_string(), "John Doe".to_string());
        let record = Record::new(transaction_type, 110_000_000, 5_551_112_222, "10.0.0.5", info);
        record::encode(&record).unwrap()
    }

    fn engine() -> FilterEngine {
        FilterEngine::load_str("# OR query\nID 4\nisTTY 1\n")
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        let scratch = Scratch::new("malformed");
        let store = RecordStore::open_or_create(&scratch.0, 64 * 1024).unwrap();
        store.append(&payload(1)).unwrap();
        store.append(b"not json").unwrap();
        store.append(&payload(3)).unwrap();

        let mut cursor = CursorReader::new();
        let batch = cursor.poll(&store, &engine());
        assert_eq!(batch.range, 0..3);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.decode_failures, 1);
        assert_eq!(batch.integrity_failures, 0);
        assert_eq!(batch.timings.len(), 2);
        assert_eq!(cursor.last_processed_index(), 3);

        assert_eq!(batch.records[0].filter_id, "4");
        assert_eq!(batch.records[1].transaction_type, 3);
        assert_eq!(batch.records[1].filter_id, "0");

        let again = cursor.poll(&store, &engine());
        assert!(again.range.is_empty());
        assert_eq!(again.examined(), 0);
        assert!(again.records.is_empty());
        assert_eq!(cursor.last_processed_index(), 3);
    }

    #[test]
    fn test_checksum_mismatch_counted_separately() {
        let scratch = Scratch::new("integrity");
        let store = RecordStore::open_or_create(&scratch.0, 64 * 1024).unwrap();

        let mut info = BTreeMap::new();
        info.insert("Name".to_string(), "Jane Smith".to_string());
        let mut tampered = Record::new(2, 1, 2, "3.3.3.3", info);
        tampered.ip_address = "4.4.4.4".to_string();
        store.append(&record::encode(&tampered).unwrap()).unwrap();
        store.append(&payload(1)).unwrap();

        let mut cursor = CursorReader::new();
        let batch = cursor.poll(&store, &engine());
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.integrity_failures, 1);
        assert_eq!(batch.decode_failures, 0);
        assert_eq!(cursor.last_processed_index(), 2);
    }

    #[test]
    fn test_poll_picks_up_later_appends() {
        let scratch = Scratch::new("incremental");
        let store = RecordStore::open_or_create(&scratch.0, 64 * 1024).unwrap();
        let mut cursor = CursorReader::new();

        assert!(cursor.poll(&store, &engine()).range.is_empty());

        store.append(&payload(1)).unwrap();
        let first = cursor.poll(&store, &engine());
        assert_eq!(first.range, 0..1);

        store.append(&payload(2)).unwrap();
        store.append(&payload(3)).unwrap();
        let second = cursor.poll(&store, &engine());
        assert_eq!(second.range, 1..3);
        assert_eq!(second.records.len(), 2);
    }
}
