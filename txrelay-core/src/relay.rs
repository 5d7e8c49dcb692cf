// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Consumer pipeline: cursor, filter engine, bundle assembler and the
//! optional debug dump, driven one cycle at a time.

use std::ops::Range;

use crate::bundle::{BundleAssembler, BundleStats, FlushOutcome};
use crate::csv_dump::CsvDumper;
use crate::cursor::CursorReader;
use crate::filter::FilterEngine;
use crate::shm::RecordStore;
use crate::sink::BrokerSink;
use crate::timing::TimingSeries;

/// Result of one consumer cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub range: Range<usize>,
    /// Records that passed verification and were handed to the assembler.
    pub relayed: usize,
    pub decode_failures: usize,
    pub integrity_failures: usize,
    /// Every bundle flushed during the cycle, in order.
    pub flushes: Vec<FlushOutcome>,
    pub timings: TimingSeries,
    pub last_processed_index: usize,
}

impl CycleReport {
    pub fn bundles_published(&self) -> usize {
        self.flushes
            .iter()
            .filter(|f| matches!(f, FlushOutcome::Published { .. }))
            .count()
    }

    pub fn bundles_dropped(&self) -> usize {
        self.flushes.len() - self.bundles_published()
    }
}

pub struct Relay<S: BrokerSink> {
    cursor: CursorReader,
    filter: FilterEngine,
    assembler: BundleAssembler<S>,
    dumper: Option<CsvDumper>,
}

impl<S: BrokerSink> Relay<S> {
    pub fn new(filter: FilterEngine, assembler: BundleAssembler<S>) -> Self {
        Self {
            cursor: CursorReader::new(),
            filter,
            assembler,
            dumper: None,
        }
    }

    /// Also append every relayed batch to a debug CSV file.
    pub fn with_csv_dump(mut self, dumper: CsvDumper) -> Self {
        self.dumper = Some(dumper);
        self
    }

    pub fn last_processed_index(&self) -> usize {
        self.cursor.last_processed_index()
    }

    pub fn filter(&self) -> &FilterEngine {
        &self.filter
    }

    pub fn bundle_stats(&self) -> BundleStats {
        self.assembler.stats()
    }

    pub fn sink(&self) -> &S {
        self.assembler.sink()
    }

    /// Process every entry appended since the last cycle.
    ///
    /// Records are bundled in index order and whatever remains in the bundle
    /// at the end of the cycle is flushed. A failed debug dump is logged and
    /// does not affect delivery.
    pub fn run_cycle(&mut self, store: &RecordStore) -> CycleReport {
        let batch = self.cursor.poll(store, &self.filter);

        let mut flushes = Vec::new();
        for record in &batch.records {
            if let Some(outcome) = self.assembler.add(record) {
                flushes.push(outcome);
            }
        }
        if let Some(outcome) = self.assembler.flush_remaining() {
            flushes.push(outcome);
        }

        if let Some(dumper) = &self.dumper {
            if let Err(e) = dumper.append(&batch.records) {
                tracing::warn!(path = %dumper.path().display(), error = %e, "Debug CSV dump failed");
            }
        }

        if batch.examined() > 0 {
            tracing::info!(
                from = batch.range.start,
                to = batch.range.end,
                relayed = batch.records.len(),
                decode_failures = batch.decode_failures,
                integrity_failures = batch.integrity_failures,
                bundles = flushes.len(),
                "Cycle complete"
            );
        }

        CycleReport {
            range: batch.range,
            relayed: batch.records.len(),
            decode_failures: batch.decode_failures,
            integrity_failures: batch.integrity_failures,
            flushes,
            timings: batch.timings,
            last_processed_index: self.cursor.last_processed_index(),
        }
    }
}
