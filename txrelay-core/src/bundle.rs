// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Bundle assembler.
//!
//! Tagged records are rendered as CSV-style lines and accumulated into a
//! text bundle that starts with a fixed header line. Once the running size
//! (header included) reaches the threshold the bundle is published and
//! reset. Delivery is at most once: a failed publish drops the bundle.

use std::collections::BTreeMap;

use crate::record::Record;
use crate::sink::BrokerSink;

/// First line of every bundle and of the debug CSV.
pub const BUNDLE_HEADER: &str =
    "Transaction Type,Creation Time,Mobile Number,IP Address,Personal Info,FilterID\n";

/// Column names of [`BUNDLE_HEADER`].
pub const COLUMNS: [&str; 6] = [
    "Transaction Type",
    "Creation Time",
    "Mobile Number",
    "IP Address",
    "Personal Info",
    "FilterID",
];

/// Compact personal-info form: a JSON object whose first `","` separator
/// is replaced by `" "`, e.g. `{"Email":"a@b.c" "Name":"A B"}`.
pub fn render_personal_info(info: &BTreeMap<String, String>) -> String {
    // A map of strings always serializes.
    let json = serde_json::to_string(info).unwrap_or_else(|_| "{}".to_string());
    json.replacen("\",\"", "\" \"", 1)
}

/// Render one record as a bundle line, trailing newline included.
pub fn render_line(record: &Record) -> String {
    format!(
        "{},{},{},{},{},{}\n",
        record.transaction_type,
        record.creation_time,
        record.mobile_number,
        record.ip_address,
        render_personal_info(&record.personal_info),
        record.filter_id
    )
}

/// What happened to a bundle handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Published { bytes: usize, records: usize },
    Dropped { bytes: usize, records: usize },
}

/// Running totals for an assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleStats {
    pub records_added: u64,
    pub bundles_published: u64,
    pub bundles_dropped: u64,
    pub records_published: u64,
    pub records_dropped: u64,
}

/// Accumulates records and flushes size-bounded bundles to a sink.
pub struct BundleAssembler<S: BrokerSink> {
    sink: S,
    topic: String,
    threshold_bytes: usize,
    body: String,
    records: usize,
    stats: BundleStats,
}

impl<S: BrokerSink> BundleAssembler<S> {
    pub fn new(sink: S, topic: impl Into<String>, threshold_bytes: usize) -> Self {
        Self {
            sink,
            topic: topic.into(),
            threshold_bytes,
            body: String::from(BUNDLE_HEADER),
            records: 0,
            stats: BundleStats::default(),
        }
    }

    /// Current bundle size in bytes, header included.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Records waiting in the current bundle.
    pub fn pending_records(&self) -> usize {
        self.records
    }

    pub fn threshold_bytes(&self) -> usize {
        self.threshold_bytes
    }

    pub fn stats(&self) -> BundleStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Add a record; flushes when the bundle reaches the threshold.
    pub fn add(&mut self, record: &Record) -> Option<FlushOutcome> {
        let line = render_line(record);
        self.body.push_str(&line);
        self.records += 1;
        self.stats.records_added += 1;

        tracing::debug!(
            transaction_type = record.transaction_type,
            line_bytes = line.len(),
            bundle_bytes = self.body.len(),
            "Added record to bundle"
        );

        if self.body.len() >= self.threshold_bytes {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Publish whatever is left beyond the header.
    pub fn flush_remaining(&mut self) -> Option<FlushOutcome> {
        if self.records == 0 {
            return None;
        }
        Some(self.flush())
    }

    fn flush(&mut self) -> FlushOutcome {
        let bytes = self.body.len();
        let records = self.records;

        tracing::info!(topic = %self.topic, bundle_bytes = bytes, records = records, "Sending bundle");

        let outcome = match self.sink.publish(&self.topic, self.body.as_bytes()) {
            Ok(()) => {
                tracing::info!(topic = %self.topic, bundle_bytes = bytes, "Bundle published");
                self.stats.bundles_published += 1;
                self.stats.records_published += records as u64;
                FlushOutcome::Published { bytes, records }
            }
            Err(e) => {
                tracing::error!(
                    topic = %self.topic,
                    bundle_bytes = bytes,
                    records = records,
                    error = %e,
                    "Failed to publish bundle, dropping it"
                );
                self.stats.bundles_dropped += 1;
                self.stats.records_dropped += records as u64;
                FlushOutcome::Dropped { bytes, records }
            }
        };

        self.body.clear();
        self.body.push_str(BUNDLE_HEADER);
        self.records = 0;
        outcome
    }
}
