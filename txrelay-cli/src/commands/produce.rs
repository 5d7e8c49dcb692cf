// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `txrelay produce` command - Append generated records to the store.

use std::time::Instant;

use txrelay_core::record;
use txrelay_core::{RecordStore, RelayConfig, TimingSeries};

use crate::error::CliResult;
use crate::generator::RecordGenerator;

pub async fn execute(config: &RelayConfig, count: Option<usize>) -> CliResult<()> {
    let count = count.unwrap_or(config.producer.bulk_count);
    let store = RecordStore::open_or_create(config.store.name.as_str(), config.store.capacity.bytes())?;

    tracing::info!(
        store = %config.store.name,
        capacity = %config.store.capacity,
        existing = store.len(),
        count = count,
        "Producing records"
    );

    let mut generator = RecordGenerator::new();
    let mut timings = TimingSeries::new();

    for _ in 0..count {
        let started = Instant::now();
        let record = generator.next_record();
        let payload = record::encode(&record)?;
        let index = store.append(&payload)?;
        let elapsed = started.elapsed();
        timings.record(elapsed);

        tracing::debug!(
            index = index,
            transaction_type = record.transaction_type,
            creation_time = record.creation_time,
            mobile_number = record.mobile_number,
            ip_address = %record.ip_address,
            checksum = record.checksum,
            elapsed_us = elapsed.as_micros() as u64,
            "Appended record"
        );
    }

    let stats = store.stats();
    println!(
        "✓ Wrote {} records to {} ({} entries, {} of {} bytes used)",
        count, config.store.name, stats.entries, stats.used_bytes, stats.capacity
    );

    let summary = tokio::task::spawn_blocking(move || timings.summary()).await?;
    if let Some(summary) = summary {
        tracing::info!("Append timing: {}", summary);
        println!("  {}", summary);
    }

    Ok(())
}
