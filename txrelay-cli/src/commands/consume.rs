// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `txrelay consume` command - Relay store entries to the broker.
//!
//! Attaches to the shared store (retrying until the producer has created
//! it), then polls it on a fixed interval and ships tagged bundles to the
//! spool sink until interrupted.

use std::time::Duration;

use txrelay_core::{
    BundleAssembler, CsvDumper, FilterEngine, RecordStore, Relay, RelayConfig, SpoolSink,
    TimingSeries,
};

use crate::error::{CliError, CliResult};
use crate::metrics;

/// Upper bound for the store-open backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

pub async fn execute(config: &RelayConfig, max_cycles: Option<u64>) -> CliResult<()> {
    // Rules are loaded once; a bad rule file is fatal.
    let engine = FilterEngine::load_file(&config.consumer.rule_file)?;

    let sink = SpoolSink::new(&config.broker.spool_dir).map_err(|e| CliError::Io {
        context: "opening spool directory",
        source: e,
    })?;
    let assembler = BundleAssembler::new(
        sink,
        config.broker.topic.as_str(),
        config.consumer.bundle_threshold_bytes,
    );
    let mut relay = Relay::new(engine, assembler);
    if let Some(path) = &config.consumer.debug_csv {
        tracing::info!(path = %path.display(), "Debug CSV dump enabled");
        relay = relay.with_csv_dump(CsvDumper::new(path));
    }

    if let Some(port) = config.metrics_port {
        metrics::start_metrics_server(port);
    }

    let Some(store) = open_store(config).await? else {
        return Ok(());
    };

    println!(
        "▶ Consuming from {} every {}ms (topic: {}, threshold: {} bytes)",
        config.store.name,
        config.consumer.poll_interval.as_millis(),
        config.broker.topic,
        config.consumer.bundle_threshold_bytes
    );

    let mut cycles = 0u64;
    loop {
        let report = relay.run_cycle(&store);
        metrics::observe_cycle(&report);
        cycles += 1;

        if !report.timings.is_empty() {
            log_timings(report.timings).await?;
        }

        if max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(config.consumer.poll_interval) => {}
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Shutting down...");
                break;
            }
        }
    }

    let stats = relay.bundle_stats();
    tracing::info!(
        cycles = cycles,
        last_processed_index = relay.last_processed_index(),
        bundles_published = stats.bundles_published,
        bundles_dropped = stats.bundles_dropped,
        "Consumer stopped"
    );
    println!(
        "✓ Processed {} entries, {} bundles published, {} dropped",
        relay.last_processed_index(),
        stats.bundles_published,
        stats.bundles_dropped
    );

    Ok(())
}

/// Open the store, backing off while it does not exist yet.
///
/// Returns `None` when interrupted before the store appears.
async fn open_store(config: &RelayConfig) -> CliResult<Option<RecordStore>> {
    let mut delay = config.consumer.connect_retry;
    let mut attempt = 1u32;

    loop {
        match RecordStore::open_existing(config.store.name.as_str()) {
            Ok(store) => {
                tracing::info!(store = %config.store.name, entries = store.len(), "Attached to record store");
                return Ok(Some(store));
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    store = %config.store.name,
                    attempt = attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Record store unavailable, retrying"
                );
            }
            Err(e) => return Err(e.into()),
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => return Ok(None),
        }
        delay = (delay * 2).min(MAX_RETRY_DELAY);
        attempt += 1;
    }
}

/// Summarize the cycle's timings off the async runtime.
async fn log_timings(timings: TimingSeries) -> CliResult<()> {
    tokio::task::spawn_blocking(move || {
        for sample in timings.samples() {
            metrics::PROCESSING_SECONDS.observe(sample.as_secs_f64());
        }
        if let Some(summary) = timings.summary() {
            tracing::info!(
                records = summary.count,
                total_us = summary.total.as_micros() as u64,
                average_us = summary.average.as_micros() as u64,
                "Cycle timing: {}",
                summary
            );
        }
    })
    .await?;
    Ok(())
}
