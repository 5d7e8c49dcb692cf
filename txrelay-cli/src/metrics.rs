// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use txrelay_core::CycleReport;

lazy_static! {
    pub static ref RECORDS_RELAYED: IntCounter = register_int_counter!(
        "txrelay_records_relayed_total",
        "Records verified, tagged and handed to the bundle assembler"
    )
    .unwrap();
    pub static ref DECODE_FAILURES: IntCounter = register_int_counter!(
        "txrelay_decode_failures_total",
        "Store entries that could not be read or decoded"
    )
    .unwrap();
    pub static ref INTEGRITY_FAILURES: IntCounter = register_int_counter!(
        "txrelay_integrity_failures_total",
        "Records dropped because their checksum did not verify"
    )
    .unwrap();
    pub static ref BUNDLES_PUBLISHED: IntCounter = register_int_counter!(
        "txrelay_bundles_published_total",
        "Bundles accepted by the broker sink"
    )
    .unwrap();
    pub static ref BUNDLES_DROPPED: IntCounter = register_int_counter!(
        "txrelay_bundles_dropped_total",
        "Bundles dropped after a failed publish"
    )
    .unwrap();
    pub static ref LAST_PROCESSED_INDEX: IntGauge = register_int_gauge!(
        "txrelay_last_processed_index",
        "Index of the first store entry not yet processed"
    )
    .unwrap();
    pub static ref PROCESSING_SECONDS: Histogram = register_histogram!(
        "txrelay_record_processing_seconds",
        "Time to read, decode, verify and tag one record",
        vec![0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.010, 0.050] // Per-record work is microseconds
    )
    .unwrap();
}

/// Fold one cycle's counts into the counters.
pub fn observe_cycle(report: &CycleReport) {
    RECORDS_RELAYED.inc_by(report.relayed as u64);
    DECODE_FAILURES.inc_by(report.decode_failures as u64);
    INTEGRITY_FAILURES.inc_by(report.integrity_failures as u64);
    BUNDLES_PUBLISHED.inc_by(report.bundles_published() as u64);
    BUNDLES_DROPPED.inc_by(report.bundles_dropped() as u64);
    LAST_PROCESSED_INDEX.set(report.last_processed_index as i64);
}

/// Start the metrics server in a background task.
pub fn start_metrics_server(port: u16) {
    // Force initialization of metrics
    lazy_static::initialize(&RECORDS_RELAYED);
    lazy_static::initialize(&DECODE_FAILURES);
    lazy_static::initialize(&INTEGRITY_FAILURES);
    lazy_static::initialize(&BUNDLES_PUBLISHED);
    lazy_static::initialize(&BUNDLES_DROPPED);
    lazy_static::initialize(&LAST_PROCESSED_INDEX);
    lazy_static::initialize(&PROCESSING_SECONDS);

    tokio::spawn(async move {
        let addr = format!("0.0.0.0:{}", port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                tracing::info!("Metrics server starting on {}", addr);
                loop {
                    if let Ok((mut socket, _)) = listener.accept().await {
                        tokio::spawn(async move {
                            let body = metrics_handler();
                            let response = format!(
                                "HTTP/1.0 200 OK\r\nConnection: close\r\nContent-Length: {}\r\nContent-Type: text/plain; version=0.0.4\r\n\r\n{}",
                                body.len(),
                                body
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.flush().await;
                        });
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to bind metrics server: {}", e);
            }
        }
    });
}

fn metrics_handler() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("Encoding error"))
}
