// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Record store microbenchmarks.
//!
//! Measures append and indexed read on the shared-memory record store at
//! various payload sizes, plus the record codec.

use std::collections::BTreeMap;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use txrelay_core::record::{self, Record};
use txrelay_core::shm::{RecordStore, SharedMemoryRegion};

/// Payload sizes to benchmark (in bytes).
const PAYLOAD_SIZES: &[usize] = &[64, 256, 1024, 4096, 16384];

const STORE_SIZE: usize = 64 * 1024 * 1024;

fn fresh_store(name: &str) -> RecordStore {
    let _ = SharedMemoryRegion::unlink(name);
    RecordStore::open_or_create(name, STORE_SIZE).expect("Failed to create store")
}

/// Benchmark store appends; the store is recreated whenever it fills up.
fn bench_store_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_append");
    group.measurement_time(Duration::from_secs(5));

    for &size in PAYLOAD_SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let name = format!("bench_append_{}_{}", size, std::process::id());
            let mut store = fresh_store(&name);
            let payload = vec![0xABu8; size];

            b.iter(|| {
                if store.append(black_box(&payload)).is_err() {
                    store = fresh_store(&name);
                }
            });

            let _ = SharedMemoryRegion::unlink(&name);
        });
    }

    group.finish();
}

/// Benchmark indexed reads over a prefilled store.
fn bench_store_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_get");
    group.measurement_time(Duration::from_secs(5));

    for &size in PAYLOAD_SIZES {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let name = format!("bench_get_{}_{}", size, std::process::id());
            let store = fresh_store(&name);
            let payload = vec![0xABu8; size];
            for _ in 0..256 {
                store.append(&payload).expect("Append failed");
            }

            let mut index = 0;
            b.iter(|| {
                black_box(store.get(index % 256).expect("Read failed"));
                index += 1;
            });

            let _ = SharedMemoryRegion::unlink(&name);
        });
    }

    group.finish();
}

fn sample_record() -> Record {
    let mut info = BTreeMap::new();
    info.insert("Name".to_string(), "Eve Black".to_string());
    info.insert("Email".to_string(), "Eve.Black@example.com".to_string());
    Record::new(7, 45_296_789, 5_551_234_567, "203.0.113.7", info)
}

/// Benchmark encode, decode and checksum verification of one record.
fn bench_record_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_codec");
    group.measurement_time(Duration::from_secs(3));

    let record = sample_record();
    let encoded = record::encode(&record).expect("Encode failed");

    group.bench_function("encode", |b| {
        b.iter(|| black_box(record::encode(black_box(&record)).ok()));
    });
    group.bench_function("decode_verify", |b| {
        b.iter(|| {
            let decoded = record::decode(black_box(&encoded)).expect("Decode failed");
            black_box(decoded.verify().is_ok());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_store_append,
    bench_store_get,
    bench_record_codec,
);

criterion_main!(benches);
