// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! txrelay Core Library
//!
//! Shared-memory transaction relay: a producer appends checksummed records
//! to a POSIX shared-memory store, and a consumer polls the store, verifies
//! and tags each record against a rule file, and ships size-bounded CSV
//! bundles to a broker sink.

pub mod bundle;
pub mod config;
pub mod csv_dump;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod record;
pub mod relay;
pub mod shm;
pub mod sink;
pub mod timing;
pub mod types;

// Re-export commonly used types
pub use bundle::{BundleAssembler, BundleStats, FlushOutcome, BUNDLE_HEADER};
pub use config::{ConfigLoader, RelayConfig};
pub use csv_dump::CsvDumper;
pub use cursor::{CursorReader, PollBatch};
pub use error::{
    CodecError, HardValidationError, IntegrityError, PublishError, RelayError, RelayResult,
    RuleLoadError, StoreError,
};
pub use filter::{FilterEngine, Operation, Rule};
pub use record::Record;
pub use relay::{CycleReport, Relay};
pub use shm::{RecordStore, StoreStats};
pub use sink::{BrokerSink, MemorySink, SpoolSink};
pub use timing::{TimingSeries, TimingSummary};
pub use types::{StoreCapacity, StoreName, TopicName};
