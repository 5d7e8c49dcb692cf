// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory IPC module.
//!
//! Cross-process record transport using POSIX shared memory: a named
//! region plus an append-only record store with a release/acquire publish
//! protocol.

mod region;
mod store;

pub use region::SharedMemoryRegion;
pub use store::{RecordStore, StoreStats, MAX_PAYLOAD_SIZE};
