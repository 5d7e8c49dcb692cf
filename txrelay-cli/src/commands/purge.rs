// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `txrelay purge` command - Remove the shared record store.

use txrelay_core::shm::SharedMemoryRegion;
use txrelay_core::RelayConfig;

use crate::error::CliResult;

pub async fn execute(config: &RelayConfig) -> CliResult<()> {
    let name = config.store.name.as_str();

    if SharedMemoryRegion::unlink(name)? {
        tracing::info!(store = %name, "Record store removed");
        println!("✓ Removed record store {}", name);
    } else {
        println!("Record store {} does not exist", name);
    }

    Ok(())
}
