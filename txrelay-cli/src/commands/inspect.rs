// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `txrelay inspect` command - Show store occupancy and recent entries.

use txrelay_core::record;
use txrelay_core::{RecordStore, RelayConfig};

use crate::error::CliResult;

pub async fn execute(config: &RelayConfig, tail: usize) -> CliResult<()> {
    let store = RecordStore::open_existing(config.store.name.as_str())?;
    let stats = store.stats();

    println!("Record Store: {}", store.name());
    println!("  Entries:    {}", stats.entries);
    println!("  Used:       {} bytes", stats.used_bytes);
    println!("  Free:       {} bytes", stats.free_bytes);
    println!("  Capacity:   {} bytes", stats.capacity);

    if tail == 0 || stats.entries == 0 {
        return Ok(());
    }

    println!();
    let start = stats.entries.saturating_sub(tail);
    for index in start..stats.entries {
        let line = match store.get(index).map(|payload| record::decode(&payload)) {
            Ok(Ok(record)) => {
                let status = if record.verify().is_ok() { "ok" } else { "BAD CHECKSUM" };
                format!(
                    "type={} time={} mobile={} ip={} crc={:08x} [{}]",
                    record.transaction_type,
                    record.creation_time,
                    record.mobile_number,
                    record.ip_address,
                    record.checksum,
                    status
                )
            }
            Ok(Err(e)) => format!("undecodable: {}", e),
            Err(e) => format!("unreadable: {}", e),
        };
        println!("  [{:>6}] {}", index, line);
    }

    Ok(())
}
