// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `txrelay validate` command - Validate configuration file.

use txrelay_core::{ConfigLoader, FilterEngine};

use crate::error::CliResult;

pub async fn execute(file: &str) -> CliResult<()> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Store:");
            println!("  Name:               {}", config.store.name);
            println!("  Capacity:           {}", config.store.capacity);
            println!("Producer:");
            println!("  Bulk Count:         {}", config.producer.bulk_count);
            println!("Consumer:");
            println!("  Rule File:          {}", config.consumer.rule_file.display());
            println!(
                "  Bundle Threshold:   {} bytes",
                config.consumer.bundle_threshold_bytes
            );
            println!(
                "  Poll Interval:      {}ms",
                config.consumer.poll_interval.as_millis()
            );
            if let Some(path) = &config.consumer.debug_csv {
                println!("  Debug CSV:          {}", path.display());
            }
            println!("Broker:");
            println!("  Topic:              {}", config.broker.topic);
            println!("  Spool Directory:    {}", config.broker.spool_dir.display());

            println!();
            match FilterEngine::load_file(&config.consumer.rule_file) {
                Ok(engine) => println!("✓ Rule file loads ({} rules)", engine.len()),
                Err(e) => println!("✗ Rule file does not load: {}", e),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
