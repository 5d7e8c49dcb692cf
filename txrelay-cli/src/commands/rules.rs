// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `txrelay rules` command - List the rules a rule file defines.

use std::path::Path;

use txrelay_core::FilterEngine;

use crate::error::CliResult;

pub async fn execute(file: &Path) -> CliResult<()> {
    let engine = FilterEngine::load_file(file)?;

    println!("Rules in {} ({}):", file.display(), engine.len());
    for rule in engine.rules() {
        let conditions: Vec<String> = rule
            .conditions
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        println!(
            "  - {} [{}] {}",
            rule.id,
            rule.operation,
            conditions.join(", ")
        );
    }

    Ok(())
}
