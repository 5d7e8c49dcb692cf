// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! txrelay CLI
//!
//! Command-line interface for the shared-memory transaction relay.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use txrelay_core::ConfigLoader;

mod commands;
mod error;
mod generator;
mod metrics;

/// txrelay - Shared-memory transaction relay with rule-based tagging
#[derive(Parser)]
#[command(name = "txrelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "txrelay.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append generated records to the shared store
    Produce {
        /// Number of records (defaults to producer.bulk_count)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Poll the store, tag records and publish bundles
    Consume {
        /// Stop after this many poll cycles
        #[arg(long)]
        max_cycles: Option<u64>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },

    /// List the rules in a rule file
    Rules {
        /// Rule file (defaults to consumer.rule_file)
        file: Option<PathBuf>,
    },

    /// Show store occupancy and the most recent entries
    Inspect {
        /// Number of trailing entries to decode and print
        #[arg(short, long, default_value_t = 10)]
        tail: usize,
    },

    /// Remove the shared store
    Purge,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // `validate` reports its own load errors, so a bad config is not fatal yet.
    let config = ConfigLoader::load_file(&cli.config);

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config
            .as_ref()
            .map(|c| c.log_level.clone())
            .unwrap_or_else(|_| "info".to_string())
    };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Produce { count } => commands::produce::execute(&config?, count).await?,
        Commands::Consume { max_cycles } => {
            commands::consume::execute(&config?, max_cycles).await?
        }
        Commands::Validate { file } => commands::validate::execute(&file).await?,
        Commands::Rules { file } => {
            let file = match file {
                Some(file) => file,
                None => config?.consumer.rule_file,
            };
            commands::rules::execute(&file).await?
        }
        Commands::Inspect { tail } => commands::inspect::execute(&config?, tail).await?,
        Commands::Purge => commands::purge::execute(&config?).await?,
    }

    Ok(())
}
