// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Errors surfaced by CLI commands.

use thiserror::Error;
use txrelay_core::{CodecError, RelayError, RuleLoadError, StoreError};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Rule load error: {0}")]
    RuleLoad(#[from] RuleLoadError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("IO error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type CliResult<T> = Result<T, CliError>;
