// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for txrelay.
//!
//! Every failure class is an explicit enum variant. No `Box<dyn Error>`,
//! no `anyhow::Result` - callers decide per variant whether to skip a
//! record, retry, or terminate.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Shared Record Store Errors
    // =========================================================================
    #[error("Shared record store error: {0}")]
    Store(#[from] StoreError),

    // =========================================================================
    // Record Errors - Per-record, never abort a poll cycle
    // =========================================================================
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    // =========================================================================
    // Rule and Broker Errors
    // =========================================================================
    #[error("Rule load error: {0}")]
    RuleLoad(#[from] RuleLoadError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors cause immediate process termination.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Shared record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Shared record store not found: {name}")]
    NotFound { name: String },

    #[error("Shared record store {name} exists but is not initialized yet")]
    NotReady { name: String },

    #[error("Shared memory region already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Failed to create shared memory region: {name} - {reason}")]
    CreateFailed { name: String, reason: String },

    #[error("Failed to map shared memory: {reason}")]
    MapFailed { reason: String },

    #[error("Incompatible store layout in {name}: {reason}")]
    IncompatibleLayout { name: String, reason: String },

    #[error("Store full - cannot append {size} bytes ({free} bytes free)")]
    StoreFull { size: usize, free: usize },

    #[error("Payload size exceeds maximum: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Cannot append an empty payload")]
    EmptyPayload,

    #[error("Entry index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Frame checksum mismatch at index {index}: expected {expected:#010x}, got {actual:#010x}")]
    FrameChecksumMismatch {
        index: usize,
        expected: u32,
        actual: u32,
    },

    #[error("Corrupt frame at index {index}: {reason}")]
    CorruptFrame { index: usize, reason: String },

    #[error("Timed out waiting for the writer lock on {name} (held by pid {holder})")]
    LockTimeout { name: String, holder: u64 },
}

impl StoreError {
    /// Whether the caller should back off and try to open the store again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NotReady { .. })
    }
}

/// Malformed encoded record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed record payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Record payload is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}

/// Record whose stored checksum disagrees with a fresh recomputation.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Checksum mismatch for transaction type {transaction_type}: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        transaction_type: i32,
        stored: u32,
        computed: u32,
    },
}

/// Rule source missing or unusable. Fatal at startup.
#[derive(Debug, Error)]
pub enum RuleLoadError {
    #[error("Failed to read rule file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Broker sink failures. The bundle is dropped, never retried.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Broker IO failure on topic {topic}: {source}")]
    Io {
        topic: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Broker rejected bundle on topic {topic}: {reason}")]
    Rejected { topic: String, reason: String },
}

/// Result type alias using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;
