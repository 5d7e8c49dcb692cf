// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! Each type validates its invariants at creation time so the rest of the
//! relay can take them at face value.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::HardValidationError;

/// Minimum shared store size: one page.
pub const MIN_STORE_CAPACITY: usize = 4096;
/// Maximum shared store size: 1 GB.
pub const MAX_STORE_CAPACITY: usize = 1024 * 1024 * 1024;

/// Longest name accepted for shm objects (NAME_MAX minus the leading slash).
const MAX_NAME_LEN: usize = 254;

fn validate_name(field: &'static str, name: &str) -> Result<(), HardValidationError> {
    if name.is_empty() {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: name.to_string(),
            reason: "Name cannot be empty".to_string(),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: name.to_string(),
            reason: format!("Name too long: {} chars (max {})", name.len(), MAX_NAME_LEN),
        });
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(HardValidationError::InvalidFieldValue {
            field,
            value: name.to_string(),
            reason: "Name must contain only ASCII alphanumerics, '-', '_' and '.'".to_string(),
        });
    }

    Ok(())
}

/// Validated name of the shared record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreName(String);

impl StoreName {
    /// Create a new StoreName with validation.
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();
        validate_name("store.name", &name)?;
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StoreName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoreName> for String {
    fn from(name: StoreName) -> Self {
        name.0
    }
}

/// Validated broker topic (queue name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicName(String);

impl TopicName {
    pub fn new(name: impl Into<String>) -> Result<Self, HardValidationError> {
        let name = name.into();
        validate_name("broker.topic", &name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TopicName {
    type Error = HardValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TopicName> for String {
    fn from(name: TopicName) -> Self {
        name.0
    }
}

/// Validated shared store size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct StoreCapacity(usize);

impl StoreCapacity {
    /// Create a new StoreCapacity with bounds validation.
    pub fn new(bytes: usize) -> Result<Self, HardValidationError> {
        if !(MIN_STORE_CAPACITY..=MAX_STORE_CAPACITY).contains(&bytes) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "store.size_bytes",
                value: bytes.to_string(),
                reason: format!(
                    "Must be between {} and {} bytes",
                    MIN_STORE_CAPACITY, MAX_STORE_CAPACITY
                ),
            });
        }
        Ok(Self(bytes))
    }

    /// Get the capacity in bytes.
    pub fn bytes(&self) -> usize {
        self.0
    }
}

impl fmt::Display for StoreCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1024 * 1024 {
            write!(f, "{}MB", self.0 / (1024 * 1024))
        } else {
            write!(f, "{}KB", self.0 / 1024)
        }
    }
}

impl TryFrom<usize> for StoreCapacity {
    type Error = HardValidationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StoreCapacity> for usize {
    fn from(capacity: StoreCapacity) -> Self {
        capacity.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_name_valid() {
        assert!(StoreName::new("txrelay-messages").is_ok());
        assert!(StoreName::new("store_1.v2").is_ok());
    }

    #[test]
    fn test_store_name_invalid() {
        assert!(StoreName::new("").is_err());
        assert!(StoreName::new("a".repeat(255)).is_err());
        assert!(StoreName::new("with/slash").is_err());
        assert!(StoreName::new("with space").is_err());
    }

    #[test]
    fn test_topic_name() {
        assert!(TopicName::new("transactions").is_ok());
        assert!(TopicName::new("bad topic").is_err());
    }

    #[test]
    fn test_store_capacity_bounds() {
        assert!(StoreCapacity::new(MIN_STORE_CAPACITY).is_ok());
        assert!(StoreCapacity::new(MAX_STORE_CAPACITY).is_ok());
        assert!(StoreCapacity::new(MIN_STORE_CAPACITY - 1).is_err());
        assert!(StoreCapacity::new(MAX_STORE_CAPACITY + 1).is_err());
    }

    #[test]
    fn test_store_capacity_display() {
        assert_eq!(StoreCapacity::new(65536).unwrap().to_string(), "64KB");
        assert_eq!(StoreCapacity::new(2 * 1024 * 1024).unwrap().to_string(), "2MB");
    }
}
