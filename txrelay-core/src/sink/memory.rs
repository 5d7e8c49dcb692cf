// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-memory sink that keeps every published bundle.
//!
//! Handles are cheap clones sharing the same buffer, so a test can hand one
//! to the relay and inspect another.

use std::sync::{Arc, Mutex};

use crate::error::PublishError;
use crate::sink::BrokerSink;

/// One published bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Inner {
    published: Vec<Published>,
    fail_next: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` publishes.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Snapshot of everything published so far.
    pub fn published(&self) -> Vec<Published> {
        self.lock().published.clone()
    }

    /// Published payloads as UTF-8 text.
    pub fn bundles(&self) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .map(|p| String::from_utf8_lossy(&p.payload).into_owned())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave Inner half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BrokerSink for MemorySink {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut inner = self.lock();
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(PublishError::Rejected {
                topic: topic.to_string(),
                reason: "rejected by memory sink".to_string(),
            });
        }
        inner.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let observer = MemorySink::new();
        let mut sink = observer.clone();
        sink.publish("q", b"abc").unwrap();
        assert_eq!(observer.bundles(), vec!["abc".to_string()]);
        assert_eq!(observer.published()[0].topic, "q");
    }

    #[test]
    fn test_fail_next() {
        let mut sink = MemorySink::new();
        sink.fail_next(1);
        assert!(sink.publish("q", b"one").is_err());
        assert!(sink.publish("q", b"two").is_ok());
        assert_eq!(sink.bundles(), vec!["two".to_string()]);
    }
}
