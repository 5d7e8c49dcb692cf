// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Broker sinks.
//!
//! The relay treats the broker as an opaque `publish(topic, bytes)` call;
//! connection setup and framing belong to the sink.

mod memory;
mod spool;

pub use memory::{MemorySink, Published};
pub use spool::SpoolSink;

use crate::error::PublishError;

/// Destination for finished bundles.
pub trait BrokerSink {
    /// Publish one bundle. A failed publish is not retried by the caller.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

impl<S: BrokerSink + ?Sized> BrokerSink for Box<S> {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        (**self).publish(topic, payload)
    }
}
