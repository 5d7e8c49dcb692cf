// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Per-record timing series and its summary.

use std::fmt;
use std::time::Duration;

/// Durations recorded during one cycle.
#[derive(Debug, Clone, Default)]
pub struct TimingSeries {
    samples: Vec<Duration>,
}

/// Count, total and mean of a timing series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSummary {
    pub count: usize,
    pub total: Duration,
    pub average: Duration,
}

impl TimingSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.samples.push(elapsed);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// Summarize the series. `None` when nothing was recorded.
    pub fn summary(&self) -> Option<TimingSummary> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        let average = total / self.samples.len() as u32;
        Some(TimingSummary {
            count: self.samples.len(),
            total,
            average,
        })
    }
}

impl fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, total {} us, average {} us",
            self.count,
            self.total.as_micros(),
            self.average.as_micros()
        )
    }
}
