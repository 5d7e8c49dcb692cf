// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Random transaction records for the `produce` command.

use std::collections::BTreeMap;

use chrono::{Local, Timelike};
use rand::rngs::ThreadRng;
use rand::Rng;
use txrelay_core::record::{creation_time_from, Record};

const NAMES: [&str; 5] = [
    "John Doe",
    "Jane Smith",
    "Alice Johnson",
    "Bob Brown",
    "Charlie Davis",
];

/// Produces records with sequential transaction types starting at 1.
pub struct RecordGenerator<R: Rng> {
    rng: R,
    next_type: i32,
}

impl RecordGenerator<ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng())
    }
}

impl<R: Rng> RecordGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng, next_type: 1 }
    }

    pub fn next_record(&mut self) -> Record {
        let transaction_type = self.next_type;
        self.next_type = self.next_type.wrapping_add(1);

        let now = Local::now();
        let creation_time = creation_time_from(
            now.hour(),
            now.minute(),
            now.second(),
            self.rng.gen_range(0..1000),
        );
        let mobile_number = self.rng.gen_range(1_000_000_000i64..10_000_000_000);
        let ip_address = format!(
            "{}.{}.{}.{}",
            self.rng.gen::<u8>(),
            self.rng.gen::<u8>(),
            self.rng.gen::<u8>(),
            self.rng.gen::<u8>()
        );

        let name = NAMES[self.rng.gen_range(0..NAMES.len())];
        let mut personal_info = BTreeMap::new();
        personal_info.insert("Name".to_string(), name.to_string());
        personal_info.insert("Email".to_string(), email_for(name));

        Record::new(
            transaction_type,
            creation_time,
            mobile_number,
            ip_address,
            personal_info,
        )
    }
}

fn email_for(name: &str) -> String {
    format!("{}@example.com", name.replace(' ', "."))
}
