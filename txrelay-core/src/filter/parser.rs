// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Line-oriented rule source parser.
//!
//! ```text
//! # AND query
//! ID 1
//! isTTY 5 isIP 1.2.3.4
//! # OR query
//! ID 2
//! ismobile 9998887776, isIP 10.0.0.1
//! # Both AND and OR query
//! ID 3
//! ismobile 555, isIP 9.9.9.9
//! ```
//!
//! Each line is classified as a marker, an id line, a condition line, or
//! blank. A marker or id line closes the rule in progress once that rule
//! has an id. `ID 0` leaves the rule in progress without an id, so its
//! conditions carry over into the next rule.

use std::collections::BTreeMap;

use crate::filter::{Operation, Rule};

const AND_MARKER: &str = "# AND query";
const OR_MARKER: &str = "# OR query";
const BOTH_MARKER: &str = "# Both AND and OR query";
const ID_MARKER: &str = "ID";

/// Id reserved for "no rule matched".
pub const NO_MATCH_ID: &str = "0";

/// One classified line of a rule source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RuleLine<'a> {
    Blank,
    Marker(Operation),
    Id(&'a str),
    Conditions(&'a str),
}

impl<'a> RuleLine<'a> {
    pub(crate) fn classify(line: &'a str) -> Self {
        let line = line.trim_end();
        if line.trim().is_empty() {
            return Self::Blank;
        }

        if line.contains(AND_MARKER) {
            return Self::Marker(Operation::And);
        }
        if line.contains(OR_MARKER) {
            return Self::Marker(Operation::Or);
        }
        if line.contains(BOTH_MARKER) {
            return Self::Marker(Operation::Both);
        }

        if line.trim_start().starts_with(ID_MARKER) {
            // Id is everything after the first space; a bare token is its own id.
            let id = match line.find(' ') {
                Some(pos) => line[pos + 1..].trim(),
                None => line.trim(),
            };
            return Self::Id(id);
        }

        Self::Conditions(line)
    }
}

/// Rule being assembled while scanning the source.
#[derive(Debug, Default)]
struct PendingRule {
    id: Option<String>,
    operation: Option<Operation>,
    conditions: BTreeMap<String, String>,
    line: usize,
}

impl PendingRule {
    fn add_conditions(&mut self, text: &str) {
        match self.operation {
            Some(Operation::Or) | Some(Operation::Both) => {
                for segment in text.split(',') {
                    let mut tokens = segment.split_whitespace();
                    // A key without a value still overrides with an empty value.
                    if let Some(key) = tokens.next() {
                        let value = tokens.next().unwrap_or_default();
                        self.conditions.insert(key.to_string(), value.to_string());
                    }
                }
            }
            Some(Operation::And) | None => {
                let tokens: Vec<&str> = text.split_whitespace().collect();
                for pair in tokens.chunks_exact(2) {
                    self.conditions
                        .insert(pair[0].to_string(), pair[1].to_string());
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct RuleCollector {
    rules: Vec<Rule>,
    current: PendingRule,
}

impl RuleCollector {
    /// Close the rule in progress if it has an id.
    fn finalize(&mut self) {
        if self.current.id.is_none() {
            return;
        }

        let pending = std::mem::take(&mut self.current);
        let id = pending.id.unwrap_or_default();

        let Some(operation) = pending.operation else {
            tracing::warn!(
                rule_id = %id,
                line = pending.line,
                "Rule has no AND/OR/BOTH marker and can never match; skipping"
            );
            return;
        };

        if self.rules.iter().any(|rule| rule.id == id) {
            tracing::warn!(rule_id = %id, line = pending.line, "Duplicate rule id");
        }

        tracing::debug!(
            rule_id = %id,
            operation = %operation,
            conditions = pending.conditions.len(),
            "Loaded rule"
        );

        self.rules.push(Rule {
            id,
            operation,
            conditions: pending.conditions,
        });
    }
}

/// Parse a rule source into rules, in definition order.
pub(crate) fn parse_rules(source: &str) -> Vec<Rule> {
    let mut collector = RuleCollector::default();

    for (index, raw) in source.lines().enumerate() {
        let line_no = index + 1;
        match RuleLine::classify(raw) {
            RuleLine::Blank => {}
            RuleLine::Marker(operation) => {
                collector.finalize();
                collector.current.operation = Some(operation);
            }
            RuleLine::Id(id) => {
                collector.finalize();
                collector.current.id = (id != NO_MATCH_ID).then(|| id.to_string());
                collector.current.line = line_no;
            }
            RuleLine::Conditions(text) => collector.current.add_conditions(text),
        }
    }

    collector.finalize();
    collector.rules
}
