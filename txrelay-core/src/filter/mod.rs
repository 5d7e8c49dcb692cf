// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Rule-based filter engine.
//!
//! Rules are loaded once at startup and shared read-only across every
//! record of the run. Each record is tagged with the ids of all matching
//! rules, space separated in definition order, or `"0"` when none match.

mod parser;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::RuleLoadError;
use crate::record::Record;

pub use parser::NO_MATCH_ID;

/// Condition key that forms the required group of a BOTH rule.
pub const MOBILE_KEY: &str = "ismobile";
/// Condition key comparing the IP address.
pub const IP_KEY: &str = "isIP";
/// Condition key comparing the transaction type.
pub const TRANSACTION_TYPE_KEY: &str = "isTTY";

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Every condition must hold.
    And,
    /// At least one condition must hold.
    Or,
    /// All `ismobile` conditions must hold and at least one other must hold.
    Both,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Both => "BOTH",
        };
        f.write_str(name)
    }
}

/// One filter definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub operation: Operation,
    /// Condition key to expected value. Last occurrence of a key wins.
    pub conditions: BTreeMap<String, String>,
}

impl Rule {
    /// Whether this rule matches the record.
    pub fn matches(&self, record: &Record) -> bool {
        let mut conditions = self.conditions.iter();
        match self.operation {
            Operation::And => conditions.all(|(k, v)| evaluate(record, k, v)),
            Operation::Or => conditions.any(|(k, v)| evaluate(record, k, v)),
            Operation::Both => {
                let (required, alternative): (Vec<_>, Vec<_>) =
                    conditions.partition(|(k, _)| k.as_str() == MOBILE_KEY);
                // An empty alternative group never holds.
                required.iter().all(|(k, v)| evaluate(record, k, v))
                    && alternative.iter().any(|(k, v)| evaluate(record, k, v))
            }
        }
    }
}

/// Evaluate a single condition against a record. Unknown keys never hold.
pub fn evaluate(record: &Record, key: &str, value: &str) -> bool {
    match key {
        MOBILE_KEY => record.mobile_number.to_string() == value,
        IP_KEY => record.ip_address == value,
        TRANSACTION_TYPE_KEY => record.transaction_type.to_string() == value,
        _ => false,
    }
}

/// Immutable set of rules applied to every record.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    rules: Vec<Rule>,
}

impl FilterEngine {
    /// Load rules from a file. A missing or unreadable file is fatal.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, RuleLoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let engine = Self::load_str(&content);
        tracing::info!(path = %path.display(), rules = engine.len(), "Loaded filter rules");
        Ok(engine)
    }

    /// Load rules from rule-source text.
    ///
    /// A source that defines no rules yields an engine that tags every
    /// record `"0"`.
    pub fn load_str(source: &str) -> Self {
        let rules = parser::parse_rules(source);
        if rules.is_empty() {
            tracing::warn!("Rule source defines no rules; every record will be tagged 0");
        }
        Self { rules }
    }

    /// Build an engine from rules constructed in code.
    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Rules in definition order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Ids of all rules matching the record, in definition order.
    pub fn matching_ids<'a>(&'a self, record: &Record) -> Vec<&'a str> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(record))
            .map(|rule| rule.id.as_str())
            .collect()
    }

    /// Compute the filter id for a record: matching ids joined by single
    /// spaces, or `"0"` when nothing matches.
    pub fn filter_id(&self, record: &Record) -> String {
        let ids = self.matching_ids(record);
        if ids.is_empty() {
            NO_MATCH_ID.to_string()
        } else {
            ids.join(" ")
        }
    }

    /// Tag the record in place and return the assigned filter id.
    pub fn apply<'r>(&self, record: &'r mut Record) -> &'r str {
        record.filter_id = self.filter_id(record);
        tracing::debug!(
            transaction_type = record.transaction_type,
            filter_id = %record.filter_id,
            "Tagged record"
        );
        &record.filter_id
    }
}
