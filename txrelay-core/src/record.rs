// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Transaction record and its codec.
//!
//! Records cross the process boundary as compact JSON text, one store entry
//! per record. Each record carries a CRC-32 computed by the producer over
//! the five data fields; the consumer recomputes it after decoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, IntegrityError};

/// One transaction observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Transaction kind.
    pub transaction_type: i32,
    /// Time of day packed as HHMMSSmmm.
    pub creation_time: i32,
    /// 10-digit phone number.
    pub mobile_number: i64,
    /// Dotted-quad address.
    pub ip_address: String,
    /// Attribute name to value. Key-ordered so the checksum is deterministic.
    pub personal_info: BTreeMap<String, String>,
    /// CRC-32 assigned at creation time.
    pub checksum: u32,
    /// Matching rule ids, assigned once by the consumer. Empty until then.
    #[serde(default)]
    pub filter_id: String,
}

impl Record {
    /// Build a record and stamp it with its checksum.
    pub fn new(
        transaction_type: i32,
        creation_time: i32,
        mobile_number: i64,
        ip_address: impl Into<String>,
        personal_info: BTreeMap<String, String>,
    ) -> Self {
        let mut record = Self {
            transaction_type,
            creation_time,
            mobile_number,
            ip_address: ip_address.into(),
            personal_info,
            checksum: 0,
            filter_id: String::new(),
        };
        record.checksum = compute_checksum(&record);
        record
    }

    /// Compare the stored checksum against a fresh recomputation.
    pub fn verify(&self) -> Result<(), IntegrityError> {
        let computed = compute_checksum(self);
        if computed != self.checksum {
            return Err(IntegrityError::ChecksumMismatch {
                transaction_type: self.transaction_type,
                stored: self.checksum,
                computed,
            });
        }
        Ok(())
    }
}

/// CRC-32 over the checksum-covered fields.
///
/// Integers are hashed as fixed-width little-endian bytes, then the IP
/// address bytes, then each personal-info key and value in key order.
/// `checksum` and `filter_id` do not participate.
pub fn compute_checksum(record: &Record) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&record.transaction_type.to_le_bytes());
    hasher.update(&record.creation_time.to_le_bytes());
    hasher.update(&record.mobile_number.to_le_bytes());
    hasher.update(record.ip_address.as_bytes());
    for (key, value) in &record.personal_info {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    hasher.finalize()
}

/// Encode a record into its self-contained store payload.
pub fn encode(record: &Record) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode a store payload. The embedded checksum is NOT verified here.
pub fn decode(bytes: &[u8]) -> Result<Record, CodecError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(serde_json::from_str(text)?)
}

/// Pack a time of day into the HHMMSSmmm integer form.
pub fn creation_time_from(hour: u32, minute: u32, second: u32, millis: u32) -> i32 {
    (hour * 10_000_000 + minute * 100_000 + second * 1000 + millis) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        let mut info = BTreeMap::new();
        info.insert("Name".to_string(), "Jane Smith".to_string());
        info.insert("Email".to_string(), "Jane.Smith@example.com".to_string());
        Record::new(7, 134_501_250, 9_998_887_776, "10.0.0.7", info)
    }

    #[test]
    fn test_round_trip() {
        let record = sample();
        let decoded = decode(&encode(&record).unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.filter_id.is_empty());
        assert!(decoded.verify().is_ok());
    }

    #[test]
    fn test_checksum_ignores_filter_id() {
        let mut record = sample();
        let before = compute_checksum(&record);
        record.filter_id = "1 3".to_string();
        assert_eq!(compute_checksum(&record), before);
    }

    #[test]
    fn test_mutating_covered_fields_breaks_checksum() {
        let original = sample();
        let mutations: Vec<Box<dyn Fn(&mut Record)>> = vec![
            Box::new(|r: &mut Record| r.transaction_type += 1),
            Box::new(|r: &mut Record| r.creation_time -= 1),
            Box::new(|r: &mut Record| r.mobile_number = 1_234_567_890),
            Box::new(|r: &mut Record| r.ip_address = "10.0.0.8".to_string()),
            Box::new(|r: &mut Record| {
                r.personal_info
                    .insert("Name".to_string(), "John Doe".to_string());
            }),
        ];

        for mutate in mutations {
            let mut decoded = decode(&encode(&original).unwrap()).unwrap();
            mutate(&mut decoded);
            assert!(matches!(
                decoded.verify(),
                Err(IntegrityError::ChecksumMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let record = sample();
        let text = String::from_utf8(encode(&record).unwrap()).unwrap();
        let tampered = text.replace("10.0.0.7", "10.0.0.9");
        let decoded = decode(tampered.as_bytes()).unwrap();
        assert!(decoded.verify().is_err());
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            decode(b"{\"transaction_type\": 1"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(CodecError::NotUtf8(_))));
    }

    #[test]
    fn test_creation_time_packing() {
        assert_eq!(creation_time_from(13, 45, 1, 250), 134_501_250);
        assert_eq!(creation_time_from(0, 0, 0, 7), 7);
    }
}
