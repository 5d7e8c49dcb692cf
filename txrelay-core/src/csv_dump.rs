// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Debug CSV dump of relayed records.
//!
//! Appends one row per record using the bundle column layout. The header
//! row is written only when the file is new or empty.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::bundle::{render_personal_info, COLUMNS};
use crate::error::{RelayError, RelayResult};
use crate::record::Record;

#[derive(Debug, Clone)]
pub struct CsvDumper {
    path: PathBuf,
}

impl CsvDumper {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the records to the dump file.
    pub fn append(&self, records: &[Record]) -> RelayResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let io_err = |source| RelayError::Io {
            context: "writing debug CSV",
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;
        let needs_header = file.metadata().map_err(io_err)?.len() == 0;

        let mut writer = csv::Writer::from_writer(file);
        let csv_err = |e: csv::Error| RelayError::Io {
            context: "writing debug CSV",
            source: e.into(),
        };

        if needs_header {
            writer.write_record(COLUMNS).map_err(csv_err)?;
        }

        for record in records {
            let row = [
                record.transaction_type.to_string(),
                record.creation_time.to_string(),
                record.mobile_number.to_string(),
                record.ip_address.clone(),
                render_personal_info(&record.personal_info),
                record.filter_id.clone(),
            ];
            writer.write_record(&row).map_err(csv_err)?;
        }

        writer.flush().map_err(io_err)?;
        tracing::debug!(path = %self.path.display(), rows = records.len(), "Appended debug CSV rows");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(transaction_type: i32, filter_id: &str) -> Record {
        let mut info = BTreeMap::new();
        info.insert("Name".to_string(), "Alice Johnson".to_string());
        let mut record = Record::new(transaction_type, 120_000_000, 5_551_234_567, "192.168.0.1", info);
        record.filter_id = filter_id.to_string();
        record
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let dumper = CsvDumper::new(dir.path().join("dumps").join("debug.csv"));

        dumper.append(&[record(1, "0")]).unwrap();
        dumper.append(&[record(2, "1 3")]).unwrap();

        let mut reader = csv::Reader::from_path(dumper.path()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), COLUMNS.to_vec());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[1][5], "1 3");
        assert_eq!(&rows[1][4], r#"{"Name":"Alice Johnson"}"#);
    }

    #[test]
    fn test_empty_batch_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dumper = CsvDumper::new(dir.path().join("debug.csv"));
        dumper.append(&[]).unwrap();
        assert!(!dumper.path().exists());
    }
}
