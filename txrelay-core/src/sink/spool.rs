// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Spool-directory sink.
//!
//! Each bundle lands in its own file, `<topic>-<seq>.csv`, written under a
//! temporary name first and renamed into place so a downstream reader
//! never picks up a half-written bundle. Sequence numbers continue from
//! the highest one already in the directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::PublishError;
use crate::sink::BrokerSink;

#[derive(Debug)]
pub struct SpoolSink {
    dir: PathBuf,
    next_seq: u64,
}

impl SpoolSink {
    /// Open (creating if needed) a spool directory.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let next_seq = highest_seq(&dir)?.map_or(0, |seq| seq + 1);
        tracing::debug!(dir = %dir.display(), next_seq = next_seq, "Opened spool directory");
        Ok(Self { dir, next_seq })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, topic: &str, seq: u64) -> PathBuf {
        self.dir.join(format!("{}-{:08}.csv", topic, seq))
    }
}

fn highest_seq(dir: &Path) -> std::io::Result<Option<u64>> {
    let mut highest = None;
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(".csv") else {
            continue;
        };
        let Some((_, seq)) = stem.rsplit_once('-') else {
            continue;
        };
        if let Ok(seq) = seq.parse::<u64>() {
            highest = highest.max(Some(seq));
        }
    }
    Ok(highest)
}

impl BrokerSink for SpoolSink {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let io_err = |source| PublishError::Io {
            topic: topic.to_string(),
            source,
        };

        let seq = self.next_seq;
        let target = self.path_for(topic, seq);
        let staging = self.dir.join(format!(".{}-{:08}.tmp", topic, seq));

        let mut file = fs::File::create(&staging).map_err(io_err)?;
        file.write_all(payload).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&staging, &target).map_err(io_err)?;

        self.next_seq += 1;
        tracing::debug!(path = %target.display(), bytes = payload.len(), "Spooled bundle");
        Ok(())
    }
}
