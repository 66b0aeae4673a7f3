//! Append-only JSONL spool file: the edge dispatcher's last resort when the
//! cloud is unreachable for longer than the retry budget.
//!
//! Grounded on `original_source/edge_runtime_v2.py`'s `enqueue_jsonl`/
//! `drain_jsonl`: append under an open-for-append handle, drain by reading up
//! to a row limit into memory while copying anything beyond that limit into a
//! `.tmp` sibling, then atomically renaming the sibling over the original.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::model::Event;

pub struct Spool {
    path: PathBuf,
}

impl Spool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append a batch of events as one JSON object per line. Never loses an
    /// event silently: a malformed event would fail to serialize, which is a
    /// caller bug, not a spool concern.
    pub fn enqueue(&self, events: &[Event]) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).with_context(|| format!("opening spool file {}", self.path.display()))?;
        for event in events {
            let line = serde_json::to_string(event)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Drain up to `max_rows` events, leaving any remainder in place. Lines
    /// that fail to parse are dropped (and logged) rather than blocking the
    /// drain of everything after them.
    pub fn drain(&self, max_rows: usize) -> Result<Vec<Event>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let tmp_path = tmp_sibling(&self.path);
        let input = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(input);
        let mut tmp_file = std::fs::File::create(&tmp_path)?;

        let mut drained = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if i < max_rows {
                match serde_json::from_str::<Event>(&line) {
                    Ok(event) => drained.push(event),
                    Err(e) => warn!("dropping malformed spool line: {e}"),
                }
            } else {
                writeln!(tmp_file, "{line}")?;
            }
        }
        tmp_file.flush()?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(drained)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}
