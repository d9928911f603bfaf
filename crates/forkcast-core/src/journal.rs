//! Append-only run journal.
//!
//! Every phase and scenario outcome of a harness run is written as one JSON
//! line, so a failed CI run can be read back step by step.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the journal.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outcome of a journaled step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed,
}

/// One journal line.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    /// Phase or scenario name, e.g. `fork_reset` or `scenario:deposit`.
    pub step: String,
    pub details: serde_json::Value,
    pub outcome: Outcome,
}

impl JournalEntry {
    /// Create a new entry stamped with the current time.
    pub fn new(step: impl Into<String>, details: serde_json::Value, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            step: step.into(),
            details,
            outcome,
        }
    }
}

/// JSONL journal writer.
pub struct Journal {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal").field("path", &self.path).finish()
    }
}

impl Journal {
    /// Create or open a journal file for appending.
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Append an entry. Flushes after each write.
    pub fn record(&mut self, entry: JournalEntry) -> Result<(), JournalError> {
        let line = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_serializes() {
        let entry = JournalEntry::new("fork_reset", json!({"block": 13005785}), Outcome::Passed);
        let line = serde_json::to_string(&entry).unwrap();
        assert!(line.contains("\"step\":\"fork_reset\""));
        assert!(line.contains("\"outcome\":\"passed\""));
        assert!(line.contains("\"timestamp\""));
    }

    #[test]
    fn journal_appends_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs").join("journal.jsonl");

        {
            let mut journal = Journal::open(&path).unwrap();
            journal
                .record(JournalEntry::new("suite_setup", json!({}), Outcome::Passed))
                .unwrap();
        }
        {
            let mut journal = Journal::open(&path).unwrap();
            journal
                .record(JournalEntry::new(
                    "scenario:withdraw",
                    json!({"reason": "execution reverted"}),
                    Outcome::Failed,
                ))
                .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["step"], "suite_setup");
        assert_eq!(lines[1]["outcome"], "failed");
    }
}
