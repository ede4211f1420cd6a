//! JSON-lines persistence for diagnostics entries.
//!
//! One entry per line, appended in sequence order. Malformed lines are
//! skipped on load so a torn final write does not lose the journal.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::StepParsingDiagnosticEntry;

/// An append-only journal file.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    /// Open (creating if needed) the journal at `path` and load its entries.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<StepParsingDiagnosticEntry>)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StepParsingDiagnosticEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed diagnostics journal line"
                ),
            }
        }
        entries.sort_by_key(|e| e.sequence);

        Ok((
            Self {
                path: path.to_path_buf(),
            },
            entries,
        ))
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a JSON line.
    pub fn append(&self, entry: &StepParsingDiagnosticEntry) -> io::Result<()> {
        let mut line = serde_json::to_vec(entry).map_err(io::Error::other)?;
        line.push(b'\n');
        let mut file = OpenOptions::new().append(true).create(true).open(&self.path)?;
        file.write_all(&line)
    }

    /// Drop every entry.
    pub fn truncate(&self) -> io::Result<()> {
        File::create(&self.path).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(sequence: u64) -> StepParsingDiagnosticEntry {
        StepParsingDiagnosticEntry {
            sequence,
            recorded_utc: Utc::now(),
            file_name: format!("part-{sequence}.step"),
            file_path: String::new(),
            file_size_bytes: 10,
            is_success: true,
            error_code: None,
            failure_category: None,
            message: String::new(),
            diagnostic_details: String::new(),
            stack_trace: None,
            source: "step-parse".to_string(),
        }
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("journal.jsonl");
        let (journal, loaded) = Journal::open(&path).expect("open");
        assert!(loaded.is_empty());

        journal.append(&entry(0)).expect("append");
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(b"{\"sequence\": 1, \"torn\n"))
            .expect("write garbage");

        let (_, loaded) = Journal::open(&path).expect("reopen");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].file_name, "part-0.step");
    }

    #[test]
    fn test_truncate_empties_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("journal.jsonl");
        let (journal, _) = Journal::open(&path).expect("open");
        journal.append(&entry(0)).expect("append");
        journal.truncate().expect("truncate");
        assert_eq!(fs::metadata(&path).expect("meta").len(), 0);
    }
}
