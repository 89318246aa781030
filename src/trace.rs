//! Append-only question/answer log.
//!
//! Every answered query is recorded as a human-readable block. Write-only
//! side channel: nothing in the pipeline reads this file back.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;

/// One block per QA pair, closed by a 50-dash separator line.
pub struct QaTraceLog {
    path: PathBuf,
    // Serializes appends so concurrent queries never interleave blocks.
    write_lock: Mutex<()>,
}

impl QaTraceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one question/answer block. Creates the file and any missing
    /// parent directories on first use.
    pub fn append(&self, query: &str, response: &str) -> Result<()> {
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create QA log directory")?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open QA log at {:?}", self.path))?;

        writeln!(file, "Question: {}", query)?;
        writeln!(file, "Answer: {}", response)?;
        writeln!(file, "{}", "-".repeat(50))?;

        tracing::info!(query = %query, "QA pair logged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_writes_block_format() {
        let dir = tempfile::tempdir().unwrap();
        let log = QaTraceLog::new(dir.path().join("qa_log.txt"));
        log.append("What is this?", "A test.").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let expected = format!(
            "Question: What is this?\nAnswer: A test.\n{}\n",
            "-".repeat(50)
        );
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_appends_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let log = QaTraceLog::new(dir.path().join("qa_log.txt"));
        log.append("First?", "One.").unwrap();
        log.append("Second?", "Two.").unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(contents.matches("Question:").count(), 2);
        assert_eq!(contents.matches(&"-".repeat(50)).count(), 2);
    }

    #[test]
    fn test_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let log = QaTraceLog::new(dir.path().join("nested/logs/qa_log.txt"));
        log.append("Q?", "A.").unwrap();
        assert!(log.path().exists());
    }
}
