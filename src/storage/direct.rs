//! Direct Log Writer
//!
//! Used when block chaining is disabled: entries are appended as JSON lines
//! to `<root>/<category>/YYYY/MM/DD.log`, keyed by the entry timestamp.

use chrono::{Datelike, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::audit::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Append-only JSONL writer
#[derive(Debug)]
pub struct DirectLogWriter {
    root: PathBuf,
    // serializes appends so concurrent lines never interleave
    write_lock: Mutex<()>,
}

impl DirectLogWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn log_path(&self, category: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(category)
            .join(format!("{:04}", date.year()))
            .join(format!("{:02}", date.month()))
            .join(format!("{:02}.log", date.day()))
    }

    /// Append new entry to the day's log file
    pub fn append(&self, entry: &AuditEntry) -> AuditResult<PathBuf> {
        let path = self.log_path(&entry.category, entry.timestamp.date_naive());
        let json = serde_json::to_string(entry)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AuditError::StorageError("Direct log lock poisoned".to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AuditError::StorageError(format!("Failed to create log directory: {}", e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AuditError::StorageError(format!("Failed to open audit log file: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| AuditError::StorageError(format!("Failed to write to audit log: {}", e)))?;
        file.flush()
            .map_err(|e| AuditError::StorageError(format!("Failed to flush audit log: {}", e)))?;

        debug!("Appended direct audit entry: {}", entry.summary());
        Ok(path)
    }

    /// Read every entry of one day's log
    pub fn read_day(&self, category: &str, date: NaiveDate) -> AuditResult<Vec<AuditEntry>> {
        read_log_file(&self.log_path(category, date))
    }
}

/// Load entries from a JSONL log file
pub fn read_log_file(path: &Path) -> AuditResult<Vec<AuditEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| AuditError::StorageError(format!("Failed to open log file: {}", e)))?;

    let mut entries = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            AuditError::StorageError(format!("Failed to read line {}: {}", line_num + 1, e))
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
            AuditError::SerializationError(format!(
                "Failed to parse entry at line {}: {}",
                line_num + 1,
                e
            ))
        })?;
        entries.push(entry);
    }

    Ok(entries)
}
