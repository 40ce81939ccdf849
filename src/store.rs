//! Durable signup store backing the duplicate-checking relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One stored signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRecord {
    pub email: String,
    pub received_at: DateTime<Utc>,
}

/// Whether [`SignupStore::add`] stored a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
}

/// Append-only JSON-lines file of signups with set-membership duplicate
/// detection.
///
/// Existing addresses are loaded into memory once at open, so answering a
/// duplicate costs a hash lookup instead of rescanning the file per request.
#[derive(Debug)]
pub struct SignupStore {
    path: PathBuf,
    emails: Mutex<HashSet<String>>,
}

impl SignupStore {
    /// Opens the store, creating the file if needed, and indexes the
    /// addresses already in it. Unparseable lines are skipped with a warning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, crate::error::Error> {
        let path = path.as_ref().to_path_buf();
        let mut emails = HashSet::new();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<SignupRecord>(line) {
                    Ok(record) => {
                        emails.insert(record.email);
                    }
                    Err(e) => log::warn!("skipping malformed store line: {e}"),
                }
            }
        }
        Ok(Self {
            path,
            emails: Mutex::new(emails),
        })
    }

    /// Appends exactly one record for the address, or reports it as already
    /// present. The record is flushed to the file before returning.
    pub fn add(&self, email: &str) -> Result<AddOutcome, crate::error::Error> {
        let Ok(mut emails) = self.emails.lock() else {
            return Err(std::io::Error::other("signup store lock poisoned").into());
        };
        if emails.contains(email) {
            return Ok(AddOutcome::Duplicate);
        }

        let record = SignupRecord {
            email: email.to_string(),
            received_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;

        emails.insert(record.email);
        Ok(AddOutcome::Added)
    }

    /// Number of stored addresses.
    pub fn address_count(&self) -> usize {
        self.emails.lock().map(|e| e.len()).unwrap_or(0)
    }
}
