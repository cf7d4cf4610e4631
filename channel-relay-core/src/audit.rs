//! # audit: persisted log of published items, doubling as the dedup index
//!
//! The log is one pretty-printed UTF-8 JSON array of [`AuditRecord`]s. It is read in
//! full once at run start and rewritten in full once at run end. The rewrite goes to
//! a temporary file next to the log which is then renamed over it, so an interrupted
//! write never leaves a truncated log behind. Entries are handled as raw JSON, so
//! older or hand-edited entries survive a rewrite even when they lack fields.
//!
//! Single writer only: there is no file locking.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::contract::AuditRecord;
use crate::error::PersistenceError;
use crate::preprocess::dedup_key;

#[derive(Debug, Clone)]
pub struct AuditStore {
    path: PathBuf,
}

impl AuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every persisted entry as raw JSON, in file order.
    ///
    /// Only an unreadable file or a document that is not a JSON array is an error.
    /// Individual entries are not validated.
    pub fn read_entries(&self) -> Result<Vec<Value>, PersistenceError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| PersistenceError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Entries that parse as a full [`AuditRecord`], in file order. Incomplete entries are skipped.
    pub fn read_records(&self) -> Result<Vec<AuditRecord>, PersistenceError> {
        Ok(self
            .read_entries()?
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect())
    }

    /// Entries on disk, or an empty list when the log is missing, unreadable or malformed.
    fn read_entries_or_empty(&self) -> Vec<Value> {
        match self.read_entries() {
            Ok(entries) => entries,
            Err(PersistenceError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!(path = %self.path.display(), "No audit log yet, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Audit log unreadable, treating it as empty");
                Vec::new()
            }
        }
    }

    /// The set of trimmed `original_text` values already relayed. Cold start is not fatal:
    /// any read failure yields an empty set. Entries without a string `original_text` are
    /// ignored.
    pub fn load_dedup_keys(&self) -> HashSet<String> {
        let keys: HashSet<String> = self
            .read_entries_or_empty()
            .iter()
            .filter_map(|entry| entry.get("original_text").and_then(Value::as_str))
            .map(dedup_key)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect();
        info!(path = %self.path.display(), keys = keys.len(), "Loaded dedup keys from audit log");
        keys
    }

    /// Appends `new_records` after the existing entries and rewrites the whole log.
    ///
    /// Existing entries are kept as they are on disk, including ones this version does not
    /// understand. A log that cannot be read at all is treated as empty. Write failures are
    /// returned to the caller.
    pub fn append(&self, new_records: &[AuditRecord]) -> Result<(), PersistenceError> {
        let mut combined = self.read_entries_or_empty();
        let existing = combined.len();
        for record in new_records {
            let entry = serde_json::to_value(record).map_err(|source| {
                PersistenceError::Malformed {
                    path: self.path.clone(),
                    source,
                }
            })?;
            combined.push(entry);
        }
        self.write_all(&combined)?;
        info!(
            path = %self.path.display(),
            existing,
            appended = new_records.len(),
            "Audit log rewritten"
        );
        Ok(())
    }

    fn write_all(&self, entries: &[Value]) -> Result<(), PersistenceError> {
        let io_err = |source: std::io::Error| PersistenceError::Io {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(entries).map_err(|source| {
            PersistenceError::Malformed {
                path: self.path.clone(),
                source,
            }
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}
