//! JSON snapshots of the trip ledger and the accounting books.
//!
//! Each write overwrites the whole file; there is no append log and no crash
//! atomicity. Writes are serialized by the store and tagged with the ledger
//! revision they were taken at, so a slower writer holding an older snapshot
//! cannot overwrite a newer one. Reads never fail: missing, empty or malformed
//! files load as empty collections.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::accounting::AccountingSnapshot;
use crate::config::PersistenceConfig;
use crate::error::DispatchResult;
use crate::trips::{LedgerSnapshot, Trip};

#[derive(Debug, Default)]
struct WrittenRevisions {
    trips: Option<u64>,
    accounting: Option<u64>,
}

#[derive(Debug)]
pub struct SnapshotStore {
    config: PersistenceConfig,
    written: Mutex<WrittenRevisions>,
    failures: AtomicU64,
}

impl SnapshotStore {
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
            written: Mutex::new(WrittenRevisions::default()),
            failures: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Write the trip list. Returns `Ok(false)` when persistence is disabled or a
    /// newer revision is already on disk.
    pub fn write_trips(&self, snapshot: &LedgerSnapshot) -> DispatchResult<bool> {
        let Some(path) = self.config.trips_path() else {
            return Ok(false);
        };
        let mut written = self.written.lock();
        if written.trips.is_some_and(|rev| rev > snapshot.revision) {
            return Ok(false);
        }
        self.write_json(&path, &snapshot.trips)?;
        written.trips = Some(snapshot.revision);
        Ok(true)
    }

    /// Write the accounting books. Same contract as [`Self::write_trips`].
    pub fn write_accounting(&self, revision: u64, books: &AccountingSnapshot) -> DispatchResult<bool> {
        let Some(path) = self.config.accounting_path() else {
            return Ok(false);
        };
        let mut written = self.written.lock();
        if written.accounting.is_some_and(|rev| rev > revision) {
            return Ok(false);
        }
        self.write_json(&path, books)?;
        written.accounting = Some(revision);
        Ok(true)
    }

    /// [`Self::write_trips`], with failures logged and counted instead of returned.
    pub fn persist_trips(&self, snapshot: &LedgerSnapshot) {
        if let Err(err) = self.write_trips(snapshot) {
            self.record_failure("trips", &err);
        }
    }

    /// [`Self::write_accounting`], with failures logged and counted instead of returned.
    pub fn persist_accounting(&self, revision: u64, books: &AccountingSnapshot) {
        if let Err(err) = self.write_accounting(revision, books) {
            self.record_failure("accounting", &err);
        }
    }

    /// Number of snapshot writes that failed so far.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }

    pub fn load_trips(&self) -> Vec<Trip> {
        self.config
            .trips_path()
            .map(load_trips)
            .unwrap_or_default()
    }

    pub fn load_accounting(&self) -> AccountingSnapshot {
        self.config
            .accounting_path()
            .map(load_accounting)
            .unwrap_or_default()
    }

    fn record_failure(&self, what: &str, err: &crate::error::DispatchError) {
        self.failures.fetch_add(1, Ordering::AcqRel);
        tracing::warn!(snapshot = what, error = %err, "snapshot write failed; in-memory state kept");
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> DispatchResult<()> {
        if self.config.create_dir_if_missing {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    }
}

/// Read a trip snapshot. Missing, empty or malformed files yield an empty list.
pub fn load_trips(path: impl AsRef<Path>) -> Vec<Trip> {
    load_or_default(path.as_ref())
}

/// Read an accounting snapshot. Missing, empty or malformed files yield zeroed books.
pub fn load_accounting(path: impl AsRef<Path>) -> AccountingSnapshot {
    load_or_default(path.as_ref())
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "snapshot not readable, using empty default");
            return T::default();
        }
    };
    if contents.trim().is_empty() {
        return T::default();
    }
    serde_json::from_str(&contents).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "malformed snapshot, using empty default");
        T::default()
    })
}
