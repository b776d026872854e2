//! In-memory record store, snapshotted to a single JSON file at `DB_PATH`.
//!
//! Mirrors `app-rs/src/db.rs`'s `DbPersister` shape -- load the whole state
//! once, mutate in memory, write the whole state back -- simplified to a
//! synchronous write-through: one worker process serves exactly one slot's
//! already-serialized requests, so there's no concurrent-writer problem to
//! batch or rate-limit away.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    next_id: u64,
    records: Vec<Record>,
}

impl Default for Snapshot {
    /// Row ids start at 1, matching the `AUTOINCREMENT` behavior this
    /// store models and spec.md §8 S1's literal `id: 1` expectation.
    fn default() -> Self {
        Self {
            next_id: 1,
            records: Vec::new(),
        }
    }
}

/// One tenant target's data, backed by the file at `DB_PATH` (spec.md §6).
/// Storage durability and isolation are the worker's problem, not the
/// gateway's (spec.md §4.6) -- this is the reference implementation's take
/// on that, not part of the worker wire contract.
pub struct Store {
    path: PathBuf,
    snapshot: Snapshot,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read data file: {0}")]
    Read(std::io::Error),
    #[error("failed to write data file: {0}")]
    Write(std::io::Error),
    #[error("data file contents are not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Store {
    /// Load the snapshot at `path`, or start empty if it doesn't exist yet
    /// -- a target with no prior run has no prior state. A restarted
    /// worker reattaches to whatever was last persisted here (spec.md §3
    /// `WorkerSlot`).
    pub fn load(path: PathBuf) -> Result<Self, StoreError> {
        let snapshot = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Snapshot::default()
            }
            Err(e) => return Err(StoreError::Read(e)),
        };
        Ok(Self { path, snapshot })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.snapshot)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::Write)?;
        }
        std::fs::write(&self.path, bytes).map_err(StoreError::Write)
    }

    pub fn insert(
        &mut self,
        name: String,
        value: String,
    ) -> Result<u64, StoreError> {
        let id = self.snapshot.next_id;
        self.snapshot.next_id += 1;
        self.snapshot.records.push(Record { id, name, value });
        self.persist()?;
        Ok(id)
    }

    /// Returns the number of rows updated (0 or 1 -- `id` is a primary
    /// key in this reference store, but the wire shape reports a count
    /// rather than a bool to leave room for stores where it isn't).
    pub fn update(
        &mut self,
        id: u64,
        value: String,
    ) -> Result<u64, StoreError> {
        let mut rows = 0u64;
        for record in &mut self.snapshot.records {
            if record.id == id {
                record.value = value.clone();
                rows += 1;
            }
        }
        if rows > 0 {
            self.persist()?;
        }
        Ok(rows)
    }

    pub fn select(&self, id: Option<u64>) -> Vec<Record> {
        match id {
            Some(id) => self
                .snapshot
                .records
                .iter()
                .filter(|r| r.id == id)
                .cloned()
                .collect(),
            None => self.snapshot.records.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_assigns_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::load(dir.path().join("t.db")).unwrap();
        let id1 = store.insert("a".into(), "1".into()).unwrap();
        let id2 = store.insert("b".into(), "2".into()).unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
    }

    #[test]
    fn update_reports_rows_affected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::load(dir.path().join("t.db")).unwrap();
        let id = store.insert("a".into(), "1".into()).unwrap();
        let rows = store.update(id, "2".into()).unwrap();
        assert_eq!(rows, 1);
        assert_eq!(store.update(999, "2".into()).unwrap(), 0);
    }

    #[test]
    fn select_filters_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::load(dir.path().join("t.db")).unwrap();
        let id1 = store.insert("a".into(), "1".into()).unwrap();
        let _id2 = store.insert("b".into(), "2".into()).unwrap();
        assert_eq!(store.select(None).len(), 2);
        assert_eq!(store.select(Some(id1)).len(), 1);
    }

    #[test]
    fn reattaches_to_prior_state_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut store = Store::load(path.clone()).unwrap();
            store.insert("a".into(), "1".into()).unwrap();
        }
        let store = Store::load(path).unwrap();
        assert_eq!(store.select(None).len(), 1);
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::load(dir.path().join("never-written.db")).unwrap();
        assert!(store.select(None).is_empty());
    }
}
