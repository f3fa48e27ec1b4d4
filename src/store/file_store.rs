//! JSON file store for one resource collection.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use thiserror::Error;

/// One stored object.
pub type Record = Map<String, Value>;

/// Errors raised by the file store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed data in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A collection of records persisted as a JSON array.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Store backed by `<dir>/<file>`.
    pub fn new(dir: impl AsRef<Path>, file: &str) -> Self {
        Self {
            path: dir.as_ref().join(file),
            lock: Mutex::new(()),
        }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All records. A missing file is an empty collection.
    pub fn read(&self) -> Result<Vec<Record>, StoreError> {
        let _guard = self.guard();
        self.load()
    }

    /// Record whose id equals `id`. Non-numeric ids match nothing.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let _guard = self.guard();
        Ok(self.load()?.into_iter().find(|r| record_id(r) == Some(id)))
    }

    /// Append `record` under the next free id.
    pub fn create(&self, mut record: Record) -> Result<Record, StoreError> {
        let _guard = self.guard();
        let mut records = self.load()?;
        record.insert("id".to_string(), Value::from(next_id(&records)));
        records.push(record.clone());
        self.save(&records)?;
        Ok(record)
    }

    /// Replace the record with `id`, keeping the id.
    pub fn update(&self, id: &str, mut record: Record) -> Result<Option<Record>, StoreError> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let _guard = self.guard();
        let mut records = self.load()?;
        let Some(slot) = records.iter_mut().find(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };
        record.insert("id".to_string(), Value::from(id));
        *slot = record.clone();
        self.save(&records)?;
        Ok(Some(record))
    }

    /// Shallow-merge `updates` into the record with `id`, keeping the id.
    pub fn patch(&self, id: &str, updates: Record) -> Result<Option<Record>, StoreError> {
        let Some(id) = parse_id(id) else {
            return Ok(None);
        };
        let _guard = self.guard();
        let mut records = self.load()?;
        let Some(slot) = records.iter_mut().find(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };
        slot.extend(updates);
        slot.insert("id".to_string(), Value::from(id));
        let patched = slot.clone();
        self.save(&records)?;
        Ok(Some(patched))
    }

    /// Remove the record with `id`. Returns whether one was removed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let Some(id) = parse_id(id) else {
            return Ok(false);
        };
        let _guard = self.guard();
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|r| record_id(r) != Some(id));
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records)?;
        Ok(true)
    }

    fn load(&self) -> Result<Vec<Record>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, records: &[Record]) -> Result<(), StoreError> {
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let encoded = serde_json::to_string_pretty(records).map_err(|e| write_err(e.into()))?;
        fs::write(&self.path, encoded).map_err(write_err)?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "Store written");
        Ok(())
    }
}

/// Run `op` against `store` on the blocking thread pool.
pub async fn run_blocking<T, F>(store: &Arc<FileStore>, op: F) -> Result<T, StoreError>
where
    F: FnOnce(&FileStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store)).await?
}

fn parse_id(id: &str) -> Option<i64> {
    id.trim().parse().ok()
}

fn record_id(record: &Record) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// Highest id plus one; 1 for an empty collection.
fn next_id(records: &[Record]) -> i64 {
    records.iter().filter_map(record_id).max().map_or(1, |max| max + 1)
}
