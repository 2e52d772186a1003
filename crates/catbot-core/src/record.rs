//! Persistent key/value record shared by handlers.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use serde_json::{Map, Value};
use tracing::debug;

use crate::{errors::Error, Result};

/// A JSON object kept in memory and written to disk on [`RecordStore::save`].
///
/// All methods take `&self`; wrap the store in an `Arc` to share it between
/// handlers.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl RecordStore {
    /// Read `path`. A missing or blank file starts an empty record.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(txt) if txt.trim().is_empty() => Map::new(),
            Ok(txt) => match serde_json::from_str::<Value>(&txt)? {
                Value::Object(map) => map,
                _ => {
                    return Err(Error::InvalidPath {
                        path,
                        reason: "record file does not hold a JSON object".to_string(),
                    })
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = data.len(), "record loaded");
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    /// Value stored under `key`; if absent, store `default` there first.
    pub fn fetch_or_default(&self, key: &str, default: impl Into<Value>) -> Value {
        self.lock()
            .entry(key.to_string())
            .or_insert_with(|| default.into())
            .clone()
    }

    /// Mutate the value under `key` in place (inserting `default` if absent).
    pub fn update<R>(
        &self,
        key: &str,
        default: impl Into<Value>,
        f: impl FnOnce(&mut Value) -> R,
    ) -> R {
        let mut data = self.lock();
        let slot = data
            .entry(key.to_string())
            .or_insert_with(|| default.into());
        f(slot)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write the record as pretty JSON. An empty record leaves the file untouched.
    pub fn save(&self) -> Result<()> {
        let txt = {
            let data = self.lock();
            if data.is_empty() {
                return Ok(());
            }
            serde_json::to_string_pretty(&*data)?
        };
        fs::write(&self.path, txt)?;
        debug!(path = %self.path.display(), "record saved");
        Ok(())
    }

    // Poisoning is ignored: every mutation is a single map operation.
    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}
