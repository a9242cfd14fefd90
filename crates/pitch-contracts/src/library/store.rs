use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// A flat keyed collection persisted as one JSON object.
///
/// Reads refresh from disk; writes merge only the keys this instance touched
/// into whatever is on disk, so two handles on one file do not clobber each
/// other's entries.
///
/// An unreadable or malformed file is an error unless the store was opened
/// with [`KeyedStore::lenient`], in which case it reads as empty and the next
/// write replaces it.
#[derive(Debug, Clone)]
pub struct KeyedStore {
    path: PathBuf,
    lenient: bool,
    payload: Option<Map<String, Value>>,
    dirty_keys: Vec<String>,
    removed_keys: Vec<String>,
}

impl KeyedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lenient: false,
            payload: None,
            dirty_keys: Vec::new(),
            removed_keys: Vec::new(),
        }
    }

    /// For disposable data such as caches.
    pub fn lenient(path: impl Into<PathBuf>) -> Self {
        Self {
            lenient: true,
            ..Self::new(path)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_raw(&mut self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.refresh()?.get(key).cloned())
    }

    /// `None` when the key is absent or its value is not a `T`.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> anyhow::Result<Option<T>> {
        Ok(self
            .get_raw(key)?
            .and_then(|raw| serde_json::from_value(raw).ok()))
    }

    pub fn contains(&mut self, key: &str) -> anyhow::Result<bool> {
        Ok(self.refresh()?.contains_key(key))
    }

    pub fn keys(&mut self) -> anyhow::Result<Vec<String>> {
        Ok(self.refresh()?.keys().cloned().collect())
    }

    /// Every entry that deserializes as `T`, in key order.
    pub fn entries<T: DeserializeOwned>(&mut self) -> anyhow::Result<Vec<(String, T)>> {
        Ok(self
            .refresh()?
            .iter()
            .filter_map(|(key, value)| {
                serde_json::from_value::<T>(value.clone())
                    .ok()
                    .map(|parsed| (key.clone(), parsed))
            })
            .collect())
    }

    pub fn upsert<T: Serialize>(&mut self, key: &str, value: &T) -> anyhow::Result<()> {
        let snapshot = serde_json::to_value(value)?;
        let payload = self.refresh()?;
        if payload.get(key) == Some(&snapshot) {
            return Ok(());
        }
        payload.insert(key.to_string(), snapshot);
        self.mark_dirty(key);
        self.flush()
    }

    /// Inserts only when `key` is absent; returns whether it was written.
    pub fn insert_new<T: Serialize>(&mut self, key: &str, value: &T) -> anyhow::Result<bool> {
        if self.contains(key)? {
            return Ok(false);
        }
        self.upsert(key, value)?;
        Ok(true)
    }

    pub fn remove(&mut self, key: &str) -> anyhow::Result<bool> {
        let existed = self.refresh()?.remove(key).is_some();
        if !existed {
            return Ok(false);
        }
        self.dirty_keys.retain(|dirty| dirty != key);
        if !self.removed_keys.iter().any(|removed| removed == key) {
            self.removed_keys.push(key.to_string());
        }
        self.flush()?;
        Ok(true)
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        if self.dirty_keys.is_empty() && self.removed_keys.is_empty() {
            return Ok(());
        }
        let Some(payload) = &self.payload else {
            return Ok(());
        };

        let mut on_disk = self.read_disk()?;
        for key in &self.dirty_keys {
            if let Some(value) = payload.get(key) {
                on_disk.insert(key.clone(), value.clone());
            }
        }
        for key in &self.removed_keys {
            on_disk.remove(key);
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = Some(on_disk);
        self.dirty_keys.clear();
        self.removed_keys.clear();
        Ok(())
    }

    fn mark_dirty(&mut self, key: &str) {
        self.removed_keys.retain(|removed| removed != key);
        if !self.dirty_keys.iter().any(|dirty| dirty == key) {
            self.dirty_keys.push(key.to_string());
        }
    }

    fn refresh(&mut self) -> anyhow::Result<&mut Map<String, Value>> {
        let fresh = self.read_disk()?;
        Ok(self.payload.insert(fresh))
    }

    fn read_disk(&self) -> anyhow::Result<Map<String, Value>> {
        match read_json_object(&self.path) {
            Ok(payload) => Ok(payload.unwrap_or_default()),
            Err(err) if self.lenient => {
                tracing::warn!(path = %self.path.display(), error = %err, "discarding unreadable store");
                Ok(Map::new())
            }
            Err(err) => Err(err),
        }
    }
}

/// `Ok(None)` only when the file does not exist.
fn read_json_object(path: &Path) -> anyhow::Result<Option<Map<String, Value>>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed reading {}", path.display()));
        }
    };
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match parsed {
        Value::Object(payload) => Ok(Some(payload)),
        _ => bail!("{} does not hold a JSON object", path.display()),
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )
    .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}
