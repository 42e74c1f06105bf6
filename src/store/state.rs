use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::foundation::core::SiteId;
use crate::foundation::error::{RadarError, RadarResult};

const EXTENSION: &str = "json";

/// Flat JSON key/value cache backed by one file per site.
///
/// Mutations are held in memory and written in full by [`StateStore::flush`]. `dirty` is true
/// exactly when the in-memory contents differ from what was last loaded or flushed.
///
/// Every operation other than [`StateStore::flush`] fails with [`RadarError::NotLoaded`] until
/// [`StateStore::load`] has bound the store to a file.
#[derive(Debug, Default)]
pub struct StateStore {
    path: Option<PathBuf>,
    entries: Map<String, Value>,
    dirty: bool,
}

impl StateStore {
    /// Create an unbound store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already bound to `name`.
    pub fn open(name: impl AsRef<Path>) -> RadarResult<Self> {
        let mut store = Self::new();
        store.load(name)?;
        Ok(store)
    }

    /// Backing file stem for a site under `root`, e.g. `<root>/ksjt`.
    pub fn stem_for(root: &Path, site: &SiteId) -> PathBuf {
        root.join(site.lower())
    }

    /// Bind the store to `name`, appending `.json` when missing.
    ///
    /// A missing file is an empty store. Rebinding discards unflushed changes.
    pub fn load(&mut self, name: impl AsRef<Path>) -> RadarResult<&Path> {
        let path = with_json_extension(name.as_ref());
        if self.dirty {
            tracing::warn!(
                from = ?self.path,
                to = %path.display(),
                "rebinding store with unflushed changes"
            );
        }

        self.entries = read_entries(&path)?;
        self.dirty = false;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "store loaded");
        Ok(self.path.insert(path).as_path())
    }

    /// `true` once [`StateStore::load`] has succeeded.
    pub fn is_loaded(&self) -> bool {
        self.path.is_some()
    }

    /// `true` when there are mutations not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bound file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether the backing file currently exists on disk.
    pub fn exists(&self) -> RadarResult<bool> {
        Ok(self.check_loaded()?.is_file())
    }

    /// Membership test. Never mutates.
    pub fn contains(&self, key: impl AsRef<str>) -> RadarResult<bool> {
        self.check_loaded()?;
        Ok(self.entries.contains_key(key.as_ref()))
    }

    /// Pure read of the raw value for `key`.
    pub fn peek(&self, key: impl AsRef<str>) -> RadarResult<Option<&Value>> {
        self.check_loaded()?;
        Ok(self.entries.get(key.as_ref()))
    }

    /// Pure read decoded into `T`. A stored `null` reads as absent.
    pub fn get_typed<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> RadarResult<Option<T>> {
        let key = key.as_ref();
        match self.peek(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| RadarError::serde(format!("cached '{key}' is malformed: {e}"))),
        }
    }

    /// Read `key`, first initializing it to `default` when absent.
    ///
    /// This is a mutating read: an absent key with a `Some` default is materialized and marks
    /// the store dirty. A `None` default materializes nothing.
    pub fn get_or_init(
        &mut self,
        key: impl AsRef<str>,
        default: Option<Value>,
    ) -> RadarResult<Option<Value>> {
        self.check_loaded()?;
        let key = key.as_ref();
        if !self.entries.contains_key(key) {
            match default {
                None | Some(Value::Null) => return Ok(None),
                Some(v) => {
                    self.entries.insert(key.to_string(), v);
                    self.dirty = true;
                }
            }
        }
        Ok(self.entries.get(key).cloned())
    }

    /// Store `value` under `key`, returning whether contents changed.
    ///
    /// `None` (or JSON `null`) removes the key instead. Re-setting an equal value is a no-op.
    pub fn set(&mut self, key: impl AsRef<str>, value: Option<Value>) -> RadarResult<bool> {
        self.check_loaded()?;
        let key = key.as_ref();
        let value = match value {
            None | Some(Value::Null) => return self.remove(key),
            Some(v) => v,
        };

        if self.entries.get(key) == Some(&value) {
            return Ok(false);
        }
        self.entries.insert(key.to_string(), value);
        self.dirty = true;
        Ok(true)
    }

    /// Serialize `value` and [`StateStore::set`] it.
    pub fn set_typed<T: Serialize>(&mut self, key: impl AsRef<str>, value: &T) -> RadarResult<bool> {
        let key = key.as_ref();
        let v = serde_json::to_value(value)
            .map_err(|e| RadarError::serde(format!("cannot encode '{key}': {e}")))?;
        self.set(key, Some(v))
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&mut self, key: impl AsRef<str>) -> RadarResult<bool> {
        self.check_loaded()?;
        if self.entries.remove(key.as_ref()).is_none() {
            return Ok(false);
        }
        self.dirty = true;
        Ok(true)
    }

    /// All entries, for diagnostics.
    pub fn entries(&self) -> RadarResult<&Map<String, Value>> {
        self.check_loaded()?;
        Ok(&self.entries)
    }

    /// Write the full contents when dirty or `force`d.
    ///
    /// Returns `Ok(false)` only when the store was never bound. A clean store reports `Ok(true)`
    /// without touching the disk. On a failed write the dirty flag stays set.
    pub fn flush(&mut self, force: bool) -> RadarResult<bool> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };
        if !self.dirty && !force {
            return Ok(true);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RadarError::durability(format!("create '{}': {e}", parent.display()))
            })?;
        }
        let bytes = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| RadarError::durability(format!("encode '{}': {e}", path.display())))?;
        std::fs::write(path, bytes)
            .map_err(|e| RadarError::durability(format!("write '{}': {e}", path.display())))?;

        self.dirty = false;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "store flushed");
        Ok(true)
    }

    fn check_loaded(&self) -> RadarResult<&Path> {
        self.path
            .as_deref()
            .ok_or_else(|| RadarError::not_loaded("derived-state file has not been loaded"))
    }
}

fn with_json_extension(name: &Path) -> PathBuf {
    let has_ext = name
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(EXTENSION));
    if has_ext {
        return name.to_path_buf();
    }
    let mut s = name.as_os_str().to_owned();
    s.push(".");
    s.push(EXTENSION);
    PathBuf::from(s)
}

fn read_entries(path: &Path) -> RadarResult<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| RadarError::durability(format!("read '{}': {e}", path.display())))?;

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => {
            tracing::warn!(
                path = %path.display(),
                kind = json_kind(&other),
                "derived-state file is not an object, starting empty"
            );
            Ok(Map::new())
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable derived-state file, starting empty");
            Ok(Map::new())
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/state.rs"]
mod tests;
