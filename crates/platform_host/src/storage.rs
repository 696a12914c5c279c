//! Window-record persistence adapters: no-op, in-memory, and JSON-file backed.

use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use desktop_contract::{WindowId, WindowPatch, WindowRecord, WindowStore};
use serde::{Deserialize, Serialize};

/// Version for [`StoredWindowSet`] serialization.
pub const STORED_WINDOWS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Versioned on-disk envelope for a persisted window set.
pub struct StoredWindowSet {
    /// Envelope schema version.
    pub schema_version: u32,
    /// Persisted window records.
    pub windows: Vec<WindowRecord>,
}

impl StoredWindowSet {
    /// Empty set at the current schema version.
    pub fn empty() -> Self {
        Self {
            schema_version: STORED_WINDOWS_SCHEMA_VERSION,
            windows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// No-op window store for embedders without durability and baseline tests.
pub struct NoopWindowStore;

impl WindowStore for NoopWindowStore {
    fn insert_window(&self, _record: &WindowRecord) -> Result<(), String> {
        Ok(())
    }

    fn update_window(&self, _id: WindowId, _patch: &WindowPatch) -> Result<(), String> {
        Ok(())
    }

    fn delete_window(&self, _id: WindowId) -> Result<(), String> {
        Ok(())
    }

    fn all_windows(&self) -> Result<Vec<WindowRecord>, String> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
/// In-memory window store keyed by window id; clones share one backing map.
pub struct MemoryWindowStore {
    inner: Rc<RefCell<HashMap<WindowId, WindowRecord>>>,
}

impl Default for MemoryWindowStore {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl MemoryWindowStore {
    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Returns the stored record for `id`, if present.
    pub fn record(&self, id: WindowId) -> Option<WindowRecord> {
        self.inner.borrow().get(&id).cloned()
    }

    /// Replaces the stored set wholesale; used to seed boot-hydration tests.
    pub fn seed(&self, records: impl IntoIterator<Item = WindowRecord>) {
        let mut inner = self.inner.borrow_mut();
        inner.clear();
        for record in records {
            inner.insert(record.id, record);
        }
    }
}

impl WindowStore for MemoryWindowStore {
    fn insert_window(&self, record: &WindowRecord) -> Result<(), String> {
        self.inner.borrow_mut().insert(record.id, record.clone());
        Ok(())
    }

    fn update_window(&self, id: WindowId, patch: &WindowPatch) -> Result<(), String> {
        let mut inner = self.inner.borrow_mut();
        let record = inner
            .get_mut(&id)
            .ok_or_else(|| format!("window {id} not present in store"))?;
        patch.apply_to(record);
        Ok(())
    }

    fn delete_window(&self, id: WindowId) -> Result<(), String> {
        self.inner.borrow_mut().remove(&id);
        Ok(())
    }

    fn all_windows(&self) -> Result<Vec<WindowRecord>, String> {
        let mut records = self.inner.borrow().values().cloned().collect::<Vec<_>>();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }
}

#[derive(Debug, Clone)]
/// Window store persisting a [`StoredWindowSet`] as pretty JSON at a fixed path.
///
/// Every write rewrites the whole set; adequate for the bounded window ceiling.
pub struct JsonFileWindowStore {
    path: PathBuf,
}

impl JsonFileWindowStore {
    /// Store backed by the file at `path`; the file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_set(&self) -> Result<StoredWindowSet, String> {
        if !self.path.exists() {
            return Ok(StoredWindowSet::empty());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| e.to_string())?;
        serde_json::from_str(&raw).map_err(|e| e.to_string())
    }

    fn save_set(&self, set: &StoredWindowSet) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let raw = serde_json::to_string_pretty(set).map_err(|e| e.to_string())?;
        fs::write(&self.path, raw).map_err(|e| e.to_string())
    }
}

impl WindowStore for JsonFileWindowStore {
    fn insert_window(&self, record: &WindowRecord) -> Result<(), String> {
        let mut set = self.load_set()?;
        set.windows.retain(|existing| existing.id != record.id);
        set.windows.push(record.clone());
        self.save_set(&set)
    }

    fn update_window(&self, id: WindowId, patch: &WindowPatch) -> Result<(), String> {
        let mut set = self.load_set()?;
        let record = set
            .windows
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| format!("window {id} not present in store"))?;
        patch.apply_to(record);
        self.save_set(&set)
    }

    fn delete_window(&self, id: WindowId) -> Result<(), String> {
        let mut set = self.load_set()?;
        let before = set.windows.len();
        set.windows.retain(|record| record.id != id);
        if set.windows.len() == before {
            return Ok(());
        }
        self.save_set(&set)
    }

    fn all_windows(&self) -> Result<Vec<WindowRecord>, String> {
        let mut records = self.load_set()?.windows;
        records.sort_by_key(|record| record.id);
        Ok(records)
    }
}
