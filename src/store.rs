pub mod json_file;
pub mod sqlite;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::warn;

/// Identity of a persisted entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityId {
    Session,
    History,
    Countdown(String),
}

impl EntityId {
    /// Storage key, stable across backends.
    pub fn key(&self) -> String {
        match self {
            EntityId::Session => "session".to_string(),
            EntityId::History => "history".to_string(),
            EntityId::Countdown(name) => format!("countdown_{}", safe_name(name)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EntityId::Session => "session",
            EntityId::History => "history",
            EntityId::Countdown(_) => "countdown",
        }
    }
}

/// File-system safe form of a countdown name. Distinct names may collide,
/// so the tracker refuses names whose safe forms clash.
pub fn safe_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Persistence capability the tracker depends on.
pub trait KeyValueStore {
    fn load(&self, id: &EntityId) -> Result<Option<Value>, StoreError>;
    fn save(&mut self, id: &EntityId, value: &Value) -> Result<(), StoreError>;
    /// Removing a missing entity is not an error.
    fn remove(&mut self, id: &EntityId) -> Result<(), StoreError>;
    /// Every stored countdown record. Unreadable entries are skipped.
    fn countdown_records(&self) -> Result<Vec<Value>, StoreError>;
}

/// Loads and decodes a record; any failure reads as "absent".
pub fn load_record<T: DeserializeOwned>(store: &dyn KeyValueStore, id: &EntityId) -> Option<T> {
    match store.load(id) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key = %id.key(), error = %e, "malformed record, starting fresh");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key = %id.key(), error = %e, "unreadable record, starting fresh");
            None
        }
    }
}

pub fn save_record<T: Serialize>(
    store: &mut dyn KeyValueStore,
    id: &EntityId,
    record: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(record)?;
    store.save(id, &value)
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: BTreeMap<String, (&'static str, Value)>,
    fail_writes: bool,
    writes: usize,
}

/// In-memory store. Clones share contents, so a test can keep a handle to
/// inspect what the tracker persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.borrow_mut().fail_writes = fail;
    }

    /// Number of successful writes so far.
    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.inner.borrow().entries.contains_key(&id.key())
    }

    /// Stores raw JSON, bypassing record encoding.
    pub fn insert_raw(&self, id: &EntityId, value: Value) {
        self.inner
            .borrow_mut()
            .entries
            .insert(id.key(), (id.kind(), value));
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, id: &EntityId) -> Result<Option<Value>, StoreError> {
        Ok(self
            .inner
            .borrow()
            .entries
            .get(&id.key())
            .map(|(_, v)| v.clone()))
    }

    fn save(&mut self, id: &EntityId, value: &Value) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_writes {
            return Err(StoreError::Io(std::io::Error::other("writes disabled")));
        }
        inner.entries.insert(id.key(), (id.kind(), value.clone()));
        inner.writes += 1;
        Ok(())
    }

    fn remove(&mut self, id: &EntityId) -> Result<(), StoreError> {
        self.inner.borrow_mut().entries.remove(&id.key());
        Ok(())
    }

    fn countdown_records(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .inner
            .borrow()
            .entries
            .values()
            .filter(|(kind, _)| *kind == "countdown")
            .map(|(_, v)| v.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_stable() {
        assert_eq!(EntityId::Session.key(), "session");
        assert_eq!(EntityId::History.key(), "history");
        assert_eq!(
            EntityId::Countdown("Deep Work".into()).key(),
            "countdown_Deep_Work"
        );
        assert_eq!(safe_name("a/b:c"), "a_b_c");
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryStore::new();
        let id = EntityId::Countdown("read".into());
        store.save(&id, &json!({"name": "read"})).unwrap();
        assert_eq!(store.load(&id).unwrap(), Some(json!({"name": "read"})));
        assert_eq!(store.countdown_records().unwrap().len(), 1);
        store.remove(&id).unwrap();
        assert_eq!(store.load(&id).unwrap(), None);
        store.remove(&id).unwrap();
    }

    #[test]
    fn malformed_record_loads_as_absent() {
        let store = MemoryStore::new();
        store.insert_raw(&EntityId::Session, json!({"laps": "nope"}));
        let loaded: Option<crate::session::SessionRecord> =
            load_record(&store, &EntityId::Session);
        assert!(loaded.is_none());
    }

    #[test]
    fn failing_writes_surface_as_errors() {
        let mut store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.save(&EntityId::History, &json!({})).is_err());
        assert_eq!(store.writes(), 0);
    }
}
