use super::{EntityId, KeyValueStore};
use crate::error::StoreError;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One JSON file per entity:
/// `session.json`, `history.json` and `countdowns/countdown_<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn countdown_dir(&self) -> PathBuf {
        self.root.join("countdowns")
    }

    pub fn path_for(&self, id: &EntityId) -> PathBuf {
        match id {
            EntityId::Countdown(_) => self.countdown_dir().join(format!("{}.json", id.key())),
            _ => self.root.join(format!("{}.json", id.key())),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn load(&self, id: &EntityId) -> Result<Option<Value>, StoreError> {
        match fs::read(self.path_for(id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, id: &EntityId, value: &Value) -> Result<(), StoreError> {
        let path = self.path_for(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // write-then-rename so a crash never leaves a truncated file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&mut self, id: &EntityId) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn countdown_records(&self) -> Result<Vec<Value>, StoreError> {
        let dir = self.countdown_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            let parsed = fs::read(&path)
                .map_err(StoreError::from)
                .and_then(|bytes| serde_json::from_slice(&bytes).map_err(StoreError::from));
            match parsed {
                Ok(value) => records.push(value),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping countdown file"),
            }
        }
        Ok(records)
    }
}
