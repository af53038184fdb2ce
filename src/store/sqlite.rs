use super::{EntityId, KeyValueStore};
use crate::error::StoreError;
use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use tracing::warn;

/// Single-file alternative to [`super::JsonFileStore`]: every entity is a
/// row holding its JSON record.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and its table
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind)",
            [],
        )?;

        Ok(SqliteStore { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self, id: &EntityId) -> Result<Option<Value>, StoreError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM entities WHERE key = ?1",
                [id.key()],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, id: &EntityId, value: &Value) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO entities (key, kind, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
            params![
                id.key(),
                id.kind(),
                serde_json::to_string(value)?,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn remove(&mut self, id: &EntityId) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM entities WHERE key = ?1", [id.key()])?;
        Ok(())
    }

    fn countdown_records(&self) -> Result<Vec<Value>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, body FROM entities WHERE kind = 'countdown' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (key, body) = row?;
            match serde_json::from_str(&body) {
                Ok(value) => records.push(value),
                Err(e) => warn!(%key, error = %e, "skipping countdown row"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn upsert_and_load() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.save(&EntityId::History, &json!({"2024-01-01": 5.0})).unwrap();
        store.save(&EntityId::History, &json!({"2024-01-01": 9.0})).unwrap();
        assert_eq!(
            store.load(&EntityId::History).unwrap(),
            Some(json!({"2024-01-01": 9.0}))
        );
        assert_eq!(store.load(&EntityId::Session).unwrap(), None);
    }

    #[test]
    fn lists_only_countdowns() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.save(&EntityId::Session, &json!({})).unwrap();
        store
            .save(&EntityId::Countdown("read".into()), &json!({"name": "read"}))
            .unwrap();
        store
            .save(&EntityId::Countdown("math".into()), &json!({"name": "math"}))
            .unwrap();
        let records = store.countdown_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "math");

        store.remove(&EntityId::Countdown("math".into())).unwrap();
        assert_eq!(store.countdown_records().unwrap().len(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("learnclock.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.save(&EntityId::Session, &json!({"laps": [1.0]})).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.load(&EntityId::Session).unwrap(),
            Some(json!({"laps": [1.0]}))
        );
    }
}
