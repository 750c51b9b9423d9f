use std::path::Path;

use rusqlite::{Connection, params};

use starfall_core::{KeyValueStore, PersistenceError};

use crate::error::Result;
use crate::schema;

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- Key-value entries ---

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE
             SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    /// Last write time of an entry, as SQLite `datetime('now')` text.
    pub fn updated_at(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT updated_at FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Fold the WAL back into the main database file.
    pub fn checkpoint_truncate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

impl KeyValueStore for Store {
    fn read(&self, key: &str) -> std::result::Result<Option<String>, PersistenceError> {
        Ok(self.get(key)?)
    }

    fn write(&mut self, key: &str, value: &str) -> std::result::Result<(), PersistenceError> {
        Ok(self.set(key, value)?)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.checkpoint_truncate() {
            tracing::debug!("WAL checkpoint on close failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use starfall_core::{DAYS_FOUND_KEY, DiscoveryStore};

    #[test]
    fn test_kv_overwrite() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get("k").unwrap().is_none());
        assert!(store.updated_at("k").unwrap().is_none());

        store.set("k", "1").unwrap();
        store.set("k", "2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));
        assert!(store.updated_at("k").unwrap().is_some());
    }

    #[test]
    fn test_open_refuses_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("starfall.db");
        {
            let conn = Connection::open(&path).unwrap();
            crate::schema::initialize(&conn).unwrap();
            conn.execute(
                "UPDATE metadata SET value = '99' WHERE key = 'schema_version'",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            Store::open(&path),
            Err(crate::error::StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_discovery_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("starfall.db");

        {
            let mut discovery = DiscoveryStore::open(Store::open(&path).unwrap());
            discovery.mark_found(7);
            discovery.mark_found(3);
            discovery.mark_found(7);
        }

        let discovery = DiscoveryStore::open(Store::open(&path).unwrap());
        assert_eq!(discovery.found(), &BTreeSet::from([3, 7]));
        assert_eq!(
            discovery.backend().get(DAYS_FOUND_KEY).unwrap().as_deref(),
            Some("[3,7]")
        );
    }

    #[test]
    fn test_corrupt_entry_loads_empty() {
        let store = Store::open_in_memory().unwrap();
        store.set(DAYS_FOUND_KEY, "{broken").unwrap();
        let discovery = DiscoveryStore::open(store);
        assert!(discovery.found().is_empty());
    }
}
