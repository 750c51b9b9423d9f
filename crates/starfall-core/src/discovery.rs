use std::collections::{BTreeSet, HashMap};

use crate::constants::DAYS_FOUND_KEY;
use crate::error::PersistenceError;

/// Key-value persistence collaborator.
pub trait KeyValueStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// In-process key-value store. Nothing survives the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
    writes: usize,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut kv = Self::new();
        kv.entries.insert(key.to_string(), value.to_string());
        kv
    }

    /// Number of successful writes since creation.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl KeyValueStore for MemoryKv {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).write(key, value)
    }
}

/// Decode a persisted day list. Duplicates collapse.
pub fn decode_days(raw: &str) -> Result<BTreeSet<u32>, PersistenceError> {
    let days: Vec<u32> = serde_json::from_str(raw)?;
    Ok(days.into_iter().collect())
}

/// Encode a day set as a JSON integer list.
pub fn encode_days(days: &BTreeSet<u32>) -> String {
    let list: Vec<u32> = days.iter().copied().collect();
    // A Vec<u32> always serializes.
    serde_json::to_string(&list).unwrap_or_else(|_| "[]".to_string())
}

/// Set of discovered days, persisted through a [`KeyValueStore`].
///
/// The set only grows. Every `mark_found` writes the full set back.
pub struct DiscoveryStore<S> {
    backend: S,
    found: BTreeSet<u32>,
}

impl<S: KeyValueStore> DiscoveryStore<S> {
    /// Restore from the backend. Unreadable or malformed state is treated
    /// as "nothing discovered yet".
    pub fn open(backend: S) -> Self {
        let mut store = Self {
            backend,
            found: BTreeSet::new(),
        };
        store.found = store.load();
        store
    }

    /// Read the persisted set, failing soft to an empty set.
    pub fn load(&self) -> BTreeSet<u32> {
        match self.try_load() {
            Ok(days) => days,
            Err(e) => {
                tracing::warn!("discarding persisted discovery state: {e}");
                BTreeSet::new()
            }
        }
    }

    fn try_load(&self) -> Result<BTreeSet<u32>, PersistenceError> {
        match self.backend.read(DAYS_FOUND_KEY)? {
            Some(raw) => decode_days(&raw),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Add `day` (idempotent) and persist the full set.
    pub fn mark_found(&mut self, day: u32) -> &BTreeSet<u32> {
        if self.found.insert(day) {
            tracing::debug!("day {day} discovered ({} total)", self.found.len());
        }
        let encoded = encode_days(&self.found);
        if let Err(e) = self.backend.write(DAYS_FOUND_KEY, &encoded) {
            tracing::warn!("failed to persist discovered days: {e}");
        }
        &self.found
    }

    /// Forget every discovered day and persist the empty set.
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.found.clear();
        self.backend.write(DAYS_FOUND_KEY, &encode_days(&self.found))
    }

    pub fn found(&self) -> &BTreeSet<u32> {
        &self.found
    }

    pub fn contains(&self, day: u32) -> bool {
        self.found.contains(&day)
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn into_backend(self) -> S {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingKv;

    impl KeyValueStore for FailingKv {
        fn read(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
            Err(PersistenceError::Backend("disk on fire".to_string()))
        }

        fn write(&mut self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Backend("disk on fire".to_string()))
        }
    }

    #[test]
    fn test_duplicates_collapse_on_load() {
        let store = DiscoveryStore::open(MemoryKv::with_entry(DAYS_FOUND_KEY, "[1,2,2,3]"));
        assert_eq!(store.load(), BTreeSet::from([1, 2, 3]));
        assert_eq!(store.found(), &BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn test_absent_key_is_empty() {
        let store = DiscoveryStore::open(MemoryKv::new());
        assert!(store.found().is_empty());
    }

    #[test]
    fn test_malformed_state_is_empty() {
        for raw in ["not json", "{\"a\":1}", "[1,-2]", "[\"3\"]", ""] {
            let store = DiscoveryStore::open(MemoryKv::with_entry(DAYS_FOUND_KEY, raw));
            assert!(store.found().is_empty(), "expected empty for {raw:?}");
        }
    }

    #[test]
    fn test_unreadable_backend_is_empty() {
        let store = DiscoveryStore::open(FailingKv);
        assert!(store.found().is_empty());
    }

    #[test]
    fn test_mark_found_persists_every_call() {
        let mut store = DiscoveryStore::open(MemoryKv::new());
        store.mark_found(3);
        store.mark_found(1);
        store.mark_found(3);
        assert_eq!(store.backend().writes(), 3);
        assert_eq!(
            store.backend().read(DAYS_FOUND_KEY).unwrap().as_deref(),
            Some("[1,3]")
        );
    }

    #[test]
    fn test_failed_write_still_grows() {
        let mut store = DiscoveryStore::open(FailingKv);
        let found = store.mark_found(5).clone();
        assert_eq!(found, BTreeSet::from([5]));
        assert!(store.contains(5));
    }

    #[test]
    fn test_reopen_restores_state() {
        let mut store = DiscoveryStore::open(MemoryKv::new());
        store.mark_found(2);
        store.mark_found(9);
        let reopened = DiscoveryStore::open(store.into_backend());
        assert_eq!(reopened.found(), &BTreeSet::from([2, 9]));
    }

    #[test]
    fn test_clear_persists_empty_list() {
        let mut store = DiscoveryStore::open(MemoryKv::new());
        store.mark_found(4);
        store.clear().unwrap();
        assert!(store.found().is_empty());
        assert!(store.load().is_empty());
    }
}
