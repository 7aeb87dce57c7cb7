//! Persistence surface. A narrow trait so the core never links
//! a concrete database crate; callers plug in whatever they already run.

use crate::error::CoreError;
use parking_lot::Mutex;
use std::collections::HashMap;

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CoreError>;
    fn delete(&self, key: &str) -> Result<(), CoreError>;
}

/// Default in-process store. Not durable across restarts; intended for
/// tests and single-process deployments without an external store.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CoreError> {
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CoreError> {
        self.data.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_values() {
        let store = InMemoryKvStore::new();
        store.put("a", b"hello".to_vec()).unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"hello".to_vec()));
    }

    #[test]
    fn delete_removes_key() {
        let store = InMemoryKvStore::new();
        store.put("a", b"hello".to_vec()).unwrap();
        store.delete("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn missing_key_is_none_not_error() {
        let store = InMemoryKvStore::new();
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
