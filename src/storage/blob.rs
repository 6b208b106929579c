use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage quota exceeded while writing '{key}'")]
    QuotaExceeded { key: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// A key-value store of text blobs, one key per persisted collection.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Read the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the blob stored under `key`.
    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, String>,
    writes: usize,
    unavailable: bool,
    fail_writes: bool,
}

/// In-process store, mainly a test double. Supports a byte quota and
/// injected failures.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total size of keys plus values.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Seed a blob without counting it as a write.
    pub fn with_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.entries.insert(key.into(), value.into());
        }
        self
    }

    /// Make every read and write fail, as when no storage exists at all.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unavailable = unavailable;
        }
    }

    /// Make writes fail with a generic backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_writes = fail;
        }
    }

    /// Current raw blob for `key`, bypassing the failure switches.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.entries.get(key).cloned())
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().map(|state| state.writes).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let state = self.lock()?;
        if state.unavailable {
            return Err(StorageError::Unavailable("memory store disabled".to_string()));
        }
        Ok(state.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.unavailable {
            return Err(StorageError::Unavailable("memory store disabled".to_string()));
        }
        if state.fail_writes {
            return Err(StorageError::Backend(anyhow::anyhow!(
                "injected write failure for '{}'",
                key
            )));
        }
        if let Some(quota) = self.quota_bytes {
            let others: usize = state
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        state.entries.insert(key.to_string(), value.to_string());
        state.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.put("k", "v1").await.unwrap();
        store.put("k", "v2").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_quota_counts_replaced_value_once() {
        let store = MemoryStore::with_quota(10);
        store.put("k", "12345678").await.unwrap();
        store.put("k", "87654321").await.unwrap();

        let err = store.put("k", "1234567890").await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(store.raw("k").as_deref(), Some("87654321"));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_reads_and_writes() {
        let store = MemoryStore::new().with_entry("k", "v");
        store.set_unavailable(true);

        assert!(matches!(store.get("k").await, Err(StorageError::Unavailable(_))));
        assert!(matches!(store.put("k", "x").await, Err(StorageError::Unavailable(_))));
        assert_eq!(store.raw("k").as_deref(), Some("v"));
    }
}
