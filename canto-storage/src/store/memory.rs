//! Process-local histogram store.
//!
//! Used for development (`CANTO_STORE_BACKEND=memory`) and as the store in
//! tests. All state lives behind one `RwLock`; increments take the write
//! lock, so each one is atomic with respect to every other operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use canto_core::{CantoResult, Histogram, HistogramKey, StoreError};

use super::traits::HistogramStore;

#[derive(Debug, Default)]
pub struct InMemoryHistogramStore {
    histograms: RwLock<HashMap<String, Histogram>>,
    closed: AtomicBool,
}

impl InMemoryHistogramStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self, operation: &'static str, key: &HistogramKey) -> CantoResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::unavailable(operation, key.store_key(), "store is closed").into());
        }
        Ok(())
    }
}

#[async_trait]
impl HistogramStore for InMemoryHistogramStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, key: &HistogramKey) -> CantoResult<bool> {
        self.ensure_open("EXISTS", key)?;
        let map = self
            .histograms
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.contains_key(&key.store_key()))
    }

    async fn delete(&self, key: &HistogramKey) -> CantoResult<()> {
        self.ensure_open("DEL", key)?;
        let mut map = self
            .histograms
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        map.remove(&key.store_key());
        Ok(())
    }

    async fn increment_word(&self, key: &HistogramKey, word: &str) -> CantoResult<u64> {
        self.ensure_open("HINCRBY", key)?;
        let mut map = self
            .histograms
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.entry(key.store_key()).or_default().increment(word))
    }

    async fn read_all(&self, key: &HistogramKey) -> CantoResult<Histogram> {
        self.ensure_open("HGETALL", key)?;
        let map = self
            .histograms
            .read()
            .map_err(|_| StoreError::LockPoisoned)?;
        Ok(map.get(&key.store_key()).cloned().unwrap_or_default())
    }

    async fn ping(&self) -> CantoResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::ConnectionFailed {
                reason: "store is closed".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(verse: &str) -> HistogramKey {
        HistogramKey::new("inferno", "1", verse).unwrap()
    }

    #[tokio::test]
    async fn test_absent_key() {
        let store = InMemoryHistogramStore::new();
        assert!(!store.exists(&key("1")).await.unwrap());
        assert!(store.read_all(&key("1")).await.unwrap().is_empty());
        // Deleting an absent key is a no-op
        store.delete(&key("1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_exists_tracks_increment_and_delete() {
        let store = InMemoryHistogramStore::new();
        let k = key("2");

        assert_eq!(store.increment_word(&k, "selva").await.unwrap(), 1);
        assert!(store.exists(&k).await.unwrap());

        store.delete(&k).await.unwrap();
        assert!(!store.exists(&k).await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let store = InMemoryHistogramStore::new();
        store.increment_word(&key("1"), "a").await.unwrap();
        store.increment_word(&key("2"), "b").await.unwrap();

        let one = store.read_all(&key("1")).await.unwrap();
        assert_eq!(one.get("a"), 1);
        assert_eq!(one.get("b"), 0);
        assert!(store.exists(&key("2")).await.unwrap());
        assert!(!store.exists(&key("4")).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryHistogramStore::new());
        let k = key("3");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let k = k.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    store.increment_word(&k, "vita").await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.read_all(&k).await.unwrap().get("vita"), 400);
    }

    #[tokio::test]
    async fn test_closed_store_fails_instead_of_reporting_absent() {
        let store = InMemoryHistogramStore::new();
        store.close().await;

        let err = store.exists(&key("1")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.ping().await.is_err());
    }
}
