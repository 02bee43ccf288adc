//! Per-key gates serializing populate passes.
//!
//! Every key gets a lazily created `tokio::sync::RwLock`. Readers of a ready
//! histogram take it shared; populate and ingest passes take it exclusive,
//! so no reader observes a half-written histogram and two callers that both
//! see a miss cannot both run a pass. Keys never contend with each other.
//!
//! Slots are pruned as soon as the last permit or waiter for a key goes
//! away, so the map only holds keys with requests in flight. Permits own a
//! handle to the gates and can be moved into a spawned task.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

#[derive(Debug, Default)]
struct GateMap {
    slots: DashMap<String, Arc<RwLock<()>>>,
    /// Keys with a pass in progress.
    in_flight: DashSet<String>,
}

impl GateMap {
    fn slot(&self, key: &str) -> Arc<RwLock<()>> {
        self.slots.entry(key.to_string()).or_default().clone()
    }

    fn prune(&self, key: &str) {
        self.slots
            .remove_if(key, |_, slot| Arc::strong_count(slot) == 1);
    }
}

/// Cloneable handle to the per-key gates.
#[derive(Debug, Clone, Default)]
pub struct KeyGates {
    inner: Arc<GateMap>,
}

impl KeyGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for shared access to `key`.
    pub async fn shared(&self, key: &str) -> SharedPermit {
        let _waiting = PruneOnDrop::new(self, key);
        let guard = self.inner.slot(key).read_owned().await;
        SharedPermit {
            gates: self.clone(),
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn exclusive(&self, key: &str) -> ExclusivePermit {
        let _waiting = PruneOnDrop::new(self, key);
        let guard = self.inner.slot(key).write_owned().await;
        ExclusivePermit {
            gates: self.clone(),
            key: key.to_string(),
            guard: Some(guard),
            marked: false,
        }
    }

    /// Whether a populate or ingest pass currently holds `key`.
    pub fn is_populating(&self, key: &str) -> bool {
        self.inner.in_flight.contains(key)
    }

    /// Number of keys with at least one live permit or waiter.
    pub fn active_keys(&self) -> usize {
        self.inner.slots.len()
    }
}

/// Prunes a key's slot when an acquisition ends, including when the waiting
/// future is dropped before it gets the lock.
///
/// Declared before the lock future, so the future and its slot reference
/// are dropped first.
struct PruneOnDrop<'g> {
    gates: &'g KeyGates,
    key: &'g str,
}

impl<'g> PruneOnDrop<'g> {
    fn new(gates: &'g KeyGates, key: &'g str) -> Self {
        Self { gates, key }
    }
}

impl Drop for PruneOnDrop<'_> {
    fn drop(&mut self) {
        self.gates.inner.prune(self.key);
    }
}

/// Shared access to one key. Released on drop.
pub struct SharedPermit {
    gates: KeyGates,
    key: String,
    guard: Option<OwnedRwLockReadGuard<()>>,
}

impl Drop for SharedPermit {
    fn drop(&mut self) {
        self.guard.take();
        self.gates.inner.prune(&self.key);
    }
}

/// Exclusive access to one key. Released on drop, which also clears the
/// populating mark.
pub struct ExclusivePermit {
    gates: KeyGates,
    key: String,
    guard: Option<OwnedRwLockWriteGuard<()>>,
    marked: bool,
}

impl ExclusivePermit {
    /// Flag the key as `Populating` for state queries.
    pub fn mark_populating(&mut self) {
        self.gates.inner.in_flight.insert(self.key.clone());
        self.marked = true;
    }
}

impl Drop for ExclusivePermit {
    fn drop(&mut self) {
        if self.marked {
            self.gates.inner.in_flight.remove(&self.key);
        }
        self.guard.take();
        self.gates.inner.prune(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_slots_pruned_after_release() {
        let gates = KeyGates::new();
        {
            let _a = gates.shared("inferno:1:1").await;
            let _b = gates.shared("inferno:1:1").await;
            assert_eq!(gates.active_keys(), 1);
        }
        assert_eq!(gates.active_keys(), 0);

        {
            let _w = gates.exclusive("inferno:1:1").await;
            assert_eq!(gates.active_keys(), 1);
        }
        assert_eq!(gates.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_populating_mark_cleared_on_drop() {
        let gates = KeyGates::new();
        {
            let mut permit = gates.exclusive("k").await;
            permit.mark_populating();
            assert!(gates.is_populating("k"));
        }
        assert!(!gates.is_populating("k"));
    }

    #[tokio::test]
    async fn test_exclusive_blocks_readers_of_same_key_only() {
        let gates = KeyGates::new();
        let permit = gates.exclusive("a").await;

        // Another key is unaffected
        let other = tokio::time::timeout(Duration::from_millis(50), gates.shared("b")).await;
        assert!(other.is_ok());
        drop(other);

        // Same key waits until the writer releases
        let blocked = tokio::time::timeout(Duration::from_millis(50), gates.shared("a")).await;
        assert!(blocked.is_err());

        drop(permit);
        let reader = tokio::time::timeout(Duration::from_millis(50), gates.shared("a")).await;
        assert!(reader.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_slot() {
        let gates = KeyGates::new();
        let permit = gates.exclusive("k").await;
        let waited = tokio::time::timeout(Duration::from_millis(20), gates.exclusive("k")).await;
        assert!(waited.is_err());
        drop(permit);
        assert_eq!(gates.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_waiter_dropped_after_holder_release_prunes_slot() {
        let gates = KeyGates::new();
        let permit = gates.exclusive("k").await;

        let mut waiter = Box::pin(gates.exclusive("k"));
        let polled = tokio::time::timeout(Duration::from_millis(20), &mut waiter).await;
        assert!(polled.is_err());

        // The waiter still references the slot, so this release keeps it.
        drop(permit);
        assert_eq!(gates.active_keys(), 1);

        drop(waiter);
        assert_eq!(gates.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_permit_outlives_borrow_of_gates() {
        let gates = KeyGates::new();
        let permit = gates.exclusive("k").await;
        let held = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(permit);
        });

        let reader = tokio::time::timeout(Duration::from_secs(1), gates.shared("k")).await;
        assert!(reader.is_ok());
        held.await.unwrap();
    }
}
