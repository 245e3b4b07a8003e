// ── Shared device store ──
//
// One async RwLock serializes every registry mutation. Dropping a write
// guard republishes the snapshot, so watchers see each committed change
// without the writer having to remember to notify.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, watch};

use super::registry::DeviceRegistry;
use crate::model::{Device, MacAddress};
use crate::stream::DeviceStream;

pub struct DeviceStore {
    registry: RwLock<DeviceRegistry>,
    snapshot: watch::Sender<Arc<Vec<Device>>>,
    last_reconciled: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (last_reconciled, _) = watch::channel(None);
        Self {
            registry: RwLock::new(DeviceRegistry::new()),
            snapshot,
            last_reconciled,
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, DeviceRegistry> {
        self.registry.read().await
    }

    /// Exclusive access to the registry. The snapshot is rebuilt when the
    /// guard is dropped.
    pub async fn write(&self) -> StoreWriteGuard<'_> {
        StoreWriteGuard {
            guard: self.registry.write().await,
            snapshot: &self.snapshot,
        }
    }

    // ── Snapshot accessors ───────────────────────────────────────────

    /// All devices in first-seen order (cheap `Arc` clone, no locking).
    pub fn snapshot(&self) -> Arc<Vec<Device>> {
        self.snapshot.borrow().clone()
    }

    pub fn device(&self, hardware_id: &MacAddress) -> Option<Device> {
        self.snapshot
            .borrow()
            .iter()
            .find(|d| &d.hardware_id == hardware_id)
            .cloned()
    }

    pub fn device_count(&self) -> usize {
        self.snapshot.borrow().len()
    }

    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.snapshot.subscribe())
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_reconciled(&self) -> Option<DateTime<Utc>> {
        *self.last_reconciled.borrow()
    }

    pub(crate) fn mark_reconciled(&self, at: DateTime<Utc>) {
        self.last_reconciled.send_replace(Some(at));
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StoreWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, DeviceRegistry>,
    snapshot: &'a watch::Sender<Arc<Vec<Device>>>,
}

impl Deref for StoreWriteGuard<'_> {
    type Target = DeviceRegistry;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for StoreWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for StoreWriteGuard<'_> {
    fn drop(&mut self) {
        let values: Vec<Device> = self.guard.all().cloned().collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceDescriptor, DeviceState};

    #[tokio::test]
    async fn snapshot_follows_committed_writes() {
        let store = DeviceStore::new();
        assert!(store.snapshot().is_empty());

        {
            let mut registry = store.write().await;
            registry.upsert(DeviceDescriptor::new("aa:bb:cc:00:00:01"));
            registry.upsert(DeviceDescriptor::new("aa:bb:cc:00:00:02"));
        }

        assert_eq!(store.device_count(), 2);
        let device = store.device(&MacAddress::new("aa:bb:cc:00:00:02")).unwrap();
        assert_eq!(device.state, DeviceState::Discovered);
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let store = DeviceStore::new();
        let mut stream = store.subscribe();
        assert!(stream.current().is_empty());

        store
            .write()
            .await
            .upsert(DeviceDescriptor::new("aa:bb:cc:00:00:01"));

        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_timestamp_starts_empty() {
        let store = DeviceStore::new();
        assert!(store.last_reconciled().is_none());
        let now = Utc::now();
        store.mark_reconciled(now);
        assert_eq!(store.last_reconciled(), Some(now));
    }
}
