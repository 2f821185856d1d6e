use crate::k8s::pods::PodSnapshot;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Thread-safe local mirror of tracked pod state, keyed by `namespace/name`
///
/// Writes are ordered by the snapshot version marker: an upsert carrying a
/// version lower than or equal to the stored one is dropped, which keeps the
/// mirror consistent under out-of-order delivery after reconnect/relist.
#[derive(Debug, Default)]
pub struct PodIndexer {
    store: Arc<RwLock<HashMap<String, PodSnapshot>>>,
}

impl PodIndexer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or refresh a snapshot, gated on the version marker
    ///
    /// Returns `false` when the write was dropped as stale.
    pub async fn upsert(&self, snapshot: PodSnapshot) -> bool {
        let mut store = self.store.write().await;
        if let Some(existing) = store.get(&snapshot.key) {
            if snapshot.version <= existing.version {
                debug!(
                    "stale write dropped: {} (v{} <= v{})",
                    snapshot.key, snapshot.version, existing.version
                );
                return false;
            }
        }
        store.insert(snapshot.key.clone(), snapshot);
        true
    }

    /// Remove a key from the mirror, returning the last known snapshot
    pub async fn delete(&self, key: &str) -> Option<PodSnapshot> {
        self.store.write().await.remove(key)
    }

    pub async fn get(&self, key: &str) -> Option<PodSnapshot> {
        self.store.read().await.get(key).cloned()
    }

    pub async fn list(&self) -> Vec<PodSnapshot> {
        self.store.read().await.values().cloned().collect()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.store.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}
