use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use dcp_core::{CoreResult, Digest, JobId};
use dcp_registry::ArtifactStore;
use dcp_transport::CoordinatorApi;

type Slot = Arc<OnceCell<Arc<[u8]>>>;

/// Class-definition cache keyed by `(name, digest)` (spec §4.5), backed by
/// the same pluggable [`ArtifactStore`] the registry side uses (in-memory,
/// file-backed, or relational) so a colocated worker can share the
/// on-disk cache format with the server's own registry persistence. A
/// separate in-process pending-lookup map (the `OnceCell` slots) ensures
/// only one fetch per `(name, digest)` happens across the whole process,
/// regardless of which store backs it.
pub struct ClassCache {
    store: Arc<dyn ArtifactStore>,
    slots: Mutex<HashMap<(String, Digest), Slot>>,
}

impl ClassCache {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// `loadClass(name)` under `job_id` (spec §4.5): ask the server for the
    /// current digest; look up `(name, digest)` in the store; on a miss,
    /// ask the server for bytes, persist them, and return.
    pub async fn load(&self, transport: &dyn CoordinatorApi, job_id: JobId, name: &str) -> CoreResult<Arc<[u8]>> {
        let digest = transport.get_class_digest(job_id, name.to_string()).await?;

        let slot = {
            let mut slots = self.slots.lock().await;
            slots
                .entry((name.to_string(), digest))
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let name = name.to_string();
        slot.get_or_try_init(|| async {
            if let Ok(Some(bytes)) = self.store.get(&name, digest) {
                return Ok(Arc::<[u8]>::from(bytes));
            }
            let bytes = transport.get_class_bytes(job_id, name.clone()).await?;
            let _ = self.store.put(&name, digest, &bytes);
            Ok(Arc::<[u8]>::from(bytes))
        })
        .await
        .cloned()
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_registry::InMemoryStore;

    #[test]
    fn class_cache_is_constructible_over_either_store_backend() {
        let _in_memory = ClassCache::new(Arc::new(InMemoryStore::new()));
        let tmp = tempfile::tempdir().unwrap();
        let _file_backed = ClassCache::new(Arc::new(dcp_registry::FileStore::new(tmp.path()).unwrap()));
    }
}
