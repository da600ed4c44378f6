use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dcp_core::{ClassArtifact, Digest};

use crate::store::ArtifactStore;

/// Opaque handle to a per-job snapshot (spec §4.1: `newChildSnapshot`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotHandle(u64);

struct Versioned {
    index: u64,
    artifact: ClassArtifact,
}

#[derive(Default)]
struct RootState {
    /// Append-only per-name history, ascending by `index`. Never mutated in
    /// place: a later `putGlobal` of the same name appends a new version,
    /// it never overwrites an existing one (spec §3 invariant: "the parent
    /// registry never mutates existing overlay entries of any child").
    versions: HashMap<String, Vec<Versioned>>,
}

impl RootState {
    fn latest_at(&self, name: &str, as_of_index: u64) -> Option<&ClassArtifact> {
        self.versions
            .get(name)
            .and_then(|vs| vs.iter().rev().find(|v| v.index < as_of_index))
            .map(|v| &v.artifact)
    }

    fn latest(&self, name: &str) -> Option<&ClassArtifact> {
        self.versions.get(name).and_then(|vs| vs.last()).map(|v| &v.artifact)
    }
}

struct ChildState {
    /// Root writes with `index < pinned_at` are visible to this child;
    /// later root writes are not (spec §3: "copy-on-reference").
    pinned_at: u64,
    overlay: HashMap<String, ClassArtifact>,
}

/// Content-addressed artifact store with copy-on-reference per-job
/// snapshots (spec §4.1, component C1).
pub struct Registry {
    store: Arc<dyn ArtifactStore>,
    root: Mutex<RootState>,
    next_index: AtomicU64,
    next_handle: AtomicU64,
    children: Mutex<HashMap<SnapshotHandle, ChildState>>,
}

impl Registry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            root: Mutex::new(RootState::default()),
            next_index: AtomicU64::new(0),
            next_handle: AtomicU64::new(1),
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Store/replace at the root snapshot; advances the root snapshot index.
    pub fn put_global(&self, name: &str, bytes: Vec<u8>) -> std::io::Result<Digest> {
        let artifact = ClassArtifact::new(name, bytes);
        let digest = artifact.digest();
        self.store.put(name, digest, artifact.bytes())?;

        let mut root = self.root.lock().unwrap();
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        root.versions
            .entry(name.to_string())
            .or_default()
            .push(Versioned { index, artifact });
        Ok(digest)
    }

    pub fn get_digest(&self, name: &str) -> Option<Digest> {
        self.root.lock().unwrap().latest(name).map(|a| a.digest())
    }

    pub fn get_bytes(&self, name: &str) -> Option<Arc<[u8]>> {
        self.root
            .lock()
            .unwrap()
            .latest(name)
            .map(|a| Arc::from(a.bytes()))
    }

    /// Record the current root snapshot index; later root writes stay
    /// invisible to this child for its whole lifetime.
    pub fn new_child_snapshot(&self) -> SnapshotHandle {
        let handle = SnapshotHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let pinned_at = self.next_index.load(Ordering::SeqCst);
        self.children.lock().unwrap().insert(
            handle,
            ChildState {
                pinned_at,
                overlay: HashMap::new(),
            },
        );
        handle
    }

    /// Overlay write, private to `handle`. No-op (but returns an error) if
    /// the handle is unknown/already released.
    pub fn child_put(
        &self,
        handle: SnapshotHandle,
        name: &str,
        bytes: Vec<u8>,
    ) -> std::io::Result<Option<Digest>> {
        let artifact = ClassArtifact::new(name, bytes);
        let digest = artifact.digest();
        self.store.put(name, digest, artifact.bytes())?;

        let mut children = self.children.lock().unwrap();
        let Some(child) = children.get_mut(&handle) else {
            return Ok(None);
        };
        child.overlay.insert(name.to_string(), artifact);
        Ok(Some(digest))
    }

    pub fn child_get_digest(&self, handle: SnapshotHandle, name: &str) -> Option<Digest> {
        self.child_get(handle, name).map(|a| a.digest())
    }

    pub fn child_get_bytes(&self, handle: SnapshotHandle, name: &str) -> Option<Arc<[u8]>> {
        self.child_get(handle, name).map(|a| Arc::from(a.bytes()))
    }

    fn child_get(&self, handle: SnapshotHandle, name: &str) -> Option<ClassArtifact> {
        let children = self.children.lock().unwrap();
        let child = children.get(&handle)?;
        if let Some(artifact) = child.overlay.get(name) {
            return Some(artifact.clone());
        }
        let pinned_at = child.pinned_at;
        drop(children);
        self.root.lock().unwrap().latest_at(name, pinned_at).cloned()
    }

    /// Delete the overlay and free resources. No-op on an unknown handle.
    pub fn release(&self, handle: SnapshotHandle) {
        self.children.lock().unwrap().remove(&handle);
    }
}
