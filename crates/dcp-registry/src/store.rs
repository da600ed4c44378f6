use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use dcp_core::Digest;

/// Pluggable persistence for raw artifact bytes, keyed by `(name, digest)`.
///
/// This is the one interface spec §1/§6 names three backends behind:
/// `FileStore`, `RelationalStore` (sqlx-backed, out of scope here — see
/// doc comment below), and `InMemoryStore`. The registry's snapshot/overlay
/// bookkeeping (copy-on-reference semantics) lives in `dcp_registry::snapshot`
/// regardless of which `ArtifactStore` backs the root; this trait only
/// answers "where do the bytes themselves durably live".
///
/// A `RelationalStore` (e.g. backed by `sqlx` against Postgres) is the
/// natural third implementation for multi-coordinator deployments sharing
/// one registry, but is out of scope for this core (spec §1: "it does not
/// attempt to schedule across multiple coordinators").
pub trait ArtifactStore: Send + Sync {
    fn put(&self, name: &str, digest: Digest, bytes: &[u8]) -> std::io::Result<()>;
    fn get(&self, name: &str, digest: Digest) -> std::io::Result<Option<Vec<u8>>>;
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<(String, Digest), Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for InMemoryStore {
    fn put(&self, name: &str, digest: Digest, bytes: &[u8]) -> std::io::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert((name.to_string(), digest), bytes.to_vec());
        Ok(())
    }

    fn get(&self, name: &str, digest: Digest) -> std::io::Result<Option<Vec<u8>>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(name.to_string(), digest))
            .cloned())
    }
}

/// One file per `(name, digest)` under `root`, written atomically
/// (write-to-temp then rename), the same durable-write idiom the worker's
/// lease cache uses for its resume file.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, name: &str, digest: Digest) -> PathBuf {
        // Names may contain arbitrary characters; digest alone is
        // collision-resistant and filesystem-safe, so the on-disk filename
        // keys only off it, namespaced by a hash of the logical name.
        let name_tag = Digest::of(name.as_bytes());
        self.root.join(format!("{name_tag}-{digest}.artifact"))
    }
}

impl ArtifactStore for FileStore {
    fn put(&self, name: &str, digest: Digest, bytes: &[u8]) -> std::io::Result<()> {
        let path = self.path_for(name, digest);
        let tmp = path.with_extension("artifact.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    fn get(&self, name: &str, digest: Digest) -> std::io::Result<Option<Vec<u8>>> {
        let path = self.path_for(name, digest);
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_roundtrips() {
        let store = InMemoryStore::new();
        let digest = Digest::of(b"hello");
        store.put("H", digest, b"hello").unwrap();
        assert_eq!(store.get("H", digest).unwrap(), Some(b"hello".to_vec()));
        assert_eq!(store.get("missing", digest).unwrap(), None);
    }

    #[test]
    fn file_store_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let digest = Digest::of(b"hello");
        store.put("H", digest, b"hello").unwrap();
        assert_eq!(store.get("H", digest).unwrap(), Some(b"hello".to_vec()));
    }
}
