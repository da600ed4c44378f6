use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// 16-byte MD5 digest of an artifact's bytes (spec §3, §6: `digestAlgorithm = MD5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 16]);

impl Digest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(md5::compute(bytes).0)
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// An immutable, content-addressed user-supplied artifact.
///
/// Invariant: `digest == Digest::of(&bytes)`. Enforced at construction so a
/// `ClassArtifact` can never exist with a mismatched digest.
#[derive(Debug, Clone)]
pub struct ClassArtifact {
    pub name: String,
    bytes: Arc<[u8]>,
    digest: Digest,
}

impl ClassArtifact {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let digest = Digest::of(&bytes);
        Self {
            name: name.into(),
            bytes,
            digest,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_for_same_bytes() {
        let a = ClassArtifact::new("H", b"hello".to_vec());
        let b = ClassArtifact::new("H", b"hello".to_vec());
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn digest_changes_with_content() {
        let a = ClassArtifact::new("H", b"hello".to_vec());
        let b = ClassArtifact::new("H", b"world".to_vec());
        assert_ne!(a.digest(), b.digest());
    }
}
