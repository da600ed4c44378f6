use serde::{Deserialize, Serialize};

/// The wire shape of every `ClassArtifact`'s bytes this kit understands: a
/// small JSON descriptor naming which registered [`crate::factory::JobFactory`]
/// to instantiate and its parameters (spec §9: "model the Job and
/// TaskExecutor as capability interfaces implemented over a sandbox" — here
/// the sandbox is a name-keyed plug-in ABI rather than a bytecode VM).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub factory: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl JobDescriptor {
    pub fn new(factory: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            factory: factory.into(),
            params,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("JobDescriptor is always serializable")
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
