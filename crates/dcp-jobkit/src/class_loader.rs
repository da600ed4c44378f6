use std::sync::Arc;

use dcp_core::{CoreResult, Job, JobId};
use dcp_registry::{Registry, SnapshotHandle};
use dcp_server::ClassLoader;

use crate::factory::FactoryRegistry;

/// The server-side half of the class-loading strategy (spec §4.1/§9): reads
/// the job's current helper-class override (if any) from its snapshot, then
/// asks the [`FactoryRegistry`] to build a live `Job` from the submitted
/// descriptor bytes.
pub struct ServerClassLoader {
    registry: Arc<Registry>,
    factories: Arc<FactoryRegistry>,
}

impl ServerClassLoader {
    pub fn new(registry: Arc<Registry>, factories: Arc<FactoryRegistry>) -> Self {
        Self { registry, factories }
    }
}

impl ClassLoader for ServerClassLoader {
    fn load_job(&self, job_id: JobId, snapshot: SnapshotHandle, bytes: &[u8]) -> CoreResult<Box<dyn Job>> {
        let helper = self.registry.child_get_bytes(snapshot, "H");
        self.factories.load_job(job_id, bytes, helper.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::JobDescriptor;
    use dcp_registry::InMemoryStore;

    #[test]
    fn per_job_helper_override_is_visible_at_load_time() {
        let registry = Arc::new(Registry::new(Arc::new(InMemoryStore::new())));
        let loader = ServerClassLoader::new(registry.clone(), Arc::new(FactoryRegistry::with_builtins()));

        let bytes = JobDescriptor::new("counter", serde_json::json!({ "count": 3 })).to_bytes();

        let plain_snapshot = registry.new_child_snapshot();
        let mut plain = loader.load_job(JobId::new(), plain_snapshot, &bytes).unwrap();
        plain.initialize(std::env::temp_dir().as_path()).unwrap();
        let overridden_bytes = registry
            .child_get_bytes(plain_snapshot, "H")
            .map(|b| b.to_vec());
        assert!(overridden_bytes.is_none());

        let overridden_snapshot = registry.new_child_snapshot();
        registry
            .child_put(overridden_snapshot, "H", br#"{"increment": 5}"#.to_vec())
            .unwrap();
        let job = loader.load_job(JobId::new(), overridden_snapshot, &bytes).unwrap();
        let executor_bytes = job.task_executor_bytes().unwrap();
        let descriptor = JobDescriptor::from_bytes(&executor_bytes).unwrap();
        assert_eq!(descriptor.params["increment"], 5);
    }
}
