use std::collections::HashMap;
use std::sync::Arc;

use dcp_core::{CoreError, CoreResult, Job, JobId, TaskExecutor};

use crate::counter::CounterFactory;
use crate::descriptor::JobDescriptor;

/// One registered kind of user-supplied computation. A real deployment
/// would back this with a sandboxed artifact format (WASM module,
/// subprocess protocol, plug-in ABI); here each factory is a concrete Rust
/// type, the simplest sandbox the design note in spec §9 sanctions.
pub trait JobFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build a fresh job instance. `helper` is the current bytes of the
    /// per-job (or global) helper class named `"H"` in the registry, if
    /// any — this is how a per-job class-definition override (spec §4.1,
    /// §8 scenario 4) reaches the job at construction time.
    fn create_job(&self, job_id: JobId, params: &serde_json::Value, helper: Option<&[u8]>) -> CoreResult<Box<dyn Job>>;

    /// Build a fresh task executor from the same kind of params a job's
    /// `task_executor_bytes()` descriptor carries.
    fn create_executor(&self, params: &serde_json::Value) -> CoreResult<Arc<dyn TaskExecutor>>;
}

/// Resolves [`JobDescriptor`] bytes to a live `Job` or `TaskExecutor` by
/// looking up the descriptor's `factory` name in a registered set.
pub struct FactoryRegistry {
    factories: HashMap<&'static str, Arc<dyn JobFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry pre-populated with the reference factories this crate
    /// ships (currently just the counter job used by the spec's end-to-end
    /// scenarios).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CounterFactory));
        registry
    }

    pub fn register(&mut self, factory: Arc<dyn JobFactory>) {
        self.factories.insert(factory.name(), factory);
    }

    fn parse(job_id: JobId, bytes: &[u8]) -> CoreResult<JobDescriptor> {
        JobDescriptor::from_bytes(bytes).map_err(|err| CoreError::JobExecutionFailed {
            job_id,
            message: format!("malformed job descriptor: {err}"),
        })
    }

    fn resolve(&self, job_id: JobId, name: &str) -> CoreResult<&Arc<dyn JobFactory>> {
        self.factories.get(name).ok_or_else(|| CoreError::MissingClass {
            job_id,
            name: name.to_string(),
        })
    }

    pub fn load_job(&self, job_id: JobId, bytes: &[u8], helper: Option<&[u8]>) -> CoreResult<Box<dyn Job>> {
        let descriptor = Self::parse(job_id, bytes)?;
        let factory = self.resolve(job_id, &descriptor.factory)?;
        factory.create_job(job_id, &descriptor.params, helper)
    }

    /// Deserialize task executor bytes. Used client-side only; the
    /// coordinator never calls this (it only caches and forwards the bytes).
    pub fn load_executor(&self, job_id: JobId, bytes: &[u8]) -> CoreResult<Arc<dyn TaskExecutor>> {
        let descriptor = Self::parse(job_id, bytes)?;
        let factory = self.resolve(job_id, &descriptor.factory)?;
        factory.create_executor(&descriptor.params)
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
