use std::sync::Arc;

use async_trait::async_trait;

use dcp_core::{CoreResult, JobId, TaskExecutor};
use dcp_transport::CoordinatorApi;
use dcp_worker::ExecutorLoader;

use crate::factory::FactoryRegistry;

/// The worker-side half of the class-loading strategy (spec §4.5),
/// completing [`ServerClassLoader`](crate::ServerClassLoader)'s
/// server-side counterpart: fetch a job's cached task executor bytes over
/// the transport and deserialize them against the same name-keyed factory
/// registry.
pub struct WorkerExecutorLoader {
    factories: Arc<FactoryRegistry>,
}

impl WorkerExecutorLoader {
    pub fn new(factories: Arc<FactoryRegistry>) -> Self {
        Self { factories }
    }
}

#[async_trait]
impl ExecutorLoader for WorkerExecutorLoader {
    async fn load(&self, job_id: JobId, transport: &dyn CoordinatorApi) -> CoreResult<Arc<dyn TaskExecutor>> {
        let bytes = transport.get_task_executor(job_id).await?;
        self.factories.load_executor(job_id, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_core::{CoordinatorConfig, TaskId};
    use dcp_registry::{InMemoryStore, Registry};
    use dcp_scheduler::Scheduler;
    use dcp_server::{Coordinator, StatusEventLog};
    use dcp_transport::{CoordinatorApi, LocalTransport};
    use std::sync::Arc;

    fn transport(tmp: &std::path::Path) -> LocalTransport {
        let registry = Arc::new(Registry::new(Arc::new(InMemoryStore::new())));
        let scheduler = Arc::new(Scheduler::new(20));
        let events = Arc::new(StatusEventLog::new());
        let factories = Arc::new(FactoryRegistry::with_builtins());
        let class_loader = Arc::new(crate::ServerClassLoader::new(registry.clone(), factories));
        let coordinator = Arc::new(Coordinator::new(
            CoordinatorConfig::new(tmp),
            registry,
            scheduler,
            events,
            class_loader,
        ));
        LocalTransport::new(coordinator)
    }

    #[tokio::test]
    async fn loads_the_submitted_job_s_executor() {
        let tmp = tempfile::tempdir().unwrap();
        let local = transport(tmp.path());
        let job_id = local.create_job("job".into()).await.unwrap();

        let bytes = crate::descriptor::JobDescriptor::new("counter", serde_json::json!({ "count": 1 })).to_bytes();
        local
            .submit_job_with_bytes(job_id, "counter".into(), bytes)
            .await
            .unwrap();

        let loader = WorkerExecutorLoader::new(Arc::new(FactoryRegistry::with_builtins()));
        let executor = loader.load(job_id, &local).await.unwrap();

        struct NoopSink;
        impl dcp_core::ProgressSink for NoopSink {
            fn report_progress(&self, _fraction: f64) {}
            fn report_indeterminate(&self) {}
            fn report_status(&self, _text: &str) {}
            fn notify_complete(&self) {}
            fn notify_cancelled(&self) {}
            fn is_cancel_pending(&self) -> bool {
                false
            }
            fn on_cancel(&self, _callback: Box<dyn Fn() + Send + Sync>) {}
        }

        let task = dcp_core::TaskDescription::new(job_id, TaskId::new(1).unwrap(), 0u64.to_be_bytes().to_vec());
        let result = executor.execute(&task, &NoopSink).unwrap();
        assert_eq!(u64::from_be_bytes(result.try_into().unwrap()), 1);
    }
}
