use std::sync::Arc;

use async_trait::async_trait;

use dcp_core::{CoreError, Digest, JobId, JobStatus, TaskDescription, TaskId};
use dcp_server::Coordinator;

use crate::api::CoordinatorApi;

/// In-process binding: direct calls into an `Arc<Coordinator>`, no
/// serialization (spec §4.6's "transport abstraction", concretized for
/// single-binary deployments and tests).
pub struct LocalTransport {
    coordinator: Arc<Coordinator>,
}

impl LocalTransport {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl CoordinatorApi for LocalTransport {
    async fn create_job(&self, description: String) -> Result<JobId, CoreError> {
        Ok(self.coordinator.create_job(description))
    }

    async fn set_job_class_definition(
        &self,
        job_id: JobId,
        name: String,
        bytes: Vec<u8>,
    ) -> Result<Digest, CoreError> {
        self.coordinator.set_job_class_definition(job_id, &name, bytes).await
    }

    async fn submit_job(&self, job_id: JobId, class_name: String) -> Result<(), CoreError> {
        self.coordinator.submit_job(job_id, &class_name).await
    }

    async fn submit_job_with_bytes(
        &self,
        job_id: JobId,
        class_name: String,
        bytes: Vec<u8>,
    ) -> Result<(), CoreError> {
        self.coordinator
            .submit_job_with_bytes(job_id, &class_name, bytes)
            .await
    }

    async fn cancel_job(&self, job_id: JobId) -> Result<(), CoreError> {
        self.coordinator.cancel_job(job_id).await
    }

    async fn get_task_executor(&self, job_id: JobId) -> Result<Vec<u8>, CoreError> {
        Ok(self.coordinator.get_task_executor(job_id).await?.to_vec())
    }

    async fn get_class_digest(&self, job_id: JobId, name: String) -> Result<Digest, CoreError> {
        self.coordinator.get_class_digest(job_id, &name).await
    }

    async fn get_class_bytes(&self, job_id: JobId, name: String) -> Result<Vec<u8>, CoreError> {
        Ok(self.coordinator.get_class_bytes(job_id, &name).await?.to_vec())
    }

    async fn request_task(&self) -> Result<TaskDescription, CoreError> {
        Ok(self.coordinator.request_task().await)
    }

    async fn submit_task_results(
        &self,
        job_id: JobId,
        task_id: TaskId,
        result: Vec<u8>,
    ) -> Result<(), CoreError> {
        self.coordinator.submit_task_results(job_id, task_id, result).await
    }

    async fn report_exception(
        &self,
        job_id: JobId,
        task_id: TaskId,
        message: String,
    ) -> Result<(), CoreError> {
        let origin = dcp_core::ExceptionOrigin::from_task_id(task_id);
        match self.coordinator.report_exception(job_id, origin, message).await {
            // report_exception always cancels and returns the original error
            // to the caller that triggered it server-side; over the wire it
            // is "never fails fatally" (spec §4.3), so swallow it here.
            Ok(()) | Err(CoreError::JobExecutionFailed { .. }) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn get_finished_tasks(&self, pairs: Vec<(JobId, TaskId)>) -> Result<Vec<bool>, CoreError> {
        Ok(self.coordinator.get_finished_tasks(&pairs).await)
    }

    async fn set_job_priority(&self, job_id: JobId, priority: u32) -> Result<(), CoreError> {
        self.coordinator.set_job_priority(job_id, priority)
    }

    async fn wait_for_status_change(
        &self,
        last_event_id: i64,
        timeout_ms: i64,
    ) -> Result<Option<JobStatus>, CoreError> {
        Ok(self.coordinator.wait_for_status_change(last_event_id, timeout_ms).await)
    }

    async fn wait_for_job_status_change(
        &self,
        job_id: JobId,
        last_event_id: i64,
        timeout_ms: i64,
    ) -> Result<Option<JobStatus>, CoreError> {
        Ok(self
            .coordinator
            .wait_for_job_status_change(job_id, last_event_id, timeout_ms)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_core::CoordinatorConfig;
    use dcp_jobkit::{FactoryRegistry, JobDescriptor, ServerClassLoader};
    use dcp_registry::{InMemoryStore, Registry};
    use dcp_scheduler::Scheduler;
    use dcp_server::StatusEventLog;

    fn transport(tmp: &std::path::Path) -> LocalTransport {
        let registry = Arc::new(Registry::new(Arc::new(InMemoryStore::new())));
        let scheduler = Arc::new(Scheduler::new(20));
        let events = Arc::new(StatusEventLog::new());
        let loader = Arc::new(ServerClassLoader::new(registry.clone(), Arc::new(FactoryRegistry::with_builtins())));
        let coordinator = Arc::new(Coordinator::new(
            CoordinatorConfig::new(tmp),
            registry,
            scheduler,
            events,
            loader,
        ));
        LocalTransport::new(coordinator)
    }

    #[tokio::test]
    async fn round_trips_a_counter_job_to_completion() {
        let tmp = tempfile::tempdir().unwrap();
        let t = transport(tmp.path());
        let job_id = t.create_job("counter smoke test".into()).await.unwrap();
        let bytes = JobDescriptor::new("counter", serde_json::json!({ "count": 3 })).to_bytes();
        t.submit_job_with_bytes(job_id, "job".into(), bytes).await.unwrap();

        loop {
            let task = t.request_task().await.unwrap();
            if task.is_idle() {
                panic!("job went idle before completing");
            }
            let n = u64::from_be_bytes(task.payload.as_ref().try_into().unwrap());
            let result = (n + 1).to_be_bytes().to_vec();
            t.submit_task_results(task.job_id, task.task_id, result).await.unwrap();
            let status = t.wait_for_job_status_change(job_id, 0, 0).await.unwrap().unwrap();
            if status.state == dcp_core::JobState::Complete {
                break;
            }
        }
    }
}
