use std::sync::Arc;

use async_trait::async_trait;

use dcp_core::{CoreResult, JobId, TaskExecutor};
use dcp_transport::CoordinatorApi;

/// Worker-side half of the class-loading strategy (spec §4.5): given a job
/// id, fetch and deserialize its cached [`TaskExecutor`] bytes. Implemented
/// by `dcp-jobkit` over the name-keyed factory registry; a real deployment
/// would back this with a WASM host or subprocess protocol instead.
#[async_trait]
pub trait ExecutorLoader: Send + Sync {
    async fn load(&self, job_id: JobId, transport: &dyn CoordinatorApi) -> CoreResult<Arc<dyn TaskExecutor>>;
}
