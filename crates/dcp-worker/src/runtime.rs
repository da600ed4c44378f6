use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinSet;

use dcp_core::WorkerConfig;
use dcp_transport::CoordinatorApi;

use crate::api::WorkerEvent;
use crate::context::WorkerContext;
use crate::finished_poller;
use crate::loader::ExecutorLoader;
use crate::reconnect::{Authenticator, NoopAuthenticator, ReconnectAdapter};
use crate::worker_task;

/// A running worker pool (spec §4.5's "single worker process runs N
/// workers"), in the idiom of the teacher's `EngineHandle`: a cheap handle
/// over a shared context plus the `JoinHandle` of the supervising task.
pub struct WorkerHandle {
    ctx: Arc<WorkerContext>,
    events: broadcast::Sender<WorkerEvent>,
    supervisor: tokio::task::JoinHandle<()>,
}

impl WorkerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// Signal every worker slot to stop after its current task (or idle
    /// wait) finishes, then wait for the pool to shut down.
    pub async fn stop(self) {
        self.ctx.request_stop();
        let _ = self.supervisor.await;
    }
}

/// Start a worker pool against `transport`, resolving executors via
/// `executor_loader` (spec §4.5). Uses a no-op [`Authenticator`]; use
/// [`start_worker_with_authenticator`] to plug in a real reconnect
/// credential refresh.
pub fn start_worker(
    config: WorkerConfig,
    transport: Arc<dyn CoordinatorApi>,
    executor_loader: Arc<dyn ExecutorLoader>,
) -> WorkerHandle {
    start_worker_with_authenticator(config, transport, executor_loader, Arc::new(NoopAuthenticator))
}

pub fn start_worker_with_authenticator(
    config: WorkerConfig,
    transport: Arc<dyn CoordinatorApi>,
    executor_loader: Arc<dyn ExecutorLoader>,
    authenticator: Arc<dyn Authenticator>,
) -> WorkerHandle {
    let (events, _) = broadcast::channel(1024);
    let reconnect = ReconnectAdapter::new(authenticator, config.reconnect_interval);
    let ctx = Arc::new(WorkerContext::new(
        config,
        transport.clone(),
        executor_loader,
        reconnect,
        events.clone(),
    ));

    let supervisor = tokio::spawn(run_pool(ctx.clone(), transport));

    WorkerHandle {
        ctx,
        events,
        supervisor,
    }
}

async fn run_pool(ctx: Arc<WorkerContext>, transport: Arc<dyn CoordinatorApi>) {
    ctx.emit(WorkerEvent::Started);

    let mut slots = JoinSet::new();
    for worker_idx in 0..ctx.config.max_workers {
        let slot_ctx = ctx.clone();
        slots.spawn(async move { worker_task::run(worker_idx, slot_ctx).await });
    }

    let poller = tokio::spawn(finished_poller::run(
        ctx.active.clone(),
        transport,
        ctx.config.finished_task_polling,
    ));

    while slots.join_next().await.is_some() {}
    poller.abort();

    ctx.emit(WorkerEvent::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_core::CoordinatorConfig;
    use dcp_jobkit::{FactoryRegistry, JobDescriptor, ServerClassLoader, WorkerExecutorLoader};
    use dcp_registry::{InMemoryStore, Registry};
    use dcp_scheduler::Scheduler;
    use dcp_server::{Coordinator, StatusEventLog};
    use dcp_transport::LocalTransport;
    use std::time::Duration;

    #[tokio::test]
    async fn worker_pool_drives_a_counter_job_to_completion() {
        let registry = Arc::new(Registry::new(Arc::new(InMemoryStore::new())));
        let scheduler = Arc::new(Scheduler::new(20));
        let events_log = Arc::new(StatusEventLog::new());
        let factories = Arc::new(FactoryRegistry::with_builtins());
        let class_loader = Arc::new(ServerClassLoader::new(registry.clone(), factories.clone()));
        let tmp = tempfile::tempdir().unwrap();
        let coordinator = Arc::new(Coordinator::new(
            CoordinatorConfig::new(tmp.path()),
            registry,
            scheduler,
            events_log,
            class_loader,
        ));
        let transport: Arc<dyn CoordinatorApi> = Arc::new(LocalTransport::new(coordinator.clone()));

        let job_id = transport.create_job("worker pool smoke test".into()).await.unwrap();
        let bytes = JobDescriptor::new("counter", serde_json::json!({ "count": 5 })).to_bytes();
        transport
            .submit_job_with_bytes(job_id, "counter".into(), bytes)
            .await
            .unwrap();

        let mut config = WorkerConfig::new(2);
        config.finished_task_polling = Duration::from_secs(3600);
        let loader = Arc::new(WorkerExecutorLoader::new(Arc::new(FactoryRegistry::with_builtins())));
        let handle = start_worker(config, transport.clone(), loader);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        let mut last_event_id: i64 = -1;
        loop {
            if let Ok(Some(status)) = transport.wait_for_job_status_change(job_id, last_event_id, 200).await {
                last_event_id = status.event_id as i64;
                if matches!(status.state, dcp_core::JobState::Complete | dcp_core::JobState::Cancelled) {
                    break;
                }
            }
            if tokio::time::Instant::now() > deadline {
                panic!("job did not complete in time");
            }
        }

        handle.stop().await;
    }
}
