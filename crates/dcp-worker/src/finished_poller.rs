use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use dcp_core::{JobId, TaskId};
use dcp_transport::CoordinatorApi;

use crate::sink::WorkerCancelSink;

/// The active set: tasks currently executing, keyed by `(jobId, taskId)`,
/// each with the cancel sink its executor is polling (spec §4.5: "build
/// `(jobIds, taskIds)` from the active set").
#[derive(Default)]
pub struct ActiveSet {
    tasks: Mutex<HashMap<(JobId, TaskId), Arc<WorkerCancelSink>>>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, job_id: JobId, task_id: TaskId, sink: Arc<WorkerCancelSink>) {
        self.tasks.lock().await.insert((job_id, task_id), sink);
    }

    pub async fn remove(&self, job_id: JobId, task_id: TaskId) {
        self.tasks.lock().await.remove(&(job_id, task_id));
    }

    async fn snapshot(&self) -> Vec<(JobId, TaskId, Arc<WorkerCancelSink>)> {
        self.tasks
            .lock()
            .await
            .iter()
            .map(|(&(j, t), sink)| (j, t, sink.clone()))
            .collect()
    }
}

/// Polls `getFinishedTasks` at `interval` for every entry currently in the
/// active set and triggers the cancel sink of any flagged true (spec §4.5:
/// "tasks cancelled server-side stop at the next progress check, not
/// immediately"). Runs until the process shuts down; intended to be spawned
/// once per worker pool, not once per worker.
pub async fn run(active: Arc<ActiveSet>, transport: Arc<dyn CoordinatorApi>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let entries = active.snapshot().await;
        if entries.is_empty() {
            continue;
        }

        let pairs: Vec<(JobId, TaskId)> = entries.iter().map(|(j, t, _)| (*j, *t)).collect();
        match transport.get_finished_tasks(pairs).await {
            Ok(flags) => {
                for (flagged, (_, _, sink)) in flags.into_iter().zip(entries.into_iter()) {
                    if flagged {
                        sink.trigger();
                    }
                }
            }
            Err(_) => {
                // Transport errors here are transient (spec §4.5's reconnect
                // loop handles connectivity); skip this tick and retry later.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dcp_core::{CoreResult, TaskDescription};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlaggingTransport {
        flag_all: AtomicBool,
    }

    #[async_trait]
    impl CoordinatorApi for FlaggingTransport {
        async fn create_job(&self, _: String) -> CoreResult<JobId> {
            unimplemented!()
        }
        async fn set_job_class_definition(&self, _: JobId, _: String, _: Vec<u8>) -> CoreResult<dcp_core::Digest> {
            unimplemented!()
        }
        async fn submit_job(&self, _: JobId, _: String) -> CoreResult<()> {
            unimplemented!()
        }
        async fn submit_job_with_bytes(&self, _: JobId, _: String, _: Vec<u8>) -> CoreResult<()> {
            unimplemented!()
        }
        async fn cancel_job(&self, _: JobId) -> CoreResult<()> {
            unimplemented!()
        }
        async fn get_task_executor(&self, _: JobId) -> CoreResult<Vec<u8>> {
            unimplemented!()
        }
        async fn get_class_digest(&self, _: JobId, _: String) -> CoreResult<dcp_core::Digest> {
            unimplemented!()
        }
        async fn get_class_bytes(&self, _: JobId, _: String) -> CoreResult<Vec<u8>> {
            unimplemented!()
        }
        async fn request_task(&self) -> CoreResult<TaskDescription> {
            unimplemented!()
        }
        async fn submit_task_results(&self, _: JobId, _: TaskId, _: Vec<u8>) -> CoreResult<()> {
            unimplemented!()
        }
        async fn report_exception(&self, _: JobId, _: TaskId, _: String) -> CoreResult<()> {
            unimplemented!()
        }
        async fn get_finished_tasks(&self, pairs: Vec<(JobId, TaskId)>) -> CoreResult<Vec<bool>> {
            Ok(vec![self.flag_all.load(Ordering::SeqCst); pairs.len()])
        }
        async fn set_job_priority(&self, _: JobId, _: u32) -> CoreResult<()> {
            unimplemented!()
        }
        async fn wait_for_status_change(&self, _: i64, _: i64) -> CoreResult<Option<dcp_core::JobStatus>> {
            unimplemented!()
        }
        async fn wait_for_job_status_change(&self, _: JobId, _: i64, _: i64) -> CoreResult<Option<dcp_core::JobStatus>> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn flagged_tasks_get_their_cancel_sink_triggered() {
        let active = Arc::new(ActiveSet::new());
        let sink = Arc::new(WorkerCancelSink::new());
        let job = JobId::new();
        let task = TaskId::new(7).unwrap();
        active.insert(job, task, sink.clone()).await;

        let transport: Arc<dyn CoordinatorApi> = Arc::new(FlaggingTransport {
            flag_all: AtomicBool::new(true),
        });

        let poll_active = active.clone();
        let poll_transport = transport.clone();
        let handle = tokio::spawn(run(poll_active, poll_transport, Duration::from_millis(5)));

        tokio::time::sleep(Duration::from_millis(30)).await;
        handle.abort();

        assert!(sink.is_cancel_pending());
    }
}
