use std::time::Duration;

use dcp_core::{JobId, TaskId};

/// Observable events a running worker pool emits (teacher idiom:
/// `client-engine`'s `EngineEvent` broadcast over `tokio::sync::broadcast`).
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Started,
    TaskStarted { worker_idx: usize, job_id: JobId, task_id: TaskId },
    TaskCompleted { worker_idx: usize, job_id: JobId, task_id: TaskId },
    TaskFailed { worker_idx: usize, job_id: JobId, task_id: TaskId, message: String },
    TaskCancelled { worker_idx: usize, job_id: JobId, task_id: TaskId },
    Idle { worker_idx: usize, elapsed: Duration },
    Stopped,
}
