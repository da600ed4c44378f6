use std::time::Duration;

/// The full enumerated configuration surface from spec §6, split into the
/// coordinator-side and worker-side halves each crate actually consumes.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub output_dir: std::path::PathBuf,
    pub idle_seconds: u64,
    pub polling_interval_seconds: u64,
    pub default_job_priority: u32,
}

impl CoordinatorConfig {
    pub const DEFAULT_IDLE_SECONDS: u64 = 10;
    pub const DEFAULT_POLLING_INTERVAL_SECONDS: u64 = 10;
    pub const DEFAULT_JOB_PRIORITY: u32 = 20;

    pub fn new(output_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            idle_seconds: Self::DEFAULT_IDLE_SECONDS,
            polling_interval_seconds: Self::DEFAULT_POLLING_INTERVAL_SECONDS,
            default_job_priority: Self::DEFAULT_JOB_PRIORITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_workers: usize,
    pub max_cached_executors: usize,
    pub finished_task_polling: Duration,
    pub reconnect_interval: Duration,
}

impl WorkerConfig {
    pub const DEFAULT_MAX_CACHED_EXECUTORS: usize = 5;
    pub const DEFAULT_FINISHED_TASK_POLLING_MILLIS: u64 = 10_000;
    pub const DEFAULT_RECONNECT_INTERVAL_MILLIS: u64 = 60_000;

    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            max_cached_executors: Self::DEFAULT_MAX_CACHED_EXECUTORS,
            finished_task_polling: Duration::from_millis(
                Self::DEFAULT_FINISHED_TASK_POLLING_MILLIS,
            ),
            reconnect_interval: Duration::from_millis(Self::DEFAULT_RECONNECT_INTERVAL_MILLIS),
        }
    }

    pub fn default_parallelism() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
