use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dcp_core::{CoreError, CoreResult, Job, JobId, JobState, TaskId};
use dcp_registry::SnapshotHandle;

/// Deserializes user-supplied job bytes into a live [`Job`] under a
/// snapshot-pinned view of the registry (spec §3, §9: "opaque, user-supplied
/// code"). Implemented by `dcp-jobkit`.
pub trait ClassLoader: Send + Sync {
    fn load_job(&self, job_id: JobId, snapshot: SnapshotHandle, bytes: &[u8]) -> CoreResult<Box<dyn Job>>;
}

/// The server's record of one submitted job (spec §3: `ScheduledJob`).
///
/// Owns its own working directory and is the sole mutator of its job
/// object. The `produce_next_task -> scheduler.add` and
/// `scheduler.remove -> accept_results -> is_complete` sequences each run
/// under this struct's own lock (held by the caller as a
/// `tokio::sync::Mutex<ScheduledJob>`), which is how the coordinator
/// enforces "at most one outstanding `produce_next_task` per job" and total
/// ordering of `accept_results` calls for one job (spec §5, §9).
pub struct ScheduledJob {
    pub id: JobId,
    pub description: String,
    pub state: JobState,
    pub snapshot: SnapshotHandle,
    pub job: Option<Box<dyn Job>>,
    /// Serialized task executor bytes, cached once at submission (spec
    /// §3/§4.3: `getTaskExecutor` returns these bytes verbatim).
    pub cached_task_executor: Option<Arc<[u8]>>,
    pub working_dir: PathBuf,
    pub priority: u32,
    /// The class name and raw bytes this job was submitted with, kept
    /// around so a `--resume` checkpoint can reconstruct an equivalent `Job`
    /// instance through the same class loader (spec §6's optional
    /// `saved/<jobId>` layout).
    pub submitted_class_name: Option<String>,
    pub submitted_bytes: Option<Arc<[u8]>>,
    /// Payload bytes for every task currently out with a worker, keyed by
    /// `task_id`, so `accept_results` can hand the original payload back to
    /// the job object (spec §3: `Job::accept_results(task_payload, result)`).
    pub outstanding: HashMap<TaskId, Arc<[u8]>>,
    /// Count of tasks whose results have been accepted (spec §4.3:
    /// `getFinishedTasks`).
    pub finished_count: u64,
}

impl ScheduledJob {
    pub fn new(id: JobId, description: String, snapshot: SnapshotHandle, working_dir: PathBuf, priority: u32) -> Self {
        Self {
            id,
            description,
            state: JobState::Pending,
            snapshot,
            job: None,
            cached_task_executor: None,
            working_dir,
            priority,
            submitted_class_name: None,
            submitted_bytes: None,
            outstanding: HashMap::new(),
            finished_count: 0,
        }
    }

    pub fn require_pending(&self) -> CoreResult<()> {
        if self.state == JobState::Pending {
            Ok(())
        } else {
            Err(CoreError::InvalidState {
                job_id: self.id,
                current: self.state.to_string(),
            })
        }
    }

    pub fn job_mut(&mut self) -> CoreResult<&mut Box<dyn Job>> {
        self.job.as_mut().ok_or_else(|| CoreError::InvalidState {
            job_id: self.id,
            current: self.state.to_string(),
        })
    }
}
