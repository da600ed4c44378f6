use crate::ids::{JobId, TaskId};

/// Error kinds from spec §7. Every Coordinator/registry/scheduler operation
/// that can fail surfaces one of these.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown job: {job_id}")]
    UnknownJob { job_id: JobId },

    #[error("job {job_id} is not in a state that allows this operation (current: {current})")]
    InvalidState { job_id: JobId, current: String },

    #[error("unknown class {name:?} for job {job_id}")]
    UnknownClass { job_id: JobId, name: String },

    #[error("deserialization for job {job_id} referenced unresolvable class {name:?}")]
    MissingClass { job_id: JobId, name: String },

    #[error("job {job_id} execution failed: {message}")]
    JobExecutionFailed { job_id: JobId, message: String },

    #[error("delegation to another coordinator failed: {message}")]
    DelegationFailed { message: String },

    #[error("transport failed: {message}")]
    TransportFailed { message: String },

    #[error("protocol mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch { expected: u32, actual: u32 },
}

impl CoreError {
    pub fn job_execution_failed(job_id: JobId, err: impl std::fmt::Display) -> Self {
        Self::JobExecutionFailed {
            job_id,
            message: err.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Context for `report_exception` (spec §4.3, §9 open question): a zero
/// `task_id` means the failure happened during deserialization or another
/// job-level step, not while running a specific task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionOrigin {
    JobLevel,
    Task(TaskId),
}

impl ExceptionOrigin {
    pub fn from_task_id(task_id: TaskId) -> Self {
        if task_id.is_idle() {
            Self::JobLevel
        } else {
            Self::Task(task_id)
        }
    }
}
