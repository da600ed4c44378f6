use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dcp_core::{CoreError, Digest, JobId, JobStatus, TaskDescription, TaskId};

/// The remote-call surface every transport binding carries (spec §4.6,
/// component C7): one method per Coordinator operation named in spec
/// §4.3/§4.5. The core makes no assumption about framing; this trait is the
/// ambient concrete shape that binding crates (`LocalTransport`,
/// `HttpTransportClient`) implement and that `dcp-worker` programs against.
#[async_trait]
pub trait CoordinatorApi: Send + Sync {
    async fn create_job(&self, description: String) -> Result<JobId, CoreError>;

    async fn set_job_class_definition(
        &self,
        job_id: JobId,
        name: String,
        bytes: Vec<u8>,
    ) -> Result<Digest, CoreError>;

    async fn submit_job(&self, job_id: JobId, class_name: String) -> Result<(), CoreError>;

    async fn submit_job_with_bytes(
        &self,
        job_id: JobId,
        class_name: String,
        bytes: Vec<u8>,
    ) -> Result<(), CoreError>;

    async fn cancel_job(&self, job_id: JobId) -> Result<(), CoreError>;

    /// Returns the job's cached task executor bytes (spec §4.3: "Return
    /// cached executor bytes").
    async fn get_task_executor(&self, job_id: JobId) -> Result<Vec<u8>, CoreError>;

    async fn get_class_digest(&self, job_id: JobId, name: String) -> Result<Digest, CoreError>;

    async fn get_class_bytes(&self, job_id: JobId, name: String) -> Result<Vec<u8>, CoreError>;

    async fn request_task(&self) -> Result<TaskDescription, CoreError>;

    async fn submit_task_results(
        &self,
        job_id: JobId,
        task_id: TaskId,
        result: Vec<u8>,
    ) -> Result<(), CoreError>;

    /// `task_id` being the idle sentinel means a job-level failure (spec
    /// §9 open question, resolved as documented in `dcp-core::ExceptionOrigin`).
    async fn report_exception(
        &self,
        job_id: JobId,
        task_id: TaskId,
        message: String,
    ) -> Result<(), CoreError>;

    async fn get_finished_tasks(&self, pairs: Vec<(JobId, TaskId)>) -> Result<Vec<bool>, CoreError>;

    async fn set_job_priority(&self, job_id: JobId, priority: u32) -> Result<(), CoreError>;

    async fn wait_for_status_change(
        &self,
        last_event_id: i64,
        timeout_ms: i64,
    ) -> Result<Option<JobStatus>, CoreError>;

    async fn wait_for_job_status_change(
        &self,
        job_id: JobId,
        last_event_id: i64,
        timeout_ms: i64,
    ) -> Result<Option<JobStatus>, CoreError>;
}

/// A flattened, wire-safe rendering of [`CoreError`] (spec §7's error kinds),
/// used by the HTTP binding to carry structured error context across a
/// non-Rust-native boundary instead of collapsing everything to a status
/// code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<u32>,
}

impl From<&CoreError> for WireError {
    fn from(err: &CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::UnknownJob { job_id } => Self {
                kind: "unknown_job".into(),
                message,
                job_id: Some(*job_id),
                name: None,
                expected: None,
                actual: None,
            },
            CoreError::InvalidState { job_id, .. } => Self {
                kind: "invalid_state".into(),
                message,
                job_id: Some(*job_id),
                name: None,
                expected: None,
                actual: None,
            },
            CoreError::UnknownClass { job_id, name } => Self {
                kind: "unknown_class".into(),
                message,
                job_id: Some(*job_id),
                name: Some(name.clone()),
                expected: None,
                actual: None,
            },
            CoreError::MissingClass { job_id, name } => Self {
                kind: "missing_class".into(),
                message,
                job_id: Some(*job_id),
                name: Some(name.clone()),
                expected: None,
                actual: None,
            },
            CoreError::JobExecutionFailed { job_id, .. } => Self {
                kind: "job_execution_failed".into(),
                message,
                job_id: Some(*job_id),
                name: None,
                expected: None,
                actual: None,
            },
            CoreError::DelegationFailed { .. } => Self {
                kind: "delegation_failed".into(),
                message,
                job_id: None,
                name: None,
                expected: None,
                actual: None,
            },
            CoreError::TransportFailed { .. } => Self {
                kind: "transport_failed".into(),
                message,
                job_id: None,
                name: None,
                expected: None,
                actual: None,
            },
            CoreError::ProtocolMismatch { expected, actual } => Self {
                kind: "protocol_mismatch".into(),
                message,
                job_id: None,
                name: None,
                expected: Some(*expected),
                actual: Some(*actual),
            },
        }
    }
}

impl WireError {
    pub fn into_core_error(self) -> CoreError {
        let job_id = self.job_id.unwrap_or(JobId::NIL);
        match self.kind.as_str() {
            "unknown_job" => CoreError::UnknownJob { job_id },
            "invalid_state" => CoreError::InvalidState {
                job_id,
                current: self.message,
            },
            "unknown_class" => CoreError::UnknownClass {
                job_id,
                name: self.name.unwrap_or_default(),
            },
            "missing_class" => CoreError::MissingClass {
                job_id,
                name: self.name.unwrap_or_default(),
            },
            "job_execution_failed" => CoreError::JobExecutionFailed {
                job_id,
                message: self.message,
            },
            "protocol_mismatch" => CoreError::ProtocolMismatch {
                expected: self.expected.unwrap_or(0),
                actual: self.actual.unwrap_or(0),
            },
            "transport_failed" => CoreError::TransportFailed { message: self.message },
            _ => CoreError::DelegationFailed { message: self.message },
        }
    }
}
