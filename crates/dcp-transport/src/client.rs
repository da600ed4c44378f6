use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use dcp_core::{CoreError, Digest, JobId, JobStatus, TaskDescription, TaskId};

use crate::api::{CoordinatorApi, WireError};

/// `reqwest`-based client binding (spec §4.6): each `CoordinatorApi` method is
/// a plain POST with a JSON body and a JSON result, in the idiom of the
/// teacher's `backend.rs` (one `reqwest::Client`, `Url::join` per endpoint,
/// typed error mapping off the HTTP status/body).
pub struct HttpTransportClient {
    http: reqwest::Client,
    base: Url,
}

impl HttpTransportClient {
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    pub fn with_client(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    async fn post<Req: Serialize, Res: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Res, CoreError> {
        let url = self.base.join(path).map_err(|err| CoreError::TransportFailed {
            message: format!("bad endpoint {path:?}: {err}"),
        })?;
        let res = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| CoreError::TransportFailed { message: err.to_string() })?;

        if res.status().is_success() {
            res.json().await.map_err(|err| CoreError::TransportFailed { message: err.to_string() })
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            match serde_json::from_str::<WireError>(&body) {
                Ok(wire) => Err(wire.into_core_error()),
                Err(_) => Err(CoreError::TransportFailed {
                    message: format!("http {status}: {body}"),
                }),
            }
        }
    }
}

#[derive(Serialize)]
struct CreateJobRequest {
    description: String,
}

#[derive(Serialize)]
struct SetClassRequest {
    job_id: JobId,
    name: String,
    bytes: Vec<u8>,
}

#[derive(Serialize)]
struct SubmitJobRequest {
    job_id: JobId,
    class_name: String,
}

#[derive(Serialize)]
struct SubmitJobWithBytesRequest {
    job_id: JobId,
    class_name: String,
    bytes: Vec<u8>,
}

#[derive(Serialize)]
struct JobIdRequest {
    job_id: JobId,
}

#[derive(Serialize)]
struct ClassLookupRequest {
    job_id: JobId,
    name: String,
}

#[derive(Serialize)]
struct SubmitResultsRequest {
    job_id: JobId,
    task_id: TaskId,
    result: Vec<u8>,
}

#[derive(Serialize)]
struct ReportExceptionRequest {
    job_id: JobId,
    task_id: TaskId,
    message: String,
}

#[derive(Serialize)]
struct FinishedTasksRequest {
    pairs: Vec<(JobId, TaskId)>,
}

#[derive(Serialize)]
struct SetPriorityRequest {
    job_id: JobId,
    priority: u32,
}

#[derive(Serialize)]
struct WaitRequest {
    last_event_id: i64,
    timeout_ms: i64,
}

#[derive(Serialize)]
struct WaitJobRequest {
    job_id: JobId,
    last_event_id: i64,
    timeout_ms: i64,
}

#[async_trait]
impl CoordinatorApi for HttpTransportClient {
    async fn create_job(&self, description: String) -> Result<JobId, CoreError> {
        self.post("v1/jobs", &CreateJobRequest { description }).await
    }

    async fn set_job_class_definition(
        &self,
        job_id: JobId,
        name: String,
        bytes: Vec<u8>,
    ) -> Result<Digest, CoreError> {
        self.post("v1/jobs/class-definition", &SetClassRequest { job_id, name, bytes })
            .await
    }

    async fn submit_job(&self, job_id: JobId, class_name: String) -> Result<(), CoreError> {
        self.post("v1/jobs/submit", &SubmitJobRequest { job_id, class_name }).await
    }

    async fn submit_job_with_bytes(
        &self,
        job_id: JobId,
        class_name: String,
        bytes: Vec<u8>,
    ) -> Result<(), CoreError> {
        self.post(
            "v1/jobs/submit-with-bytes",
            &SubmitJobWithBytesRequest { job_id, class_name, bytes },
        )
        .await
    }

    async fn cancel_job(&self, job_id: JobId) -> Result<(), CoreError> {
        self.post("v1/jobs/cancel", &JobIdRequest { job_id }).await
    }

    async fn get_task_executor(&self, job_id: JobId) -> Result<Vec<u8>, CoreError> {
        self.post("v1/jobs/task-executor", &JobIdRequest { job_id }).await
    }

    async fn get_class_digest(&self, job_id: JobId, name: String) -> Result<Digest, CoreError> {
        self.post("v1/jobs/class-digest", &ClassLookupRequest { job_id, name }).await
    }

    async fn get_class_bytes(&self, job_id: JobId, name: String) -> Result<Vec<u8>, CoreError> {
        self.post("v1/jobs/class-bytes", &ClassLookupRequest { job_id, name }).await
    }

    async fn request_task(&self) -> Result<TaskDescription, CoreError> {
        self.post("v1/tasks/request", &()).await
    }

    async fn submit_task_results(
        &self,
        job_id: JobId,
        task_id: TaskId,
        result: Vec<u8>,
    ) -> Result<(), CoreError> {
        self.post("v1/tasks/results", &SubmitResultsRequest { job_id, task_id, result })
            .await
    }

    async fn report_exception(
        &self,
        job_id: JobId,
        task_id: TaskId,
        message: String,
    ) -> Result<(), CoreError> {
        self.post(
            "v1/tasks/exception",
            &ReportExceptionRequest { job_id, task_id, message },
        )
        .await
    }

    async fn get_finished_tasks(&self, pairs: Vec<(JobId, TaskId)>) -> Result<Vec<bool>, CoreError> {
        self.post("v1/tasks/finished", &FinishedTasksRequest { pairs }).await
    }

    async fn set_job_priority(&self, job_id: JobId, priority: u32) -> Result<(), CoreError> {
        self.post("v1/jobs/priority", &SetPriorityRequest { job_id, priority }).await
    }

    async fn wait_for_status_change(
        &self,
        last_event_id: i64,
        timeout_ms: i64,
    ) -> Result<Option<JobStatus>, CoreError> {
        self.post("v1/status/wait", &WaitRequest { last_event_id, timeout_ms }).await
    }

    async fn wait_for_job_status_change(
        &self,
        job_id: JobId,
        last_event_id: i64,
        timeout_ms: i64,
    ) -> Result<Option<JobStatus>, CoreError> {
        self.post(
            "v1/status/wait-job",
            &WaitJobRequest { job_id, last_event_id, timeout_ms },
        )
        .await
    }
}
