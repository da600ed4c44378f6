use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use dcp_core::{CoreError, Digest, JobId, JobStatus, TaskDescription, TaskId};

use crate::api::{CoordinatorApi, WireError};

/// Server-side counterpart to [`crate::client::HttpTransportClient`]: an
/// `axum` router exposing the same `v1/*` endpoints, so client and router
/// are a matched pair. Authentication/authorization is modelled as a single
/// no-op `tower::Layer` hook (spec §1's "opaque authorization filter") —
/// callers wrap the returned `Router` with their own layer before serving.
pub fn router(api: Arc<dyn CoordinatorApi>) -> Router {
    Router::new()
        .route("/v1/jobs", post(create_job))
        .route("/v1/jobs/class-definition", post(set_job_class_definition))
        .route("/v1/jobs/submit", post(submit_job))
        .route("/v1/jobs/submit-with-bytes", post(submit_job_with_bytes))
        .route("/v1/jobs/cancel", post(cancel_job))
        .route("/v1/jobs/task-executor", post(get_task_executor))
        .route("/v1/jobs/class-digest", post(get_class_digest))
        .route("/v1/jobs/class-bytes", post(get_class_bytes))
        .route("/v1/jobs/priority", post(set_job_priority))
        .route("/v1/tasks/request", post(request_task))
        .route("/v1/tasks/results", post(submit_task_results))
        .route("/v1/tasks/exception", post(report_exception))
        .route("/v1/tasks/finished", post(get_finished_tasks))
        .route("/v1/status/wait", post(wait_for_status_change))
        .route("/v1/status/wait-job", post(wait_for_job_status_change))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(api)
}

struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::UnknownJob { .. } | CoreError::UnknownClass { .. } => StatusCode::NOT_FOUND,
            CoreError::InvalidState { .. } | CoreError::MissingClass { .. } => StatusCode::CONFLICT,
            CoreError::ProtocolMismatch { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(WireError::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Deserialize)]
struct CreateJobRequest {
    description: String,
}

async fn create_job(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<CreateJobRequest>,
) -> ApiResult<JobId> {
    Ok(Json(api.create_job(req.description).await?))
}

#[derive(Deserialize)]
struct SetClassRequest {
    job_id: JobId,
    name: String,
    bytes: Vec<u8>,
}

async fn set_job_class_definition(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<SetClassRequest>,
) -> ApiResult<Digest> {
    Ok(Json(api.set_job_class_definition(req.job_id, req.name, req.bytes).await?))
}

#[derive(Deserialize)]
struct SubmitJobRequest {
    job_id: JobId,
    class_name: String,
}

async fn submit_job(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<SubmitJobRequest>,
) -> ApiResult<()> {
    Ok(Json(api.submit_job(req.job_id, req.class_name).await?))
}

#[derive(Deserialize)]
struct SubmitJobWithBytesRequest {
    job_id: JobId,
    class_name: String,
    bytes: Vec<u8>,
}

async fn submit_job_with_bytes(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<SubmitJobWithBytesRequest>,
) -> ApiResult<()> {
    Ok(Json(
        api.submit_job_with_bytes(req.job_id, req.class_name, req.bytes).await?,
    ))
}

#[derive(Deserialize)]
struct JobIdRequest {
    job_id: JobId,
}

async fn cancel_job(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<JobIdRequest>,
) -> ApiResult<()> {
    Ok(Json(api.cancel_job(req.job_id).await?))
}

async fn get_task_executor(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<JobIdRequest>,
) -> ApiResult<Vec<u8>> {
    Ok(Json(api.get_task_executor(req.job_id).await?))
}

#[derive(Deserialize)]
struct ClassLookupRequest {
    job_id: JobId,
    name: String,
}

async fn get_class_digest(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<ClassLookupRequest>,
) -> ApiResult<Digest> {
    Ok(Json(api.get_class_digest(req.job_id, req.name).await?))
}

async fn get_class_bytes(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<ClassLookupRequest>,
) -> ApiResult<Vec<u8>> {
    Ok(Json(api.get_class_bytes(req.job_id, req.name).await?))
}

#[derive(Deserialize)]
struct SetPriorityRequest {
    job_id: JobId,
    priority: u32,
}

async fn set_job_priority(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<SetPriorityRequest>,
) -> ApiResult<()> {
    Ok(Json(api.set_job_priority(req.job_id, req.priority).await?))
}

async fn request_task(State(api): State<Arc<dyn CoordinatorApi>>) -> ApiResult<TaskDescription> {
    Ok(Json(api.request_task().await?))
}

#[derive(Deserialize)]
struct SubmitResultsRequest {
    job_id: JobId,
    task_id: TaskId,
    result: Vec<u8>,
}

async fn submit_task_results(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<SubmitResultsRequest>,
) -> ApiResult<()> {
    Ok(Json(
        api.submit_task_results(req.job_id, req.task_id, req.result).await?,
    ))
}

#[derive(Deserialize)]
struct ReportExceptionRequest {
    job_id: JobId,
    task_id: TaskId,
    message: String,
}

async fn report_exception(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<ReportExceptionRequest>,
) -> ApiResult<()> {
    Ok(Json(
        api.report_exception(req.job_id, req.task_id, req.message).await?,
    ))
}

#[derive(Deserialize)]
struct FinishedTasksRequest {
    pairs: Vec<(JobId, TaskId)>,
}

async fn get_finished_tasks(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<FinishedTasksRequest>,
) -> ApiResult<Vec<bool>> {
    Ok(Json(api.get_finished_tasks(req.pairs).await?))
}

#[derive(Deserialize)]
struct WaitRequest {
    last_event_id: i64,
    timeout_ms: i64,
}

async fn wait_for_status_change(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<WaitRequest>,
) -> ApiResult<Option<JobStatus>> {
    Ok(Json(
        api.wait_for_status_change(req.last_event_id, req.timeout_ms).await?,
    ))
}

#[derive(Deserialize)]
struct WaitJobRequest {
    job_id: JobId,
    last_event_id: i64,
    timeout_ms: i64,
}

async fn wait_for_job_status_change(
    State(api): State<Arc<dyn CoordinatorApi>>,
    Json(req): Json<WaitJobRequest>,
) -> ApiResult<Option<JobStatus>> {
    Ok(Json(
        api.wait_for_job_status_change(req.job_id, req.last_event_id, req.timeout_ms)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpTransportClient;
    use crate::local::LocalTransport;
    use axum::body::Body;
    use axum::http::Request;
    use dcp_core::CoordinatorConfig;
    use dcp_jobkit::{FactoryRegistry, ServerClassLoader};
    use dcp_registry::{InMemoryStore, Registry};
    use dcp_scheduler::Scheduler;
    use dcp_server::{Coordinator, StatusEventLog};
    use tower::ServiceExt as _;

    fn test_api(tmp: &std::path::Path) -> Arc<dyn CoordinatorApi> {
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
        Arc::new(LocalTransport::new(coordinator))
    }

    #[tokio::test]
    async fn create_job_round_trips_through_the_router() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_api(tmp.path()));

        let req = Request::builder()
            .method("POST")
            .uri("/v1/jobs")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&serde_json::json!({"description": "smoke"})).unwrap()))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_job_maps_to_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_api(tmp.path()));

        let req = Request::builder()
            .method("POST")
            .uri("/v1/jobs/cancel")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&serde_json::json!({"job_id": JobId::new()})).unwrap(),
            ))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn http_client_and_router_are_a_matched_pair() {
        let tmp = tempfile::tempdir().unwrap();
        let app = router(test_api(tmp.path()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = HttpTransportClient::new(format!("http://{addr}/").parse().unwrap());
        let job_id = client.create_job("via http".into()).await.unwrap();
        let status = client.wait_for_job_status_change(job_id, 0, 0).await.unwrap();
        assert!(status.is_some());
    }
}
