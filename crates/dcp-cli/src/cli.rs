use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dcp_core::{JobId, WorkerConfig};
use reqwest::Url;

fn default_backend_url() -> Url {
    Url::parse("http://127.0.0.1:8080/").expect("default backend url must be valid")
}

fn default_bind() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("default bind address must be valid")
}

fn default_max_workers() -> usize {
    WorkerConfig::default_parallelism()
}

#[derive(Debug, Parser)]
#[command(name = "dcp", version, about = "Distributed compute coordination core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the job coordinator, exposing it over HTTP.
    Serve(ServeArgs),
    /// Run a worker pool against a running coordinator.
    Work(WorkArgs),
    /// Submit a job descriptor to a running coordinator.
    Submit(SubmitArgs),
    /// Query (and optionally wait on) a job's status.
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "DCP_BIND", default_value_t = default_bind())]
    pub bind: SocketAddr,

    /// Working directory for job.log files and <jobId>.zip finalization.
    #[arg(long, env = "DCP_OUTPUT_DIR", default_value = "./dcp-data")]
    pub output_dir: PathBuf,

    /// Idle sentinel duration handed to workers with nothing to do.
    #[arg(long, env = "DCP_IDLE_SECONDS", default_value_t = dcp_core::CoordinatorConfig::DEFAULT_IDLE_SECONDS)]
    pub idle_seconds: u64,

    /// Scheduler polling interval advertised to workers.
    #[arg(long, env = "DCP_POLLING_INTERVAL_SECONDS", default_value_t = dcp_core::CoordinatorConfig::DEFAULT_POLLING_INTERVAL_SECONDS)]
    pub polling_interval_seconds: u64,

    /// Default priority assigned to jobs that don't set one explicitly.
    #[arg(long, env = "DCP_DEFAULT_JOB_PRIORITY", default_value_t = dcp_core::CoordinatorConfig::DEFAULT_JOB_PRIORITY)]
    pub default_job_priority: u32,

    /// Persist the artifact registry under this directory instead of
    /// keeping it in memory for the lifetime of the process.
    #[arg(long, env = "DCP_REGISTRY_STORE_DIR")]
    pub registry_store_dir: Option<PathBuf>,

    /// Reconstruct jobs from `<outputDir>/saved/*` checkpoints at startup
    /// (spec §6's optional resume feature) before accepting new work.
    #[arg(long, env = "DCP_RESUME")]
    pub resume: bool,
}

#[derive(Debug, Args)]
pub struct WorkArgs {
    #[arg(long, env = "DCP_BACKEND_URL", default_value_t = default_backend_url())]
    pub backend_url: Url,

    /// Number of worker slots to run in this process.
    #[arg(short = 'p', long, env = "DCP_MAX_WORKERS", default_value_t = default_max_workers())]
    pub max_workers: usize,

    #[arg(long, env = "DCP_MAX_CACHED_EXECUTORS", default_value_t = WorkerConfig::DEFAULT_MAX_CACHED_EXECUTORS)]
    pub max_cached_executors: usize,

    #[arg(long, env = "DCP_FINISHED_TASK_POLLING_MILLIS", default_value_t = WorkerConfig::DEFAULT_FINISHED_TASK_POLLING_MILLIS)]
    pub finished_task_polling_millis: u64,

    #[arg(long, env = "DCP_RECONNECT_INTERVAL_MILLIS", default_value_t = WorkerConfig::DEFAULT_RECONNECT_INTERVAL_MILLIS)]
    pub reconnect_interval_millis: u64,
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    #[arg(long, env = "DCP_BACKEND_URL", default_value_t = default_backend_url())]
    pub backend_url: Url,

    /// Human-readable description carried in status events.
    #[arg(long, default_value = "")]
    pub description: String,

    /// Name of the registered job factory to instantiate (e.g. "counter").
    #[arg(long)]
    pub factory: String,

    /// JSON parameters passed to the factory.
    #[arg(long, default_value = "{}")]
    pub params: String,

    /// Optional JSON override for the job's helper class ("H"), set before
    /// submission so it's visible to the job at class-load time.
    #[arg(long)]
    pub helper: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long, env = "DCP_BACKEND_URL", default_value_t = default_backend_url())]
    pub backend_url: Url,

    pub job_id: JobId,

    /// Block until the job's status changes instead of returning the
    /// latest snapshot immediately.
    #[arg(long)]
    pub wait: bool,

    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: i64,
}
