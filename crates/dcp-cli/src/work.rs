use std::sync::Arc;
use std::time::Duration;

use dcp_core::WorkerConfig;
use dcp_jobkit::{FactoryRegistry, WorkerExecutorLoader};
use dcp_transport::{CoordinatorApi, HttpTransportClient};
use dcp_worker::{start_worker, WorkerEvent};

use crate::cli::WorkArgs;

/// Runs a worker pool against a coordinator reached over HTTP, printing
/// each [`WorkerEvent`] as it arrives (the teacher's `main.rs` prints one
/// line per finished job; this does the same, one line per event).
pub async fn run(args: WorkArgs) -> anyhow::Result<()> {
    let client = HttpTransportClient::new(args.backend_url.clone());
    let transport: Arc<dyn CoordinatorApi> = Arc::new(client);
    let loader = Arc::new(WorkerExecutorLoader::new(Arc::new(FactoryRegistry::with_builtins())));

    let mut config = WorkerConfig::new(args.max_workers);
    config.max_cached_executors = args.max_cached_executors;
    config.finished_task_polling = Duration::from_millis(args.finished_task_polling_millis);
    config.reconnect_interval = Duration::from_millis(args.reconnect_interval_millis);

    println!(
        "dcp-worker starting {} workers against {}",
        config.max_workers, args.backend_url
    );
    let handle = start_worker(config, transport, loader);
    let mut events = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("stop requested, finishing in-flight tasks...");
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(event) => print_event(&event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    handle.stop().await;
    Ok(())
}

fn print_event(event: &WorkerEvent) {
    match event {
        WorkerEvent::Started => println!("started"),
        WorkerEvent::TaskStarted { worker_idx, job_id, task_id } => {
            println!("[{worker_idx}] task {task_id} of job {job_id} started")
        }
        WorkerEvent::TaskCompleted { worker_idx, job_id, task_id } => {
            println!("[{worker_idx}] task {task_id} of job {job_id} completed")
        }
        WorkerEvent::TaskFailed { worker_idx, job_id, task_id, message } => {
            println!("[{worker_idx}] task {task_id} of job {job_id} failed: {message}")
        }
        WorkerEvent::TaskCancelled { worker_idx, job_id, task_id } => {
            println!("[{worker_idx}] task {task_id} of job {job_id} cancelled")
        }
        WorkerEvent::Idle { worker_idx, elapsed } => {
            println!("[{worker_idx}] idle for {:.1}s", elapsed.as_secs_f64())
        }
        WorkerEvent::Stopped => println!("stopped"),
    }
}
