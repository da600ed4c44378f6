use std::sync::Arc;

use dcp_core::CoordinatorConfig;
use dcp_jobkit::{FactoryRegistry, ServerClassLoader};
use dcp_registry::{ArtifactStore, FileStore, InMemoryStore, Registry};
use dcp_scheduler::Scheduler;
use dcp_server::{Coordinator, StatusEventLog};
use dcp_transport::http_server::router;
use dcp_transport::{CoordinatorApi, LocalTransport};

use crate::cli::ServeArgs;

/// Runs the job coordinator behind an `axum` HTTP listener until the
/// process receives `ctrl-c` (the same shutdown story as the teacher's
/// `spawn_ctrl_c_handler`, minus the TUI).
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let store: Arc<dyn ArtifactStore> = match &args.registry_store_dir {
        Some(dir) => Arc::new(FileStore::new(dir.clone())?),
        None => Arc::new(InMemoryStore::new()),
    };
    let registry = Arc::new(Registry::new(store));
    let scheduler = Arc::new(Scheduler::new(args.default_job_priority));
    let events = Arc::new(StatusEventLog::new());
    let factories = Arc::new(FactoryRegistry::with_builtins());
    let class_loader = Arc::new(ServerClassLoader::new(registry.clone(), factories));

    let mut config = CoordinatorConfig::new(args.output_dir.clone());
    config.idle_seconds = args.idle_seconds;
    config.polling_interval_seconds = args.polling_interval_seconds;
    config.default_job_priority = args.default_job_priority;

    std::fs::create_dir_all(&args.output_dir)?;

    let coordinator = Arc::new(Coordinator::new(config, registry, scheduler, events, class_loader));
    if args.resume {
        let resumed = coordinator.resume();
        println!("resumed {resumed} job(s) from {}", args.output_dir.join("saved").display());
    }
    let transport: Arc<dyn CoordinatorApi> = Arc::new(LocalTransport::new(coordinator));
    let app = router(transport);

    println!("dcp-server listening on http://{}", args.bind);
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).with_graceful_shutdown(ctrl_c()).await?;
    Ok(())
}

async fn ctrl_c() {
    let _ = tokio::signal::ctrl_c().await;
}
