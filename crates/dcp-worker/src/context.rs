use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use dcp_core::WorkerConfig;
use dcp_registry::{ArtifactStore, InMemoryStore};
use dcp_transport::CoordinatorApi;

use crate::api::WorkerEvent;
use crate::class_cache::ClassCache;
use crate::executor_cache::ExecutorCache;
use crate::finished_poller::ActiveSet;
use crate::idle::IdleCoordinator;
use crate::loader::ExecutorLoader;
use crate::reconnect::ReconnectAdapter;

/// Shared state every worker slot's loop reads from (spec §4.5's worker
/// process: "a bounded queue of idle worker slots, a cache of deserialized
/// TaskExecutor objects ... a class-definition cache ... a pending-lookup
/// map ... a finished-task poller thread").
pub struct WorkerContext {
    pub config: WorkerConfig,
    pub transport: Arc<dyn CoordinatorApi>,
    pub executor_loader: Arc<dyn ExecutorLoader>,
    pub executor_cache: ExecutorCache,
    pub class_cache: ClassCache,
    pub active: Arc<ActiveSet>,
    pub idle: Arc<IdleCoordinator>,
    pub reconnect: ReconnectAdapter,
    events: broadcast::Sender<WorkerEvent>,
    stop: AtomicBool,
}

impl WorkerContext {
    pub fn new(
        config: WorkerConfig,
        transport: Arc<dyn CoordinatorApi>,
        executor_loader: Arc<dyn ExecutorLoader>,
        reconnect: ReconnectAdapter,
        events: broadcast::Sender<WorkerEvent>,
    ) -> Self {
        Self::with_class_store(config, transport, executor_loader, reconnect, events, Arc::new(InMemoryStore::new()))
    }

    pub fn with_class_store(
        config: WorkerConfig,
        transport: Arc<dyn CoordinatorApi>,
        executor_loader: Arc<dyn ExecutorLoader>,
        reconnect: ReconnectAdapter,
        events: broadcast::Sender<WorkerEvent>,
        class_store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let idle = Arc::new(IdleCoordinator::new(config.max_workers));
        let executor_cache = ExecutorCache::new(config.max_cached_executors);
        Self {
            config,
            transport,
            executor_loader,
            executor_cache,
            class_cache: ClassCache::new(class_store),
            active: Arc::new(ActiveSet::new()),
            idle,
            reconnect,
            events,
            stop: AtomicBool::new(false),
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.idle.broadcast_work_available();
    }

    pub fn emit(&self, event: WorkerEvent) {
        let _ = self.events.send(event);
    }
}
