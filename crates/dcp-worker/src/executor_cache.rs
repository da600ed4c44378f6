use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use dcp_core::{CoreError, CoreResult, JobId, TaskExecutor};

use crate::loader::ExecutorLoader;

type Slot = Arc<OnceCell<Arc<dyn TaskExecutor>>>;

/// LRU cache of deserialized [`TaskExecutor`]s keyed by `JobId` (spec §4.5,
/// default capacity 5). Each entry is behind a [`OnceCell`] so a concurrent
/// cache miss on the *same* job collapses into one fetch rather than racing
/// multiple loads, generalizing the teacher's single-entry
/// `InflightStore`/pending-lookup idea to an actual bounded multi-entry
/// cache.
pub struct ExecutorCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

struct CacheState {
    recency: VecDeque<JobId>,
    entries: HashMap<JobId, Slot>,
}

impl ExecutorCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                recency: VecDeque::new(),
                entries: HashMap::new(),
            }),
        }
    }

    /// Return this job's `TaskExecutor`, loading it via `loader` on a miss.
    /// Concurrent callers for the same `job_id` share one in-flight load.
    pub async fn get_or_load(
        &self,
        job_id: JobId,
        transport: &dyn dcp_transport::CoordinatorApi,
        loader: &dyn ExecutorLoader,
    ) -> CoreResult<Arc<dyn TaskExecutor>> {
        let slot = {
            let mut state = self.state.lock().await;
            self.touch(&mut state, job_id);
            state
                .entries
                .entry(job_id)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        slot.get_or_try_init(|| async { loader.load(job_id, transport).await })
            .await
            .cloned()
            .map_err(|err| match err {
                CoreError::UnknownJob { job_id } => CoreError::UnknownJob { job_id },
                other => other,
            })
    }

    fn touch(&self, state: &mut CacheState, job_id: JobId) {
        if let Some(pos) = state.recency.iter().position(|&j| j == job_id) {
            state.recency.remove(pos);
        }
        state.recency.push_back(job_id);
        while state.recency.len() > self.capacity {
            if let Some(evicted) = state.recency.pop_front() {
                state.entries.remove(&evicted);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }
}
