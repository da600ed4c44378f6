use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use dcp_core::{JobId, JobState, JobStatus, Progress};
use tokio::sync::Notify;

/// Append-only, monotonic event stream shared by every job (spec §4.4,
/// component C4). Deliberately retains only the latest event per job, so
/// `wait_for_change` does not accumulate unbounded history for long-running
/// jobs.
pub struct StatusEventLog {
    inner: Mutex<Inner>,
    notify: Notify,
}

struct Inner {
    next_event_id: u64,
    by_event: BTreeMap<u64, JobStatus>,
    by_job: std::collections::HashMap<JobId, u64>,
}

impl StatusEventLog {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_event_id: 1,
                by_event: BTreeMap::new(),
                by_job: std::collections::HashMap::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Assign the next `event_id`, drop the job's previous event from the
    /// `eventId` index, insert into both indices, and wake every waiter.
    pub fn publish(
        &self,
        job_id: JobId,
        description: String,
        state: JobState,
        progress: Progress,
        status_text: String,
    ) -> JobStatus {
        let event = {
            let mut inner = self.inner.lock().unwrap();
            let event_id = inner.next_event_id;
            inner.next_event_id += 1;

            if let Some(prev_id) = inner.by_job.remove(&job_id) {
                inner.by_event.remove(&prev_id);
            }

            let event = JobStatus {
                event_id,
                job_id,
                description,
                state,
                progress,
                status_text,
            };
            inner.by_event.insert(event_id, event.clone());
            inner.by_job.insert(job_id, event_id);
            event
        };
        self.notify.notify_waiters();
        event
    }

    pub fn latest_for_job(&self, job_id: JobId) -> Option<JobStatus> {
        let inner = self.inner.lock().unwrap();
        let event_id = *inner.by_job.get(&job_id)?;
        inner.by_event.get(&event_id).cloned()
    }

    fn first_after(&self, last_event_id: i64) -> Option<JobStatus> {
        let inner = self.inner.lock().unwrap();
        inner
            .by_event
            .range((last_event_id.saturating_add(1)).max(0) as u64..)
            .next()
            .map(|(_, v)| v.clone())
    }

    fn first_after_for_job(&self, job_id: JobId, last_event_id: i64) -> Option<JobStatus> {
        let inner = self.inner.lock().unwrap();
        let event_id = *inner.by_job.get(&job_id)?;
        if event_id as i64 > last_event_id {
            inner.by_event.get(&event_id).cloned()
        } else {
            None
        }
    }

    /// Return the first event with `event_id > last_event_id`, blocking up
    /// to `timeout_ms` (negative = indefinite, zero = non-blocking,
    /// positive = bounded). Returns `None` on timeout.
    pub async fn wait_for_change(&self, last_event_id: i64, timeout_ms: i64) -> Option<JobStatus> {
        self.wait_generic(timeout_ms, || self.first_after(last_event_id))
            .await
    }

    pub async fn wait_for_change_job(
        &self,
        job_id: JobId,
        last_event_id: i64,
        timeout_ms: i64,
    ) -> Option<JobStatus> {
        self.wait_generic(timeout_ms, || self.first_after_for_job(job_id, last_event_id))
            .await
    }

    async fn wait_generic(
        &self,
        timeout_ms: i64,
        mut poll: impl FnMut() -> Option<JobStatus>,
    ) -> Option<JobStatus> {
        if let Some(event) = poll() {
            return Some(event);
        }
        if timeout_ms == 0 {
            return None;
        }

        let deadline = (timeout_ms > 0)
            .then(|| tokio::time::Instant::now() + Duration::from_millis(timeout_ms as u64));

        loop {
            let notified = self.notify.notified();
            match deadline {
                None => notified.await,
                Some(deadline) => {
                    let Some(remaining) = deadline.checked_duration_since(tokio::time::Instant::now())
                    else {
                        return poll();
                    };
                    if tokio::time::timeout(remaining, notified).await.is_err() {
                        return poll();
                    }
                }
            }
            if let Some(event) = poll() {
                return Some(event);
            }
        }
    }
}

impl Default for StatusEventLog {
    fn default() -> Self {
        Self::new()
    }
}
