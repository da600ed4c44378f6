use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

const NONE: i64 = -1;

/// Designated-poller idle coordination (spec §4.5): when `requestTask`
/// returns the idle sentinel, only one worker actually sleeps and retries;
/// the rest wait on a shared [`Notify`]. If the designated poller's slot
/// drops out of the active range (the fleet shrank), the next-lowest
/// still-active worker takes over.
pub struct IdleCoordinator {
    poller: AtomicI64,
    active_workers: AtomicUsize,
    notify: Notify,
}

impl IdleCoordinator {
    pub fn new(worker_count: usize) -> Self {
        Self {
            poller: AtomicI64::new(NONE),
            active_workers: AtomicUsize::new(worker_count),
            notify: Notify::new(),
        }
    }

    pub fn set_active_workers(&self, count: usize) {
        self.active_workers.store(count, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Enter the idle wait for `worker_idx`. Returns once this worker should
    /// retry `requestTask`: either because it is the designated poller and
    /// `idle_for` elapsed, or because the designated poller broadcast real
    /// work becoming available.
    pub async fn wait(&self, worker_idx: usize, idle_for: Duration) {
        self.wait_ticking(worker_idx, idle_for, |_elapsed| {}).await
    }

    /// Same as [`Self::wait`], but if this worker is the designated poller
    /// `on_tick` is called once per second elapsed so the worker can
    /// surface a progress update while idling (spec §4.5: "sleep the
    /// requested seconds, progress-updating each second").
    pub async fn wait_ticking(&self, worker_idx: usize, idle_for: Duration, mut on_tick: impl FnMut(Duration)) {
        if worker_idx != self.designated_poller() {
            self.notify.notified().await;
            return;
        }

        self.poller.store(worker_idx as i64, Ordering::SeqCst);
        let mut remaining = idle_for;
        let one_second = Duration::from_secs(1);
        while remaining > one_second {
            tokio::time::sleep(one_second).await;
            remaining -= one_second;
            on_tick(idle_for - remaining);
        }
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
    }

    /// The worker currently responsible for polling: the last poller if
    /// still within the active range, otherwise the lowest-numbered active
    /// worker (spec §4.5: "the poller hands off to the lowest-numbered
    /// still-active worker").
    fn designated_poller(&self) -> usize {
        let active = self.active_workers.load(Ordering::SeqCst).max(1);
        let current = self.poller.load(Ordering::SeqCst);
        if current >= 0 && (current as usize) < active {
            current as usize
        } else {
            0
        }
    }

    /// Called by the designated poller when it discovers real work: wakes
    /// every other worker so they stop waiting and race `requestTask` too.
    pub fn broadcast_work_available(&self) {
        self.poller.store(NONE, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

pub type SharedIdleCoordinator = Arc<IdleCoordinator>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn only_the_designated_poller_sleeps_the_full_interval() {
        let coord = Arc::new(IdleCoordinator::new(3));
        let start = Instant::now();

        let c1 = coord.clone();
        let poller_task = tokio::spawn(async move {
            c1.wait(0, Duration::from_millis(50)).await;
        });

        // Give the poller a head start so it claims slot 0.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let c2 = coord.clone();
        let waiter_task = tokio::spawn(async move {
            c2.wait(1, Duration::from_millis(5_000)).await;
        });

        poller_task.await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(45));

        coord.broadcast_work_available();
        waiter_task.await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn hands_off_when_poller_index_drops_out_of_range() {
        let coord = Arc::new(IdleCoordinator::new(3));
        coord.set_active_workers(1);
        // With only one active worker, worker 0 is always the poller.
        coord.wait(0, Duration::from_millis(1)).await;
    }
}
