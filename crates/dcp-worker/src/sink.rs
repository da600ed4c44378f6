use std::sync::Mutex;

use dcp_core::{CancelFlag, ProgressSink};

/// The worker-local half of the "fan-out of sinks" design named by
/// [`dcp_core::progress::CompositeSink`]'s own doc comment: a cooperative
/// cancel flag an executor polls via `is_cancel_pending`, surfaced to the
/// finished-task poller as a handle it can trigger directly (spec §4.5:
/// "this sets a local cancel flag that the worker's progress monitor
/// surfaces the next time the executor calls `reportProgress`").
pub struct WorkerCancelSink {
    flag: CancelFlag,
    on_cancel: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl WorkerCancelSink {
    pub fn new() -> Self {
        Self {
            flag: CancelFlag::new(),
            on_cancel: Mutex::new(None),
        }
    }

    /// Called by the finished-task poller once `getFinishedTasks` flags
    /// this task's `(jobId, taskId)` as server-cancelled.
    pub fn trigger(&self) {
        self.flag.cancel();
        if let Some(callback) = self.on_cancel.lock().unwrap().take() {
            callback();
        }
    }
}

impl Default for WorkerCancelSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for WorkerCancelSink {
    fn report_progress(&self, _fraction: f64) {}

    fn report_indeterminate(&self) {}

    fn report_status(&self, _text: &str) {}

    fn notify_complete(&self) {}

    fn notify_cancelled(&self) {}

    fn is_cancel_pending(&self) -> bool {
        self.flag.is_cancelled()
    }

    fn on_cancel(&self, callback: Box<dyn Fn() + Send + Sync>) {
        if self.flag.is_cancelled() {
            callback();
        } else {
            *self.on_cancel.lock().unwrap() = Some(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn trigger_flips_cancel_pending_and_fires_callback() {
        let sink = WorkerCancelSink::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        sink.on_cancel(Box::new(move || fired_clone.store(true, Ordering::SeqCst)));

        assert!(!sink.is_cancel_pending());
        sink.trigger();
        assert!(sink.is_cancel_pending());
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn registering_after_trigger_fires_immediately() {
        let sink = WorkerCancelSink::new();
        sink.trigger();

        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        sink.on_cancel(Box::new(move || fired_clone.store(true, Ordering::SeqCst)));
        assert!(fired.load(Ordering::SeqCst));
    }
}
