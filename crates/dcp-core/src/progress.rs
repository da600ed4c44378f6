use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Collapses the "deep inheritance" progress/status reporting hierarchy
/// named in spec §9 into one interface. Composed by wrapping: a worker task
/// reports into a [`ProgressSink`] that is itself a fan-out of a
/// server-publishing sink and a local cooperative-cancel sink.
pub trait ProgressSink: Send + Sync {
    fn report_progress(&self, fraction: f64);
    fn report_indeterminate(&self);
    fn report_status(&self, text: &str);
    fn notify_complete(&self);
    fn notify_cancelled(&self);
    fn is_cancel_pending(&self) -> bool;
    fn on_cancel(&self, callback: Box<dyn Fn() + Send + Sync>);
}

/// A worker-local sink: tracks a cooperative cancel flag an executor polls
/// between units of work (spec §4.5, §9: "Cooperative cancellation").
#[derive(Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Fans progress reports out to any number of sinks, used to combine a
/// worker-local cancel flag with a server-published event stream.
pub struct CompositeSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Arc<dyn ProgressSink>>) -> Self {
        Self { sinks }
    }
}

impl ProgressSink for CompositeSink {
    fn report_progress(&self, fraction: f64) {
        for sink in &self.sinks {
            sink.report_progress(fraction);
        }
    }

    fn report_indeterminate(&self) {
        for sink in &self.sinks {
            sink.report_indeterminate();
        }
    }

    fn report_status(&self, text: &str) {
        for sink in &self.sinks {
            sink.report_status(text);
        }
    }

    fn notify_complete(&self) {
        for sink in &self.sinks {
            sink.notify_complete();
        }
    }

    fn notify_cancelled(&self) {
        for sink in &self.sinks {
            sink.notify_cancelled();
        }
    }

    fn is_cancel_pending(&self) -> bool {
        self.sinks.iter().any(|s| s.is_cancel_pending())
    }

    fn on_cancel(&self, callback: Box<dyn Fn() + Send + Sync>) {
        // Only the first sink that can meaningfully observe cancellation
        // (the worker-local one) needs the callback; registering on all
        // would fire it once per sink.
        if let Some(sink) = self.sinks.first() {
            sink.on_cancel(callback);
        }
    }
}
