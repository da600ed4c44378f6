use crate::error::CoreResult;
use crate::progress::ProgressSink;
use crate::task::TaskDescription;

/// The opaque, user-supplied computation (spec §3: "Job Capability").
///
/// Modelled as a capability interface per the Design Note in spec §9: a
/// concrete implementation is produced by deserializing `ClassArtifact`
/// bytes under a job's snapshot-backed class loader (see `dcp-jobkit`),
/// never by this crate directly.
pub trait Job: Send {
    /// Called once after deserialization. `working_dir` is this job's own
    /// directory under `<outputDir>/<jobId>/` (spec §6) — the minimal stand-in
    /// for the out-of-scope "host-service interface" a job writes its output
    /// through.
    fn initialize(&mut self, working_dir: &std::path::Path) -> CoreResult<()>;

    /// Produce the next task, or `None` if the job has no more work ready
    /// right now (it may still produce more later, e.g. after more results
    /// arrive). At most one call outstanding at a time per job (spec §4.3,
    /// §9: "eager refill discipline" is an enforced invariant).
    fn produce_next_task(&mut self) -> CoreResult<Option<Vec<u8>>>;

    /// Accept one task's raw result bytes, returning a progress fraction.
    fn accept_results(&mut self, task_payload: &[u8], result: &[u8]) -> CoreResult<f64>;

    fn is_complete(&self) -> bool;

    /// Called once after completion, before finalization.
    fn finish(&mut self) -> CoreResult<()>;

    /// Serialize this job's task executor capability, exactly once. The
    /// coordinator caches the resulting bytes and hands them out verbatim
    /// from `getTaskExecutor` (spec §3, §4.3); a worker deserializes them
    /// under the same job's snapshot-backed class loader to get a live
    /// [`TaskExecutor`]. The coordinator itself never runs a task, so it
    /// only ever needs these bytes, not a live executor instance.
    fn task_executor_bytes(&self) -> CoreResult<Vec<u8>>;

    /// Write this job's internal progress state (spec §3: `saveState(sink)`),
    /// so a freshly-constructed instance of the same job can pick up where
    /// this one left off via [`Job::restore_state`]. The coordinator's
    /// `--resume` checkpoint (spec §6's optional `saved/<jobId>` layout)
    /// calls this after every accepted result; jobs with no meaningful
    /// mid-flight state can leave the default no-op.
    fn save_state(&self, sink: &mut dyn std::io::Write) -> CoreResult<()> {
        let _ = sink;
        Ok(())
    }

    /// Read back state written by [`Job::save_state`] (spec §3:
    /// `restoreState(source)`), called immediately after the job is
    /// reconstructed from its originally submitted bytes during resume.
    fn restore_state(&mut self, source: &mut dyn std::io::Read) -> CoreResult<()> {
        let _ = source;
        Ok(())
    }
}

/// The opaque artifact capability that knows how to run one task (spec §3).
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, task: &TaskDescription, sink: &dyn ProgressSink) -> CoreResult<Vec<u8>>;
}
